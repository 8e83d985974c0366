use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationResult;
use crate::game::{Difficulty, Lifecycle, NoteScore, ScaleChallenge, ScoreBoard, ScoreStats};

/// A finished calibration as stored in the `calibrations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Local time, RFC 3339.
    pub recorded_at: String,
    pub result: CalibrationResult,
}

impl CalibrationRecord {
    pub fn now(result: CalibrationResult) -> Self {
        Self {
            recorded_at: chrono::Local::now().to_rfc3339(),
            result,
        }
    }
}

/// How a challenge run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeOutcome {
    Complete,
    TimeLimitExceeded,
    TooManyFailures,
    /// Quit before finishing.
    Abandoned,
}

impl ChallengeOutcome {
    pub fn from_lifecycle(lifecycle: Lifecycle) -> Self {
        match lifecycle {
            Lifecycle::Complete => ChallengeOutcome::Complete,
            Lifecycle::Failed(crate::game::FailReason::TimeLimitExceeded) => {
                ChallengeOutcome::TimeLimitExceeded
            }
            Lifecycle::Failed(crate::game::FailReason::TooManyFailures) => {
                ChallengeOutcome::TooManyFailures
            }
            Lifecycle::Ready | Lifecycle::Active => ChallengeOutcome::Abandoned,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeOutcome::Complete => "COMPLETE",
            ChallengeOutcome::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            ChallengeOutcome::TooManyFailures => "TOO_MANY_FAILURES",
            ChallengeOutcome::Abandoned => "ABANDONED",
        }
    }
}

/// One challenge run as stored in the `challenge_results` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub finished_at: String,
    pub octave: i32,
    pub difficulty: Difficulty,
    pub outcome: ChallengeOutcome,
    /// Scale position reached, 0..8.
    pub notes_reached: usize,
    pub total_attempts: u32,
    pub failure_count: u32,
    pub duration_ms: u64,
    pub stats: ScoreStats,
    pub notes: Vec<NoteScore>,
}

impl ChallengeRecord {
    pub fn from_run(challenge: &ScaleChallenge, score: &ScoreBoard, now_ms: u64) -> Self {
        Self {
            finished_at: chrono::Local::now().to_rfc3339(),
            octave: challenge.config().octave,
            difficulty: challenge.config().difficulty,
            outcome: ChallengeOutcome::from_lifecycle(challenge.lifecycle()),
            notes_reached: challenge.current_note_index(),
            total_attempts: challenge.total_attempts(),
            failure_count: challenge.failure_count(),
            duration_ms: challenge.elapsed_ms(now_ms),
            stats: score.stats(),
            notes: score.notes.clone(),
        }
    }
}
