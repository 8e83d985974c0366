use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dsp::PitchEstimate;
use crate::error::{ConfigError, NoteError};
use crate::notes;

use super::events::{FailReason, ModeEvent, NoteHit, NoteMiss, Progress};
use super::hold::{self, HoldState, HoldUpdate};
use super::snapshot::{field, field_or};

/// Whole-challenge time budget.
pub const TIME_LIMIT_MS: u64 = 120_000;

/// Exhausted notes allowed before the challenge is lost.
pub const MAX_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// Tolerance, hold time and attempt budget fixed by a difficulty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultySettings {
    pub tolerance_cents: f32,
    pub hold_time_ms: u64,
    pub max_attempts_per_note: u32,
}

impl Difficulty {
    pub fn settings(&self) -> DifficultySettings {
        let (tolerance_cents, hold_time_ms, max_attempts_per_note) = match self {
            Difficulty::Easy => (50.0, 1200, 5),
            Difficulty::Normal => (25.0, 1500, 3),
            Difficulty::Hard => (10.0, 1800, 3),
        };
        DifficultySettings {
            tolerance_cents,
            hold_time_ms,
            max_attempts_per_note,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeConfig {
    pub octave: i32,
    pub difficulty: Difficulty,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            octave: 4,
            difficulty: Difficulty::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Ready,
    Active,
    Complete,
    Failed(FailReason),
}

impl Lifecycle {
    pub fn is_finished(&self) -> bool {
        matches!(self, Lifecycle::Complete | Lifecycle::Failed(_))
    }
}

/// Saved challenge progress.
///
/// Times are stored as elapsed durations so a checkpoint can be resumed
/// under a different clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSnapshot {
    pub config: ChallengeConfig,
    pub scale_notes: Vec<String>,
    pub current_note_index: usize,
    pub current_note_attempts: u32,
    pub total_attempts: u32,
    pub failure_count: u32,
    pub elapsed_ms: u64,
    pub note_elapsed_ms: u64,
    pub lifecycle: Lifecycle,
}

/// Eight-note C-major scale climb with a time budget and a failure budget.
#[derive(Debug, Clone)]
pub struct ScaleChallenge {
    config: ChallengeConfig,
    settings: DifficultySettings,
    scale_notes: Vec<String>,
    current_note_index: usize,
    current_note_attempts: u32,
    total_attempts: u32,
    failure_count: u32,
    hold: HoldState,
    lifecycle: Lifecycle,
    /// Clock reading the elapsed counters are measured from.
    /// None until the first update after start or restore.
    start_ms: Option<u64>,
    note_start_ms: Option<u64>,
    /// Time already spent before `start_ms` (non-zero after restore).
    elapsed_offset_ms: u64,
    note_offset_ms: u64,
}

impl ScaleChallenge {
    pub fn new(config: ChallengeConfig) -> Result<Self, NoteError> {
        let scale_notes = notes::c_major_scale(config.octave);
        for note in &scale_notes {
            notes::transpose(note, 0)?;
        }
        Ok(Self::with_notes(config, scale_notes))
    }

    fn with_notes(config: ChallengeConfig, scale_notes: Vec<String>) -> Self {
        Self {
            settings: config.difficulty.settings(),
            config,
            scale_notes,
            current_note_index: 0,
            current_note_attempts: 0,
            total_attempts: 0,
            failure_count: 0,
            hold: HoldState::default(),
            lifecycle: Lifecycle::Ready,
            start_ms: None,
            note_start_ms: None,
            elapsed_offset_ms: 0,
            note_offset_ms: 0,
        }
    }

    pub fn config(&self) -> &ChallengeConfig {
        &self.config
    }

    pub fn settings(&self) -> &DifficultySettings {
        &self.settings
    }

    pub fn scale_notes(&self) -> &[String] {
        &self.scale_notes
    }

    pub fn current_note_index(&self) -> usize {
        self.current_note_index
    }

    pub fn current_note(&self) -> Option<&str> {
        self.scale_notes.get(self.current_note_index).map(String::as_str)
    }

    pub fn current_note_attempts(&self) -> u32 {
        self.current_note_attempts
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn hold(&self) -> &HoldState {
        &self.hold
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.elapsed_offset_ms
            .saturating_add(self.start_ms.map_or(0, |s| now_ms.saturating_sub(s)))
    }

    pub fn note_elapsed_ms(&self, now_ms: u64) -> u64 {
        self.note_offset_ms
            .saturating_add(self.note_start_ms.map_or(0, |s| now_ms.saturating_sub(s)))
    }

    /// Time left on the clock.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        TIME_LIMIT_MS.saturating_sub(self.elapsed_ms(now_ms))
    }

    /// Begin the climb. Ignored unless the challenge is ready.
    pub fn start(&mut self, now_ms: u64) {
        if self.lifecycle != Lifecycle::Ready {
            return;
        }
        tracing::info!(
            octave = self.config.octave,
            difficulty = %self.config.difficulty,
            "scale challenge started"
        );
        self.lifecycle = Lifecycle::Active;
        self.start_ms = Some(now_ms);
        self.note_start_ms = Some(now_ms);
        self.elapsed_offset_ms = 0;
        self.note_offset_ms = 0;
    }

    /// Abandon the current run and return to ready.
    pub fn stop(&mut self) {
        tracing::info!(index = self.current_note_index, "scale challenge stopped");
        *self = Self::with_notes(self.config, std::mem::take(&mut self.scale_notes));
    }

    /// Process one frame. Does nothing unless active.
    pub fn update(&mut self, estimate: &PitchEstimate, now_ms: u64) -> Vec<ModeEvent> {
        if self.lifecycle != Lifecycle::Active {
            return Vec::new();
        }
        if self.start_ms.is_none() {
            self.start_ms = Some(now_ms);
        }
        if self.note_start_ms.is_none() {
            self.note_start_ms = Some(now_ms);
        }

        if self.elapsed_ms(now_ms) > TIME_LIMIT_MS {
            return self.fail(FailReason::TimeLimitExceeded);
        }

        let Some(target) = self.scale_notes.get(self.current_note_index).cloned() else {
            // Index past the end with an active lifecycle only follows a bad restore.
            self.lifecycle = Lifecycle::Complete;
            return vec![ModeEvent::Complete];
        };

        let (cents, matched) = hold::evaluate(estimate, &target, self.settings.tolerance_cents)
            .unwrap_or((None, false));
        let update = self.hold.update(
            if matched {
                cents.map(|c| (c, estimate.confidence))
            } else {
                None
            },
            now_ms,
            self.settings.hold_time_ms,
        );

        let mut events = Vec::new();
        match update {
            HoldUpdate::Idle => events.push(self.progress(&target, cents, 0.0)),
            HoldUpdate::Started => {
                let p = hold::progress(0, self.settings.hold_time_ms);
                events.push(self.progress(&target, cents, p));
            }
            HoldUpdate::Holding { progress, .. } => {
                events.push(self.progress(&target, cents, progress))
            }
            HoldUpdate::Completed {
                average_cents,
                duration_ms,
                ..
            } => {
                events.push(self.progress(&target, cents, 1.0));
                let hit = NoteHit {
                    note: target,
                    note_index: self.current_note_index,
                    average_cents,
                    time_to_hit_ms: self.note_elapsed_ms(now_ms),
                    hold_duration_ms: duration_ms,
                    attempts: self.current_note_attempts.saturating_add(1),
                };
                tracing::debug!(note = %hit.note, cents = average_cents, "note hit");
                events.push(ModeEvent::NoteHit(hit));
                events.extend(self.advance(now_ms));
            }
            HoldUpdate::Lost { .. } => {
                self.current_note_attempts = self.current_note_attempts.saturating_add(1);
                self.total_attempts = self.total_attempts.saturating_add(1);
                events.push(self.progress(&target, cents, 0.0));
                events.push(ModeEvent::AttemptFailed {
                    note: target.clone(),
                    attempt: self.current_note_attempts,
                });

                if self.current_note_attempts >= self.settings.max_attempts_per_note {
                    self.failure_count = self.failure_count.saturating_add(1);
                    tracing::debug!(note = %target, failures = self.failure_count, "note missed");
                    events.push(ModeEvent::NoteMiss(NoteMiss {
                        note: target,
                        note_index: self.current_note_index,
                        attempts: self.current_note_attempts,
                        time_on_note_ms: self.note_elapsed_ms(now_ms),
                    }));
                    if self.failure_count >= MAX_FAILURES {
                        events.extend(self.fail(FailReason::TooManyFailures));
                    } else {
                        events.extend(self.advance(now_ms));
                    }
                }
            }
        }
        events
    }

    fn progress(&self, note: &str, cents: Option<f32>, hold_progress: f32) -> ModeEvent {
        ModeEvent::Progress(Progress {
            note: note.to_string(),
            note_index: self.current_note_index,
            total_notes: self.scale_notes.len(),
            cents,
            hold_progress,
        })
    }

    fn advance(&mut self, now_ms: u64) -> Option<ModeEvent> {
        self.current_note_index += 1;
        self.current_note_attempts = 0;
        self.hold.clear();
        self.note_start_ms = Some(now_ms);
        self.note_offset_ms = 0;

        if self.current_note_index >= self.scale_notes.len() {
            tracing::info!(attempts = self.total_attempts, "scale challenge complete");
            self.lifecycle = Lifecycle::Complete;
            Some(ModeEvent::Complete)
        } else {
            None
        }
    }

    fn fail(&mut self, reason: FailReason) -> Vec<ModeEvent> {
        tracing::info!(%reason, index = self.current_note_index, "scale challenge failed");
        self.hold.clear();
        self.lifecycle = Lifecycle::Failed(reason);
        vec![ModeEvent::Failed(reason)]
    }

    pub fn snapshot(&self, now_ms: u64) -> ChallengeSnapshot {
        ChallengeSnapshot {
            config: self.config,
            scale_notes: self.scale_notes.clone(),
            current_note_index: self.current_note_index,
            current_note_attempts: self.current_note_attempts,
            total_attempts: self.total_attempts,
            failure_count: self.failure_count,
            elapsed_ms: self.elapsed_ms(now_ms),
            note_elapsed_ms: self.note_elapsed_ms(now_ms),
            lifecycle: self.lifecycle,
        }
    }

    /// Rebuild from saved state. Never fails: malformed fields use defaults.
    ///
    /// Attempt and failure counters are clamped to their limits.
    ///
    /// A restored active challenge re-anchors its clock on the next update.
    /// Any hold in progress at save time is dropped.
    pub fn restore(value: &Value) -> Self {
        let config_value = value.get("config").cloned().unwrap_or(Value::Null);
        let defaults = ChallengeConfig::default();
        let mut config = ChallengeConfig {
            octave: field_or(&config_value, "octave", defaults.octave),
            difficulty: field_or(&config_value, "difficulty", defaults.difficulty),
        };

        let fresh = match Self::new(config) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "saved octave unusable, using default");
                config.octave = defaults.octave;
                Self::with_notes(config, notes::c_major_scale(config.octave))
            }
        };

        let scale_notes = field::<Vec<String>>(value, "scale_notes")
            .filter(|saved| {
                saved.len() == fresh.scale_notes.len()
                    && saved.iter().all(|n| notes::note_name_to_midi(n).is_ok())
            })
            .unwrap_or_else(|| fresh.scale_notes.clone());

        let mut challenge = Self::with_notes(config, scale_notes);
        challenge.current_note_index =
            field_or(value, "current_note_index", 0usize).min(challenge.scale_notes.len());
        challenge.current_note_attempts = field_or(value, "current_note_attempts", 0u32)
            .min(challenge.settings.max_attempts_per_note);
        challenge.failure_count = field_or(value, "failure_count", 0u32).min(MAX_FAILURES);
        challenge.total_attempts = field_or(value, "total_attempts", 0u32)
            .max(challenge.current_note_attempts);
        challenge.elapsed_offset_ms = field_or(value, "elapsed_ms", 0);
        challenge.note_offset_ms = field_or(value, "note_elapsed_ms", 0);
        challenge.lifecycle = field_or(value, "lifecycle", Lifecycle::Ready);
        challenge
    }
}
