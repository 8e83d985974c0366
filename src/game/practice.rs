use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dsp::PitchEstimate;
use crate::error::NoteError;
use crate::notes;

use super::events::{ModeEvent, NoteHit, Progress};
use super::hold::{self, HoldState, HoldUpdate};
use super::snapshot::{field, field_or};

/// Settings for free practice on one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeConfig {
    pub target_note: String,
    pub tolerance_cents: f32,
    pub hold_time_ms: u64,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            target_note: "C4".into(),
            tolerance_cents: 25.0,
            hold_time_ms: 1500,
        }
    }
}

/// Running statistics for the current target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeStats {
    /// Holds started.
    pub attempts: u32,
    /// Holds completed.
    pub successes: u32,
    /// Smallest |average cents| of any completed hold.
    pub best_accuracy_cents: Option<f32>,
    /// Time spent holding, completed or not.
    pub total_hold_time_ms: u64,
}

impl PracticeStats {
    pub fn success_rate(&self) -> f32 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f32 / self.attempts as f32
        }
    }
}

/// Single-note practice. Never ends and never fails.
#[derive(Debug, Clone)]
pub struct PracticeMode {
    config: PracticeConfig,
    stats: PracticeStats,
    hold: HoldState,
    /// When the current target was set, for time-to-hit.
    target_since_ms: Option<u64>,
}

/// Serializable practice state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSnapshot {
    pub config: PracticeConfig,
    pub stats: PracticeStats,
}

impl PracticeMode {
    pub fn new(config: PracticeConfig) -> Result<Self, NoteError> {
        notes::note_name_to_midi(&config.target_note)?;
        Ok(Self {
            config,
            stats: PracticeStats::default(),
            hold: HoldState::default(),
            target_since_ms: None,
        })
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn stats(&self) -> &PracticeStats {
        &self.stats
    }

    pub fn hold(&self) -> &HoldState {
        &self.hold
    }

    pub fn target_note(&self) -> &str {
        &self.config.target_note
    }

    /// Switch to a new target. Statistics start over.
    pub fn set_target(&mut self, note: &str) -> Result<(), NoteError> {
        notes::note_name_to_midi(note)?;
        tracing::info!(from = %self.config.target_note, to = note, "practice target changed");
        self.config.target_note = note.to_string();
        self.stats = PracticeStats::default();
        self.hold.clear();
        self.target_since_ms = None;
        Ok(())
    }

    /// Process one frame.
    pub fn update(&mut self, estimate: &PitchEstimate, now_ms: u64) -> Vec<ModeEvent> {
        let since = *self.target_since_ms.get_or_insert(now_ms);

        // The target is validated on every path that sets it.
        let (cents, matched) =
            hold::evaluate(estimate, &self.config.target_note, self.config.tolerance_cents)
                .unwrap_or((None, false));

        let update = self.hold.update(
            if matched {
                cents.map(|c| (c, estimate.confidence))
            } else {
                None
            },
            now_ms,
            self.config.hold_time_ms,
        );

        let mut events = Vec::new();
        let hold_progress = match update {
            HoldUpdate::Idle => 0.0,
            HoldUpdate::Started => {
                self.stats.attempts += 1;
                hold::progress(0, self.config.hold_time_ms)
            }
            HoldUpdate::Holding { progress, .. } => progress,
            HoldUpdate::Lost { elapsed_ms } => {
                self.stats.total_hold_time_ms += elapsed_ms;
                events.push(ModeEvent::AttemptFailed {
                    note: self.config.target_note.clone(),
                    attempt: self.stats.attempts,
                });
                0.0
            }
            HoldUpdate::Completed {
                average_cents,
                duration_ms,
                ..
            } => {
                // A zero-length hold completes on its first frame.
                if self.hold_time_is_instant() {
                    self.stats.attempts += 1;
                }
                self.stats.successes += 1;
                self.stats.total_hold_time_ms += duration_ms;
                let accuracy = average_cents.abs();
                self.stats.best_accuracy_cents = Some(
                    self.stats
                        .best_accuracy_cents
                        .map_or(accuracy, |best| best.min(accuracy)),
                );
                events.push(ModeEvent::NoteHit(NoteHit {
                    note: self.config.target_note.clone(),
                    note_index: 0,
                    average_cents,
                    time_to_hit_ms: now_ms.saturating_sub(since),
                    hold_duration_ms: duration_ms,
                    attempts: self.stats.attempts,
                }));
                self.target_since_ms = Some(now_ms);
                1.0
            }
        };

        events.insert(
            0,
            ModeEvent::Progress(Progress {
                note: self.config.target_note.clone(),
                note_index: 0,
                total_notes: 1,
                cents,
                hold_progress,
            }),
        );
        events
    }

    fn hold_time_is_instant(&self) -> bool {
        self.config.hold_time_ms == 0
    }

    pub fn snapshot(&self) -> PracticeSnapshot {
        PracticeSnapshot {
            config: self.config.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Rebuild from saved state. Missing or malformed fields use defaults.
    pub fn restore(value: &Value) -> Self {
        let defaults = PracticeConfig::default();
        let config_value = value.get("config").cloned().unwrap_or(Value::Null);

        let mut target_note: String = field_or(&config_value, "target_note", defaults.target_note.clone());
        if notes::note_name_to_midi(&target_note).is_err() {
            tracing::warn!(note = %target_note, "invalid saved practice note, using default");
            target_note = defaults.target_note.clone();
        }

        let config = PracticeConfig {
            target_note,
            tolerance_cents: field_or(&config_value, "tolerance_cents", defaults.tolerance_cents),
            hold_time_ms: field_or(&config_value, "hold_time_ms", defaults.hold_time_ms),
        };

        Self {
            config,
            stats: field(value, "stats").unwrap_or_default(),
            hold: HoldState::default(),
            target_since_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn on_pitch(frequency: f32) -> PitchEstimate {
        PitchEstimate {
            frequency: Some(frequency),
            confidence: 0.9,
            clarity: 0.9,
            volume: 0.4,
        }
    }

    fn a4_practice() -> PracticeMode {
        PracticeMode::new(PracticeConfig {
            target_note: "A4".into(),
            tolerance_cents: 25.0,
            hold_time_ms: 1000,
        })
        .unwrap()
    }

    fn hits(events: &[ModeEvent]) -> Vec<&NoteHit> {
        events
            .iter()
            .filter_map(|e| match e {
                ModeEvent::NoteHit(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_target() {
        let config = PracticeConfig {
            target_note: "Z4".into(),
            ..PracticeConfig::default()
        };
        assert!(PracticeMode::new(config).is_err());
        assert!(a4_practice().set_target("nope").is_err());
    }

    #[test]
    fn holding_target_scores_a_hit() {
        let mut mode = a4_practice();
        let mut all = Vec::new();
        for t in (0..=1000).step_by(100) {
            all.extend(mode.update(&on_pitch(440.0), t));
        }
        let hit = hits(&all);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].note, "A4");
        assert_eq!(hit[0].hold_duration_ms, 1000);
        assert_eq!(mode.stats().successes, 1);
        assert_eq!(mode.stats().attempts, 1);
        assert!(mode.stats().best_accuracy_cents.unwrap() < 0.5);
    }

    #[test]
    fn losing_the_pitch_counts_an_attempt_but_no_success() {
        let mut mode = a4_practice();
        mode.update(&on_pitch(440.0), 0);
        mode.update(&on_pitch(440.0), 500);
        let events = mode.update(&PitchEstimate::unvoiced(0.0), 600);

        assert!(events
            .iter()
            .any(|e| matches!(e, ModeEvent::AttemptFailed { attempt: 1, .. })));
        assert_eq!(mode.stats().attempts, 1);
        assert_eq!(mode.stats().successes, 0);
        assert_eq!(mode.stats().total_hold_time_ms, 600);
        assert!((mode.stats().success_rate()).abs() < f32::EPSILON);
    }

    #[test]
    fn never_terminates() {
        let mut mode = a4_practice();
        let mut t = 0;
        for _ in 0..5 {
            for _ in 0..=10 {
                mode.update(&on_pitch(440.0), t);
                t += 100;
            }
            mode.update(&PitchEstimate::unvoiced(0.0), t);
            t += 100;
        }
        assert_eq!(mode.stats().successes, 5);
    }

    #[test]
    fn retarget_resets_statistics() {
        let mut mode = a4_practice();
        for t in (0..=1000).step_by(100) {
            mode.update(&on_pitch(440.0), t);
        }
        mode.set_target("C4").unwrap();
        assert_eq!(mode.target_note(), "C4");
        assert_eq!(mode.stats(), &PracticeStats::default());
        assert!(!mode.hold().is_holding);
    }

    #[test]
    fn low_confidence_never_matches() {
        let mut mode = a4_practice();
        let weak = PitchEstimate {
            confidence: 0.5,
            ..on_pitch(440.0)
        };
        for t in (0..3000).step_by(100) {
            assert!(hits(&mode.update(&weak, t)).is_empty());
        }
        assert_eq!(mode.stats().attempts, 0);
    }

    #[test]
    fn progress_is_always_reported_first() {
        let mut mode = a4_practice();
        let events = mode.update(&on_pitch(440.0), 0);
        assert!(matches!(events[0], ModeEvent::Progress(_)));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut mode = a4_practice();
        for t in (0..=1000).step_by(100) {
            mode.update(&on_pitch(440.0), t);
        }
        let value = serde_json::to_value(mode.snapshot()).unwrap();
        let restored = PracticeMode::restore(&value);
        assert_eq!(restored.config(), mode.config());
        assert_eq!(restored.stats(), mode.stats());
    }

    #[test]
    fn restore_tolerates_garbage() {
        let restored = PracticeMode::restore(&json!({
            "config": {"target_note": "nonsense", "hold_time_ms": "slow"},
            "stats": 12
        }));
        assert_eq!(restored.config(), &PracticeConfig::default());
        assert_eq!(restored.stats(), &PracticeStats::default());

        let restored = PracticeMode::restore(&json!(null));
        assert_eq!(restored.target_note(), "C4");
    }
}
