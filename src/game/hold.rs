use serde::{Deserialize, Serialize};

use crate::dsp::PitchEstimate;
use crate::error::NoteError;
use crate::notes;

/// Estimates at or below this confidence never count as on-target.
pub const MATCH_CONFIDENCE: f32 = 0.7;

/// One on-target frame inside a hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldSample {
    pub cents: f32,
    pub confidence: f32,
    pub timestamp_ms: u64,
}

/// What happened to the hold on this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldUpdate {
    /// Not holding and not on target.
    Idle,
    /// First on-target frame.
    Started,
    /// Still on target, not long enough yet.
    Holding { elapsed_ms: u64, progress: f32 },
    /// Held for the full duration. The hold has been cleared.
    Completed {
        average_cents: f32,
        duration_ms: u64,
        sample_count: usize,
    },
    /// Went off target mid-hold. Samples are discarded, nothing is credited.
    Lost { elapsed_ms: u64 },
}

/// An in-progress attempt at sustaining a target pitch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldState {
    pub is_holding: bool,
    pub hold_start_ms: Option<u64>,
    pub samples: Vec<HoldSample>,
}

impl HoldState {
    pub fn clear(&mut self) {
        self.is_holding = false;
        self.hold_start_ms = None;
        self.samples.clear();
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.hold_start_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    /// Advance the hold by one frame.
    ///
    /// `matched` is `Some((cents, confidence))` when this frame is on target.
    pub fn update(&mut self, matched: Option<(f32, f32)>, now_ms: u64, hold_time_ms: u64) -> HoldUpdate {
        let Some((cents, confidence)) = matched else {
            if self.is_holding {
                let elapsed_ms = self.elapsed_ms(now_ms);
                self.clear();
                return HoldUpdate::Lost { elapsed_ms };
            }
            return HoldUpdate::Idle;
        };

        let started = !self.is_holding;
        if started {
            self.is_holding = true;
            self.hold_start_ms = Some(now_ms);
            self.samples.clear();
        }
        self.samples.push(HoldSample {
            cents,
            confidence,
            timestamp_ms: now_ms,
        });

        let elapsed_ms = self.elapsed_ms(now_ms);
        if elapsed_ms >= hold_time_ms {
            let sample_count = self.samples.len();
            let average_cents = self.samples.iter().map(|s| s.cents).sum::<f32>() / sample_count as f32;
            self.clear();
            return HoldUpdate::Completed {
                average_cents,
                duration_ms: elapsed_ms,
                sample_count,
            };
        }

        if started {
            HoldUpdate::Started
        } else {
            HoldUpdate::Holding {
                elapsed_ms,
                progress: progress(elapsed_ms, hold_time_ms),
            }
        }
    }
}

/// Fraction of `hold_time_ms` covered by `elapsed_ms`, clamped to 0..1.
pub fn progress(elapsed_ms: u64, hold_time_ms: u64) -> f32 {
    if hold_time_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f32 / hold_time_ms as f32).clamp(0.0, 1.0)
}

/// Decide whether an estimate is on `target`.
///
/// Returns the signed cents from the target (even when off target) and
/// whether the frame counts as a match: voiced, confident, within tolerance.
pub fn evaluate(
    estimate: &PitchEstimate,
    target: &str,
    tolerance_cents: f32,
) -> Result<(Option<f32>, bool), NoteError> {
    let Some(frequency) = estimate.frequency else {
        // Still validate the target so a bad note name surfaces immediately.
        notes::note_name_to_midi(target)?;
        return Ok((None, false));
    };
    let result = notes::check_note_match(frequency, target, tolerance_cents)?;
    let matched = estimate.confidence > MATCH_CONFIDENCE && result.is_match;
    Ok((Some(result.cents), matched))
}
