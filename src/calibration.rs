//! Voice range calibration.
//!
//! A short scripted session: check the microphone level, collect sung pitches
//! while the user slides from their lowest to highest comfortable note, then
//! derive a voice type and starting octave. Runs on tokio so a caller can
//! abandon it at any point without waiting out the current sleep.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::dsp::PitchEstimate;
use crate::notes;

/// Minimum average volume during the level check.
pub const MIN_VOLUME: f32 = 0.05;
/// Range samples need more confidence than this to count.
pub const MIN_CONFIDENCE: f32 = 0.5;
/// Qualifying samples needed for a usable range.
pub const MIN_RANGE_SAMPLES: usize = 10;

const VOLUME_WEIGHT: f32 = 0.3;
const RANGE_WEIGHT: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPhase {
    Idle,
    VolumeTest,
    RangeDetect,
    Analysis,
    Complete,
    Failed,
}

impl fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalibrationPhase::Idle => "idle",
            CalibrationPhase::VolumeTest => "volume test",
            CalibrationPhase::RangeDetect => "range detection",
            CalibrationPhase::Analysis => "analysis",
            CalibrationPhase::Complete => "complete",
            CalibrationPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceType {
    Bass,
    Baritone,
    Tenor,
    Alto,
    Soprano,
}

impl VoiceType {
    /// Classify by the midpoint of the sung range, returning the voice type
    /// and the octave its scale challenge should start in.
    pub fn classify(midpoint_midi: f32) -> (Self, i32) {
        if midpoint_midi < 50.0 {
            (VoiceType::Bass, 3)
        } else if midpoint_midi < 57.0 {
            (VoiceType::Baritone, 3)
        } else if midpoint_midi < 64.0 {
            (VoiceType::Tenor, 4)
        } else if midpoint_midi < 72.0 {
            (VoiceType::Alto, 4)
        } else {
            (VoiceType::Soprano, 4)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceType::Bass => "bass",
            VoiceType::Baritone => "baritone",
            VoiceType::Tenor => "tenor",
            VoiceType::Alto => "alto",
            VoiceType::Soprano => "soprano",
        }
    }
}

impl fmt::Display for VoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub lowest_note: String,
    pub highest_note: String,
    pub lowest_midi: i32,
    pub highest_midi: i32,
    pub recommended_octave: i32,
    pub voice_type: VoiceType,
}

/// Why calibration did not produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Microphone level too low (average {average:.3})\n  Move closer to the microphone or raise the input gain")]
    VolumeTooLow { average: f32 },

    #[error("Only {collected} usable pitch samples (need 10)\n  Sing steadily from your lowest to your highest note")]
    InsufficientData { collected: usize },

    #[error("Calibration failed: {0}")]
    Failed(String),

    #[error("Calibration cancelled")]
    Cancelled,
}

impl CalibrationError {
    /// Stable code for storage and scripting.
    pub fn code(&self) -> &'static str {
        match self {
            CalibrationError::VolumeTooLow { .. } => "VOLUME_TOO_LOW",
            CalibrationError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            CalibrationError::Failed(_) => "CALIBRATION_FAILED",
            CalibrationError::Cancelled => "CANCELLED",
        }
    }
}

/// Progress report passed to the caller's callback.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationProgress {
    pub phase: CalibrationPhase,
    /// Overall progress across all phases, 0..1.
    pub overall: f32,
    pub message: String,
}

/// Anything that can hand out the current pitch estimate on demand.
pub trait PitchSource {
    fn sample(&mut self) -> anyhow::Result<PitchEstimate>;
}

impl<F> PitchSource for F
where
    F: FnMut() -> anyhow::Result<PitchEstimate>,
{
    fn sample(&mut self) -> anyhow::Result<PitchEstimate> {
        self()
    }
}

/// Sample counts and spacing for each timed phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTiming {
    pub volume_samples: u32,
    pub volume_interval: Duration,
    pub range_samples: u32,
    pub range_interval: Duration,
}

impl Default for CalibrationTiming {
    fn default() -> Self {
        // 3 s of level check, 10 s of range
        Self {
            volume_samples: 30,
            volume_interval: Duration::from_millis(100),
            range_samples: 50,
            range_interval: Duration::from_millis(200),
        }
    }
}

/// Sender side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiver side, held by the running calibration.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancelled. Pends forever if the handle was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|c| *c).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

/// One qualifying pitch collected while sweeping the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSample {
    pub frequency: f32,
    pub note: String,
    pub midi: i32,
    pub confidence: f32,
}

impl RangeSample {
    pub fn new(frequency: f32, confidence: f32) -> Self {
        let midi = notes::frequency_to_midi(frequency).round() as i32;
        Self {
            frequency,
            note: notes::midi_to_note_name(midi as f32),
            midi,
            confidence,
        }
    }
}

pub struct CalibrationEngine<S> {
    source: S,
    timing: CalibrationTiming,
    phase: CalibrationPhase,
    samples: Vec<RangeSample>,
}

impl<S: PitchSource> CalibrationEngine<S> {
    pub fn new(source: S) -> Self {
        Self::with_timing(source, CalibrationTiming::default())
    }

    pub fn with_timing(source: S, timing: CalibrationTiming) -> Self {
        Self {
            source,
            timing,
            phase: CalibrationPhase::Idle,
            samples: Vec::new(),
        }
    }

    /// Samples kept by the last range phase.
    pub fn range_samples(&self) -> &[RangeSample] {
        &self.samples
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Run all phases. Failures of any kind come back as `CalibrationError`.
    pub async fn run<F>(
        &mut self,
        cancel: &mut CancelToken,
        mut on_progress: F,
    ) -> Result<CalibrationResult, CalibrationError>
    where
        F: FnMut(&CalibrationProgress),
    {
        let result = self.run_phases(cancel, &mut on_progress).await;
        match &result {
            Ok(r) => {
                self.phase = CalibrationPhase::Complete;
                tracing::info!(
                    low = %r.lowest_note,
                    high = %r.highest_note,
                    voice = %r.voice_type,
                    "calibration complete"
                );
                on_progress(&CalibrationProgress {
                    phase: CalibrationPhase::Complete,
                    overall: 1.0,
                    message: format!("{} to {} ({})", r.lowest_note, r.highest_note, r.voice_type),
                });
            }
            Err(e) => {
                self.phase = CalibrationPhase::Failed;
                tracing::warn!(code = e.code(), "calibration failed: {e}");
            }
        }
        result
    }

    async fn run_phases<F>(
        &mut self,
        cancel: &mut CancelToken,
        on_progress: &mut F,
    ) -> Result<CalibrationResult, CalibrationError>
    where
        F: FnMut(&CalibrationProgress),
    {
        // Level check
        self.enter(CalibrationPhase::VolumeTest);
        let n = self.timing.volume_samples.max(1);
        let mut volume_sum = 0.0;
        for i in 0..n {
            let estimate = self.sample(cancel)?;
            volume_sum += estimate.volume;
            on_progress(&CalibrationProgress {
                phase: CalibrationPhase::VolumeTest,
                overall: VOLUME_WEIGHT * (i + 1) as f32 / n as f32,
                message: "Say \"ahh\" at a comfortable volume".into(),
            });
            pause(self.timing.volume_interval, cancel).await?;
        }
        let average = volume_sum / n as f32;
        tracing::debug!(average, "volume test done");
        if average < MIN_VOLUME {
            return Err(CalibrationError::VolumeTooLow { average });
        }

        // Range
        self.enter(CalibrationPhase::RangeDetect);
        let n = self.timing.range_samples.max(1);
        self.samples.clear();
        for i in 0..n {
            let estimate = self.sample(cancel)?;
            if let Some(frequency) = estimate.frequency {
                if estimate.confidence > MIN_CONFIDENCE && estimate.volume > MIN_VOLUME {
                    self.samples.push(RangeSample::new(frequency, estimate.confidence));
                }
            }
            on_progress(&CalibrationProgress {
                phase: CalibrationPhase::RangeDetect,
                overall: VOLUME_WEIGHT + RANGE_WEIGHT * (i + 1) as f32 / n as f32,
                message: "Slide from your lowest note to your highest".into(),
            });
            pause(self.timing.range_interval, cancel).await?;
        }
        tracing::debug!(collected = self.samples.len(), "range detection done");

        self.enter(CalibrationPhase::Analysis);
        on_progress(&CalibrationProgress {
            phase: CalibrationPhase::Analysis,
            overall: VOLUME_WEIGHT + RANGE_WEIGHT,
            message: "Analysing your range".into(),
        });
        analyze_range(&self.samples)
    }

    fn enter(&mut self, phase: CalibrationPhase) {
        tracing::info!(%phase, "calibration phase");
        self.phase = phase;
    }

    fn sample(&mut self, cancel: &CancelToken) -> Result<PitchEstimate, CalibrationError> {
        if cancel.is_cancelled() {
            return Err(CalibrationError::Cancelled);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.source.sample())) {
            Ok(result) => result.map_err(|e| CalibrationError::Failed(format!("{e:#}"))),
            Err(_) => {
                tracing::error!("pitch source panicked");
                Err(CalibrationError::Failed("pitch source panicked".into()))
            }
        }
    }
}

async fn pause(duration: Duration, cancel: &mut CancelToken) -> Result<(), CalibrationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CalibrationError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Turn qualifying range samples into a range and voice classification.
pub fn analyze_range(samples: &[RangeSample]) -> Result<CalibrationResult, CalibrationError> {
    if samples.len() < MIN_RANGE_SAMPLES {
        return Err(CalibrationError::InsufficientData {
            collected: samples.len(),
        });
    }
    let midis = samples.iter().map(|s| s.midi);
    let (Some(lowest_midi), Some(highest_midi)) = (midis.clone().min(), midis.max()) else {
        return Err(CalibrationError::InsufficientData { collected: 0 });
    };

    let midpoint = (lowest_midi + highest_midi) as f32 / 2.0;
    let (voice_type, recommended_octave) = VoiceType::classify(midpoint);

    Ok(CalibrationResult {
        lowest_note: notes::midi_to_note_name(lowest_midi as f32),
        highest_note: notes::midi_to_note_name(highest_midi as f32),
        lowest_midi,
        highest_midi,
        recommended_octave,
        voice_type,
    })
}
