//! YIN fundamental frequency estimation on a single audio frame.
//!
//! The four stages follow de Cheveigné & Kawahara (2002):
//!
//!   1. Difference function      d(τ)  = Σ (x[i] - x[i+τ])²  over the first half of the frame
//!   2. Cumulative mean normalize d'(τ) = d(τ) / ((1/τ) Σ_{j=1..τ} d(j)),  d'(0) = 1
//!   3. Absolute threshold       first τ with d'(τ) < threshold, then slide down to the local minimum
//!   4. Parabolic interpolation  sub-sample refinement of τ
//!
//! The detector is stateless between frames apart from its configuration and
//! scratch buffers, so it can live on its own thread (see `dsp::worker`).

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Frames quieter than this (after gain) are reported as "no pitch" without running YIN.
pub const DEFAULT_VOLUME_FLOOR: f32 = 0.005;

/// RMS is multiplied by this before clamping to produce the 0..1 volume.
pub const DEFAULT_VOLUME_GAIN: f32 = 10.0;

/// How the difference function d(τ) is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceMethod {
    /// Plain O(N²/4) double loop.
    #[default]
    Direct,
    /// Energy terms plus an FFT cross-correlation. Same result, O(N log N).
    Fft,
}

impl std::str::FromStr for DifferenceMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "fft" => Ok(Self::Fft),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

/// Detector parameters. `sample_rate`, `buffer_size` and `yin_threshold` are
/// the ones callers normally change; the rest have sensible singing defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sample_rate: u32,
    /// Expected frame length. Frames of other lengths are still analyzed.
    pub buffer_size: usize,
    /// YIN absolute threshold. The paper suggests 0.10-0.15.
    pub yin_threshold: f32,
    /// Lowest frequency searched (sets the longest lag).
    pub min_frequency_hz: f32,
    /// Highest frequency searched (sets the shortest lag).
    pub max_frequency_hz: f32,
    pub volume_floor: f32,
    pub volume_gain: f32,
    pub method: DifferenceMethod,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 1024,
            yin_threshold: 0.15,
            // Human singing range
            min_frequency_hz: 80.0,
            max_frequency_hz: 1000.0,
            volume_floor: DEFAULT_VOLUME_FLOOR,
            volume_gain: DEFAULT_VOLUME_GAIN,
            method: DifferenceMethod::Direct,
        }
    }
}

impl DetectorConfig {
    /// Reject values that would make every frame meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Detector("sample_rate must be positive".into()));
        }
        if self.buffer_size < 4 {
            return Err(ConfigError::Detector(format!(
                "buffer_size {} is too small (minimum 4)",
                self.buffer_size
            )));
        }
        if !(self.yin_threshold > 0.0 && self.yin_threshold < 1.0) {
            return Err(ConfigError::Detector(format!(
                "yin_threshold {} must be between 0 and 1",
                self.yin_threshold
            )));
        }
        if !(self.min_frequency_hz > 0.0 && self.min_frequency_hz < self.max_frequency_hz) {
            return Err(ConfigError::Detector(format!(
                "frequency range {}-{} Hz is empty",
                self.min_frequency_hz, self.max_frequency_hz
            )));
        }
        Ok(())
    }
}

/// One detector output. Produced once per frame and consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PitchEstimate {
    /// Detected fundamental in Hz, or None when no periodicity was found.
    pub frequency: Option<f32>,
    /// 1 - d'(τ) at the chosen lag, 0..1.
    pub confidence: f32,
    /// How far the best dip sits below the average of d', 0..1.
    pub clarity: f32,
    /// Gain-scaled RMS, 0..1.
    pub volume: f32,
}

impl PitchEstimate {
    /// A "no pitch" estimate that still reports the input level.
    pub fn unvoiced(volume: f32) -> Self {
        Self {
            frequency: None,
            confidence: 0.0,
            clarity: 0.0,
            volume,
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.frequency.is_some()
    }
}

/// RMS of a sample buffer (linear, not dB).
pub fn frame_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// YIN pitch detector with reusable scratch buffers.
pub struct YinDetector {
    config: DetectorConfig,
    /// d(τ), then d'(τ) in place.
    yin_buffer: Vec<f32>,
    fft: Option<FftScratch>,
}

impl YinDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            yin_buffer: vec![0.0; config.buffer_size / 2],
            fft: None,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Swap in new parameters. Scratch buffers are resized on the next frame.
    pub fn reconfigure(&mut self, config: DetectorConfig) -> Result<(), ConfigError> {
        config.validate()?;
        tracing::debug!(
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            threshold = config.yin_threshold,
            "detector reconfigured"
        );
        self.config = config;
        self.fft = None;
        Ok(())
    }

    /// Analyze one frame. Never fails: silence and noise come back as `frequency: None`.
    pub fn detect(&mut self, frame: &[f32]) -> PitchEstimate {
        let volume = (frame_rms(frame) * self.config.volume_gain).clamp(0.0, 1.0);
        if !volume.is_finite() || volume < self.config.volume_floor {
            return PitchEstimate::unvoiced(if volume.is_finite() { volume } else { 0.0 });
        }

        let half = frame.len() / 2;
        if half < 3 {
            return PitchEstimate::unvoiced(volume);
        }

        self.yin_buffer.resize(half, 0.0);
        match self.config.method {
            DifferenceMethod::Direct => difference_direct(frame, &mut self.yin_buffer),
            DifferenceMethod::Fft => {
                let scratch = match self.fft.take() {
                    Some(s) if s.len == fft_len(frame.len()) => s,
                    _ => FftScratch::new(fft_len(frame.len())),
                };
                let scratch = self.fft.insert(scratch);
                scratch.difference(frame, &mut self.yin_buffer);
            }
        }
        cumulative_mean_normalize(&mut self.yin_buffer);

        let clarity = clarity(&self.yin_buffer);

        let sr = self.config.sample_rate as f32;
        let min_tau = ((sr / self.config.max_frequency_hz).floor() as usize).max(2);
        // Leave room for τ+1 during the descent and interpolation.
        let max_tau = ((sr / self.config.min_frequency_hz).floor() as usize).min(half - 2);

        let Some(tau) = absolute_threshold(&self.yin_buffer, min_tau, max_tau, self.config.yin_threshold)
        else {
            return PitchEstimate {
                frequency: None,
                confidence: 0.0,
                clarity,
                volume,
            };
        };

        let refined = parabolic_interpolation(&self.yin_buffer, tau);
        if refined <= 0.0 {
            return PitchEstimate::unvoiced(volume);
        }

        let index = (refined.round() as usize).min(half - 1);
        let confidence = (1.0 - self.yin_buffer[index]).clamp(0.0, 1.0);

        PitchEstimate {
            frequency: Some(sr / refined),
            confidence,
            clarity,
            volume,
        }
    }
}

/// Stage 1, direct form.
fn difference_direct(frame: &[f32], out: &mut [f32]) {
    let half = out.len();
    for (tau, slot) in out.iter_mut().enumerate() {
        let mut sum = 0.0f32;
        for i in 0..half {
            let delta = frame[i] - frame[i + tau];
            sum += delta * delta;
        }
        *slot = sum;
    }
}

/// Stage 2. Rewrites d(τ) into d'(τ) in place.
fn cumulative_mean_normalize(buffer: &mut [f32]) {
    if buffer.is_empty() {
        return;
    }
    buffer[0] = 1.0;
    let mut running_sum = 0.0f32;
    for tau in 1..buffer.len() {
        running_sum += buffer[tau];
        buffer[tau] = if running_sum > 0.0 {
            buffer[tau] * tau as f32 / running_sum
        } else {
            1.0
        };
    }
}

/// 1 - min/mean over the whole normalized buffer.
fn clarity(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let min = buffer.iter().copied().fold(f32::INFINITY, f32::min);
    let mean = buffer.iter().sum::<f32>() / buffer.len() as f32;
    if mean <= 0.0 {
        return 0.0;
    }
    (1.0 - min / mean).clamp(0.0, 1.0)
}

/// Stage 3. First lag under `threshold`, then follow the dip to its bottom.
fn absolute_threshold(buffer: &[f32], min_tau: usize, max_tau: usize, threshold: f32) -> Option<usize> {
    if min_tau > max_tau {
        return None;
    }
    let mut tau = (min_tau..=max_tau).find(|&t| buffer[t] < threshold)?;
    while tau + 1 < buffer.len() && buffer[tau + 1] < buffer[tau] {
        tau += 1;
    }
    Some(tau)
}

/// Stage 4. Vertex of the parabola through d'(τ-1), d'(τ), d'(τ+1).
fn parabolic_interpolation(buffer: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= buffer.len() {
        return tau as f32;
    }
    let prev = buffer[tau - 1];
    let current = buffer[tau];
    let next = buffer[tau + 1];
    let denominator = 2.0 * (2.0 * current - next - prev);
    if denominator.abs() < f32::EPSILON {
        return tau as f32;
    }
    tau as f32 + (next - prev) / denominator
}

fn fft_len(frame_len: usize) -> usize {
    frame_len.next_power_of_two()
}

/// Buffers and plans for the FFT form of the difference function.
///
/// d(τ) = Σ x[i]² + Σ x[i+τ]² - 2 Σ x[i]·x[i+τ]   (sums over i in 0..W)
///
/// The first two terms are running energies; the cross term is a
/// cross-correlation of the first half-window against the whole frame.
struct FftScratch {
    len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<Complex<f32>>,
    signal: Vec<Complex<f32>>,
}

impl FftScratch {
    fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
            window: vec![Complex::new(0.0, 0.0); len],
            signal: vec![Complex::new(0.0, 0.0); len],
        }
    }

    fn difference(&mut self, frame: &[f32], out: &mut [f32]) {
        let half = out.len();
        let zero = Complex::new(0.0, 0.0);

        self.window.fill(zero);
        self.signal.fill(zero);
        for (slot, &s) in self.window.iter_mut().zip(&frame[..half]) {
            slot.re = s;
        }
        for (slot, &s) in self.signal.iter_mut().zip(frame) {
            slot.re = s;
        }

        self.forward.process(&mut self.window);
        self.forward.process(&mut self.signal);

        // conj(A)·B transforms to r[τ] = Σ a[i]·b[i+τ]. No wrap-around since
        // i + τ < 2·half <= len.
        for (a, b) in self.window.iter_mut().zip(&self.signal) {
            *a = a.conj() * b;
        }
        self.inverse.process(&mut self.window);
        let scale = 1.0 / self.len as f32;

        let head_energy: f32 = frame[..half].iter().map(|s| s * s).sum();
        let mut shifted_energy = head_energy;

        for tau in 0..half {
            if tau > 0 {
                shifted_energy += frame[tau + half - 1] * frame[tau + half - 1]
                    - frame[tau - 1] * frame[tau - 1];
            }
            let cross = self.window[tau].re * scale;
            out[tau] = (head_energy + shifted_energy - 2.0 * cross).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// Generate `len` samples of a sine at `freq_hz`.
    fn sine_frame(freq_hz: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn detector() -> YinDetector {
        YinDetector::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn detects_440hz_sine() {
        let frame = sine_frame(440.0, 44100, 1024, 0.5);
        let estimate = detector().detect(&frame);

        let hz = estimate.frequency.expect("440 Hz sine should be voiced");
        assert!((hz - 440.0).abs() < 1.0, "expected ~440 Hz, got {hz:.2}");
        assert!(estimate.confidence > 0.8, "confidence {:.3}", estimate.confidence);
        assert!(estimate.clarity > 0.8, "clarity {:.3}", estimate.clarity);
    }

    #[test]
    fn detects_across_singing_range() {
        let mut det = detector();
        for target in [110.0, 196.0, 261.63, 523.25, 880.0] {
            let frame = sine_frame(target, 44100, 1024, 0.4);
            let hz = det.detect(&frame).frequency.expect("sine should be voiced");
            assert!(
                (hz - target).abs() / target < 0.01,
                "expected ~{target} Hz, got {hz:.2}"
            );
        }
    }

    #[test]
    fn silence_has_no_pitch() {
        let estimate = detector().detect(&vec![0.0; 1024]);
        assert!(estimate.frequency.is_none());
        assert_eq!(estimate.volume, 0.0);
        assert_eq!(estimate.confidence, 0.0);
    }

    #[test]
    fn sub_floor_volume_has_no_pitch() {
        // RMS ~0.00035 -> volume ~0.0035, under the 0.005 floor
        let frame = sine_frame(440.0, 44100, 1024, 0.0005);
        let estimate = detector().detect(&frame);
        assert!(estimate.frequency.is_none());
        assert!(estimate.volume > 0.0 && estimate.volume < DEFAULT_VOLUME_FLOOR);
    }

    #[test]
    fn volume_is_scaled_and_clamped() {
        // Full-scale sine: RMS ~0.707, x10 clamps to 1.0
        let loud = sine_frame(440.0, 44100, 1024, 1.0);
        assert_eq!(detector().detect(&loud).volume, 1.0);

        let quiet = sine_frame(440.0, 44100, 1024, 0.01);
        let v = detector().detect(&quiet).volume;
        assert!((v - 0.0707).abs() < 0.005, "volume {v}");
    }

    #[test]
    fn white_noise_is_rejected() {
        // Deterministic LCG noise so the test is reproducible.
        let mut state: u32 = 12345;
        let frame: Vec<f32> = (0..1024)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                ((state >> 16) as f32 / 32768.0) - 1.0
            })
            .collect();
        let estimate = detector().detect(&frame);
        assert!(estimate.frequency.is_none() || estimate.confidence < 0.9);
    }

    #[test]
    fn empty_and_tiny_frames_do_not_panic() {
        let mut det = detector();
        assert!(det.detect(&[]).frequency.is_none());
        assert!(det.detect(&[0.5, -0.5, 0.5]).frequency.is_none());
    }

    #[test]
    fn fft_difference_matches_direct() {
        let frame = sine_frame(330.0, 44100, 1024, 0.6);
        let mut direct = vec![0.0; 512];
        difference_direct(&frame, &mut direct);

        let mut fft = vec![0.0; 512];
        FftScratch::new(1024).difference(&frame, &mut fft);

        let peak = direct.iter().copied().fold(0.0f32, f32::max);
        for (tau, (a, b)) in direct.iter().zip(&fft).enumerate() {
            assert!(
                (a - b).abs() <= peak * 1e-3,
                "τ={tau}: direct {a} vs fft {b}"
            );
        }
    }

    #[test]
    fn fft_method_detects_same_pitch() {
        let config = DetectorConfig {
            method: DifferenceMethod::Fft,
            ..DetectorConfig::default()
        };
        let mut det = YinDetector::new(config).unwrap();
        let frame = sine_frame(440.0, 44100, 1024, 0.5);
        let hz = det.detect(&frame).frequency.unwrap();
        assert!((hz - 440.0).abs() < 1.0, "got {hz:.2}");
    }

    #[test]
    fn agrees_with_mcleod_reference() {
        use pitch_detection::detector::mcleod::McLeodDetector;
        use pitch_detection::detector::PitchDetector;

        let frame = sine_frame(261.63, 44100, 2048, 0.5);
        let signal: Vec<f64> = frame.iter().map(|&s| s as f64).collect();
        let mut reference = McLeodDetector::new(2048, 1024);
        let expected = reference
            .get_pitch(&signal, 44100, 0.2, 0.2)
            .expect("reference detector should find the pitch")
            .frequency as f32;

        let ours = detector().detect(&frame[..1024]).frequency.unwrap();
        assert!((ours - expected).abs() < 2.0, "ours {ours:.2} vs reference {expected:.2}");
    }

    #[test]
    fn reconfigure_changes_sample_rate() {
        let mut det = detector();
        det.reconfigure(DetectorConfig {
            sample_rate: 48000,
            ..DetectorConfig::default()
        })
        .unwrap();
        let frame = sine_frame(440.0, 48000, 1024, 0.5);
        let hz = det.detect(&frame).frequency.unwrap();
        assert!((hz - 440.0).abs() < 1.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = DetectorConfig {
            yin_threshold: 1.5,
            ..DetectorConfig::default()
        };
        assert!(YinDetector::new(bad).is_err());

        let bad = DetectorConfig {
            sample_rate: 0,
            ..DetectorConfig::default()
        };
        assert!(detector().reconfigure(bad).is_err());
    }

    #[test]
    fn normalized_buffer_starts_at_one() {
        let mut buffer = vec![0.0, 2.0, 4.0, 6.0];
        cumulative_mean_normalize(&mut buffer);
        assert_eq!(buffer[0], 1.0);
        // τ=1: 2 / (2/1) = 1.0 ; τ=2: 4*2/6 ; τ=3: 6*3/12
        assert!((buffer[1] - 1.0).abs() < 1e-6);
        assert!((buffer[2] - 8.0 / 6.0).abs() < 1e-6);
        assert!((buffer[3] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn zero_difference_normalizes_to_one() {
        let mut buffer = vec![0.0; 8];
        cumulative_mean_normalize(&mut buffer);
        assert!(buffer.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn interpolation_keeps_edges() {
        let buffer = vec![1.0, 0.5, 0.2];
        assert_eq!(parabolic_interpolation(&buffer, 0), 0.0);
        assert_eq!(parabolic_interpolation(&buffer, 2), 2.0);
    }

    #[test]
    fn interpolation_finds_symmetric_vertex() {
        // Symmetric dip around index 2
        let buffer = vec![1.0, 0.5, 0.1, 0.5, 1.0];
        assert!((parabolic_interpolation(&buffer, 2) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn threshold_walks_to_local_minimum() {
        let buffer = vec![1.0, 0.9, 0.14, 0.08, 0.05, 0.2, 0.9];
        assert_eq!(absolute_threshold(&buffer, 1, 5, 0.15), Some(4));
        assert_eq!(absolute_threshold(&buffer, 1, 5, 0.01), None);
    }

    #[test]
    fn method_parses_from_str() {
        assert_eq!("fft".parse::<DifferenceMethod>().unwrap(), DifferenceMethod::Fft);
        assert!("fast".parse::<DifferenceMethod>().is_err());
    }
}
