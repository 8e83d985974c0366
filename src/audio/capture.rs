use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use crate::calibration::PitchSource;
use crate::dsp::{DetectorConfig, DetectorWorker, PitchEstimate};

/// Cuts a stream of sample chunks into overlapping fixed-length frames.
#[derive(Debug)]
pub struct Framer {
    frame_len: usize,
    hop: usize,
    buf: Vec<f32>,
}

impl Framer {
    /// `hop` is clamped to 1..=frame_len.
    pub fn new(frame_len: usize, hop: usize) -> Self {
        Self {
            frame_len,
            hop: hop.clamp(1, frame_len.max(1)),
            buf: Vec::with_capacity(frame_len * 2),
        }
    }

    /// Append samples and return every complete frame now available.
    pub fn push(&mut self, chunk: &[f32]) -> Vec<Vec<f32>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while self.buf.len() >= self.frame_len {
            frames.push(self.buf[..self.frame_len].to_vec());
            self.buf.drain(..self.hop);
        }
        frames
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// State shared between the detection thread and readers.
#[derive(Default)]
struct Shared {
    latest: Mutex<PitchEstimate>,
    /// Bumped once per published estimate; 0 means none yet.
    sequence: AtomicU64,
    failed: AtomicBool,
}

/// A running microphone with pitch detection.
///
/// cpal delivers chunks to a framing thread, which hands the newest complete
/// frame to the detector worker and publishes the result. Readers poll
/// `latest` from any thread. Dropping the handle stops everything.
pub struct LiveInput {
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    stream: Option<cpal::Stream>,
    detector_thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    device_name: String,
}

impl LiveInput {
    /// Open the default input device and start detecting.
    ///
    /// The detector's sample rate is replaced by the device's.
    pub fn start(config: &DetectorConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No default input device found")?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());

        let input_config = device
            .default_input_config()
            .context("Failed to get default input config")?;

        let sample_rate = input_config.sample_rate().0;
        let channels = (input_config.channels() as usize).max(1);
        let format = input_config.sample_format();

        let detector_config = DetectorConfig {
            sample_rate,
            ..config.clone()
        };
        let worker = DetectorWorker::spawn(detector_config.clone())
            .context("Failed to start pitch detector")?;
        tracing::info!(device = %device_name, sample_rate, channels, ?format, "opening input");

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stream_config: cpal::StreamConfig = input_config.into();

        let stream = match format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, channels, tx, Arc::clone(&stop), |s| s)?
            }
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &stream_config,
                channels,
                tx,
                Arc::clone(&stop),
                |s| s as f32 / i16::MAX as f32,
            )?,
            SampleFormat::U16 => build_stream::<u16>(
                &device,
                &stream_config,
                channels,
                tx,
                Arc::clone(&stop),
                |s| (s as f32 - 32768.0) / 32768.0,
            )?,
            other => anyhow::bail!("Unsupported sample format: {other:?}"),
        };

        stream.play().context("Failed to start audio stream")?;

        let shared = Arc::new(Shared::default());
        let detector_thread = {
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&stop);
            let frame_len = detector_config.buffer_size;
            std::thread::Builder::new()
                .name("pitch-framer".into())
                .spawn(move || run_framer(rx, worker, Framer::new(frame_len, frame_len / 2), shared, stop))
                .context("Failed to spawn framing thread")?
        };

        Ok(Self {
            shared,
            stop,
            stream: Some(stream),
            detector_thread: Some(detector_thread),
            sample_rate,
            device_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Most recent estimate with its sequence number, or None before the first one.
    pub fn latest(&self) -> Option<(u64, PitchEstimate)> {
        let seq = self.shared.sequence.load(Ordering::Acquire);
        if seq == 0 {
            return None;
        }
        let estimate = self.shared.latest.lock().map(|e| *e).ok()?;
        Some((seq, estimate))
    }

    /// Whether the detection pipeline has stopped on its own.
    pub fn has_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Relaxed)
    }
}

impl PitchSource for LiveInput {
    fn sample(&mut self) -> Result<PitchEstimate> {
        if self.has_failed() {
            anyhow::bail!("pitch detection stopped unexpectedly");
        }
        Ok(self
            .latest()
            .map(|(_, e)| e)
            .unwrap_or_else(|| PitchEstimate::unvoiced(0.0)))
    }
}

impl Drop for LiveInput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Dropping the stream closes the chunk channel, which ends the framer.
        drop(self.stream.take());
        if let Some(handle) = self.detector_thread.take() {
            let _ = handle.join();
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    tx: mpsc::Sender<Vec<f32>>,
    stop: Arc<AtomicBool>,
    to_f32: fn(T) -> f32,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let mono: Vec<f32> = data.iter().step_by(channels).map(|&s| to_f32(s)).collect();
                let _ = tx.send(mono);
            },
            |err| tracing::error!("audio stream error: {err}"),
            None,
        )
        .context("Failed to build input stream")?;
    Ok(stream)
}

/// Framing loop. Only the newest frame of each batch is analyzed so the
/// published estimate never lags behind the microphone.
fn run_framer(
    rx: mpsc::Receiver<Vec<f32>>,
    mut worker: DetectorWorker,
    mut framer: Framer,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
) {
    for chunk in rx.iter() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let Some(frame) = framer.push(&chunk).pop() else {
            continue;
        };
        match worker.detect_blocking(frame) {
            Ok(estimate) => {
                if let Ok(mut latest) = shared.latest.lock() {
                    *latest = estimate;
                }
                shared.sequence.fetch_add(1, Ordering::Release);
            }
            Err(e) => {
                tracing::error!(error = %e, "pitch detector failed");
                shared.failed.store(true, Ordering::Relaxed);
                break;
            }
        }
    }
    tracing::debug!("framing thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_waits_for_a_full_frame() {
        let mut framer = Framer::new(8, 4);
        assert!(framer.push(&[0.0; 5]).is_empty());
        assert_eq!(framer.buffered(), 5);
        let frames = framer.push(&[0.0; 3]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 8);
        assert_eq!(framer.buffered(), 4);
    }

    #[test]
    fn framer_overlaps_by_hop() {
        let mut framer = Framer::new(4, 2);
        let samples: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let frames = framer.push(&samples);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[1], vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(frames[2], vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn framer_clamps_hop() {
        let mut framer = Framer::new(4, 0);
        assert_eq!(framer.push(&[0.0; 5]).len(), 2);
    }

    #[test]
    fn framer_feeds_detector() {
        let config = DetectorConfig::default();
        let mut framer = Framer::new(config.buffer_size, config.buffer_size / 2);
        let tone: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();

        let mut worker = DetectorWorker::spawn(config).unwrap();
        let mut last = None;
        for chunk in tone.chunks(512) {
            if let Some(frame) = framer.push(chunk).pop() {
                last = Some(worker.detect_blocking(frame).unwrap());
            }
        }
        let hz = last.unwrap().frequency.unwrap();
        assert!((hz - 220.0).abs() < 1.0, "got {hz}");
    }
}
