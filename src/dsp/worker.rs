use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::WorkerError;

use super::yin::{DetectorConfig, PitchEstimate, YinDetector};

/// How long `spawn` waits for the worker to acknowledge its config.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Messages sent to the detector thread.
#[derive(Debug)]
pub enum DetectorRequest {
    Init { id: u64, config: DetectorConfig },
    Process { id: u64, frame: Vec<f32> },
    Reconfigure { id: u64, config: DetectorConfig },
    Shutdown,
}

/// Messages sent back from the detector thread. Every variant carries the id
/// of the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorResponse {
    Ready { id: u64 },
    Estimate { id: u64, estimate: PitchEstimate },
    Reconfigured { id: u64 },
    Rejected { id: u64, reason: String },
}

impl DetectorResponse {
    pub fn id(&self) -> u64 {
        match self {
            Self::Ready { id }
            | Self::Estimate { id, .. }
            | Self::Reconfigured { id }
            | Self::Rejected { id, .. } => *id,
        }
    }
}

/// Owner-side handle for a YIN detector running on its own thread.
///
/// The O(N²) difference loop never runs on the caller's thread. At most one
/// `Process` request is in flight at a time; responses to anything else are
/// dropped.
pub struct DetectorWorker {
    tx: Sender<DetectorRequest>,
    rx: Receiver<DetectorResponse>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
    in_flight: Option<u64>,
    config: DetectorConfig,
}

impl DetectorWorker {
    /// Start the worker thread and wait for it to accept `config`.
    pub fn spawn(config: DetectorConfig) -> Result<Self, WorkerError> {
        let (req_tx, req_rx) = mpsc::channel::<DetectorRequest>();
        let (resp_tx, resp_rx) = mpsc::channel::<DetectorResponse>();

        let handle = std::thread::Builder::new()
            .name("yin-detector".into())
            .spawn(move || run_worker(req_rx, resp_tx))
            .map_err(|_| WorkerError::Disconnected)?;

        let mut worker = Self {
            tx: req_tx,
            rx: resp_rx,
            handle: Some(handle),
            next_id: 1,
            in_flight: None,
            config: config.clone(),
        };

        let id = worker.allocate_id();
        worker.send(DetectorRequest::Init { id, config })?;
        match worker.await_response(id, STARTUP_TIMEOUT)? {
            DetectorResponse::Ready { .. } => Ok(worker),
            DetectorResponse::Rejected { id, reason } => Err(WorkerError::Rejected { id, reason }),
            other => Err(WorkerError::Rejected {
                id,
                reason: format!("unexpected response {other:?}"),
            }),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Queue a frame for detection. Fails with `Busy` if one is still pending.
    pub fn submit(&mut self, frame: Vec<f32>) -> Result<u64, WorkerError> {
        if let Some(pending) = self.in_flight {
            return Err(WorkerError::Busy(pending));
        }
        let id = self.allocate_id();
        self.send(DetectorRequest::Process { id, frame })?;
        self.in_flight = Some(id);
        Ok(id)
    }

    /// Non-blocking check for the in-flight result.
    pub fn poll(&mut self) -> Result<Option<(u64, PitchEstimate)>, WorkerError> {
        loop {
            match self.rx.try_recv() {
                Ok(response) => {
                    if let Some(result) = self.accept(response)? {
                        return Ok(Some(result));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(WorkerError::Disconnected),
            }
        }
    }

    /// Submit a frame and wait for its estimate.
    pub fn detect_blocking(&mut self, frame: Vec<f32>) -> Result<PitchEstimate, WorkerError> {
        let id = self.submit(frame)?;
        loop {
            let response = self.rx.recv().map_err(|_| WorkerError::Disconnected)?;
            if let Some((done, estimate)) = self.accept(response)? {
                debug_assert_eq!(done, id);
                return Ok(estimate);
            }
        }
    }

    /// Replace the detector parameters. Waits for the worker to acknowledge.
    pub fn reconfigure(&mut self, config: DetectorConfig) -> Result<(), WorkerError> {
        if let Some(pending) = self.in_flight {
            return Err(WorkerError::Busy(pending));
        }
        let id = self.allocate_id();
        self.send(DetectorRequest::Reconfigure {
            id,
            config: config.clone(),
        })?;
        match self.await_response(id, STARTUP_TIMEOUT)? {
            DetectorResponse::Reconfigured { .. } => {
                self.config = config;
                Ok(())
            }
            DetectorResponse::Rejected { id, reason } => Err(WorkerError::Rejected { id, reason }),
            other => Err(WorkerError::Rejected {
                id,
                reason: format!("unexpected response {other:?}"),
            }),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn send(&self, request: DetectorRequest) -> Result<(), WorkerError> {
        self.tx.send(request).map_err(|_| WorkerError::Disconnected)
    }

    /// Match a response against the in-flight request.
    fn accept(&mut self, response: DetectorResponse) -> Result<Option<(u64, PitchEstimate)>, WorkerError> {
        if self.in_flight != Some(response.id()) {
            tracing::debug!(id = response.id(), "dropping stale detector response");
            return Ok(None);
        }
        self.in_flight = None;
        match response {
            DetectorResponse::Estimate { id, estimate } => Ok(Some((id, estimate))),
            DetectorResponse::Rejected { id, reason } => Err(WorkerError::Rejected { id, reason }),
            other => {
                tracing::warn!(?other, "unexpected response to a detection request");
                Ok(None)
            }
        }
    }

    /// Block until the response for a control request arrives.
    fn await_response(&mut self, id: u64, timeout: Duration) -> Result<DetectorResponse, WorkerError> {
        loop {
            match self.rx.recv_timeout(timeout) {
                Ok(response) if response.id() == id => return Ok(response),
                Ok(response) => {
                    tracing::debug!(id = response.id(), "skipping unrelated detector response");
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(id, ?timeout, "detector worker did not answer");
                    return Err(WorkerError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => return Err(WorkerError::Disconnected),
            }
        }
    }
}

impl Drop for DetectorWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(DetectorRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("detector worker panicked");
            }
        }
    }
}

/// Worker thread body. Owns the detector; exits on Shutdown or when the owner goes away.
fn run_worker(requests: Receiver<DetectorRequest>, responses: Sender<DetectorResponse>) {
    let mut detector: Option<YinDetector> = None;

    for request in requests.iter() {
        let response = match request {
            DetectorRequest::Init { id, config } | DetectorRequest::Reconfigure { id, config }
                if detector.is_none() =>
            {
                match YinDetector::new(config) {
                    Ok(d) => {
                        tracing::info!(
                            sample_rate = d.config().sample_rate,
                            buffer_size = d.config().buffer_size,
                            "detector worker ready"
                        );
                        detector = Some(d);
                        DetectorResponse::Ready { id }
                    }
                    Err(e) => DetectorResponse::Rejected {
                        id,
                        reason: e.to_string(),
                    },
                }
            }
            DetectorRequest::Init { id, config } | DetectorRequest::Reconfigure { id, config } => {
                let Some(d) = detector.as_mut() else {
                    continue;
                };
                match d.reconfigure(config) {
                    Ok(()) => DetectorResponse::Reconfigured { id },
                    Err(e) => DetectorResponse::Rejected {
                        id,
                        reason: e.to_string(),
                    },
                }
            }
            DetectorRequest::Process { id, frame } => match detector.as_mut() {
                Some(d) => DetectorResponse::Estimate {
                    id,
                    estimate: d.detect(&frame),
                },
                None => DetectorResponse::Rejected {
                    id,
                    reason: "detector not initialized".into(),
                },
            },
            DetectorRequest::Shutdown => break,
        };

        if responses.send(response).is_err() {
            break;
        }
    }

    tracing::debug!("detector worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine_frame(freq_hz: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq_hz * i as f32 / 44100.0).sin())
            .collect()
    }

    #[test]
    fn detects_through_worker() {
        let mut worker = DetectorWorker::spawn(DetectorConfig::default()).unwrap();
        let estimate = worker.detect_blocking(sine_frame(440.0, 1024)).unwrap();
        let hz = estimate.frequency.unwrap();
        assert!((hz - 440.0).abs() < 1.0);
        assert!(!worker.is_busy());
    }

    #[test]
    fn second_submit_is_busy() {
        let mut worker = DetectorWorker::spawn(DetectorConfig::default()).unwrap();
        let first = worker.submit(sine_frame(440.0, 1024)).unwrap();
        assert_eq!(worker.submit(sine_frame(440.0, 1024)), Err(WorkerError::Busy(first)));
    }

    #[test]
    fn poll_returns_result_for_in_flight_id() {
        let mut worker = DetectorWorker::spawn(DetectorConfig::default()).unwrap();
        let id = worker.submit(sine_frame(220.0, 1024)).unwrap();

        let mut result = None;
        for _ in 0..200 {
            if let Some(r) = worker.poll().unwrap() {
                result = Some(r);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let (done, estimate) = result.expect("worker should answer within a second");
        assert_eq!(done, id);
        assert!((estimate.frequency.unwrap() - 220.0).abs() < 1.0);
    }

    #[test]
    fn silence_through_worker_is_unvoiced() {
        let mut worker = DetectorWorker::spawn(DetectorConfig::default()).unwrap();
        let estimate = worker.detect_blocking(vec![0.0; 1024]).unwrap();
        assert!(estimate.frequency.is_none());
    }

    #[test]
    fn invalid_initial_config_is_rejected() {
        let config = DetectorConfig {
            buffer_size: 0,
            ..DetectorConfig::default()
        };
        assert!(matches!(
            DetectorWorker::spawn(config),
            Err(WorkerError::Rejected { .. })
        ));
    }

    #[test]
    fn reconfigure_updates_config() {
        let mut worker = DetectorWorker::spawn(DetectorConfig::default()).unwrap();
        let config = DetectorConfig {
            yin_threshold: 0.1,
            ..DetectorConfig::default()
        };
        worker.reconfigure(config.clone()).unwrap();
        assert_eq!(worker.config(), &config);

        let bad = DetectorConfig {
            yin_threshold: -1.0,
            ..DetectorConfig::default()
        };
        assert!(worker.reconfigure(bad).is_err());
        // Rejected reconfigure leaves the previous settings in place.
        assert_eq!(worker.config().yin_threshold, 0.1);
    }

    #[test]
    fn response_ids_are_reported() {
        let r = DetectorResponse::Rejected {
            id: 7,
            reason: "x".into(),
        };
        assert_eq!(r.id(), 7);
    }

    /// A worker handle wired to channels with no thread behind them.
    fn detached() -> (DetectorWorker, Receiver<DetectorRequest>, Sender<DetectorResponse>) {
        let (req_tx, req_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let worker = DetectorWorker {
            tx: req_tx,
            rx: resp_rx,
            handle: None,
            next_id: 1,
            in_flight: None,
            config: DetectorConfig::default(),
        };
        (worker, req_rx, resp_tx)
    }

    #[test]
    fn silent_worker_times_out() {
        let (mut worker, _requests, _responses) = detached();
        let wait = Duration::from_millis(20);
        assert_eq!(worker.await_response(1, wait).unwrap_err(), WorkerError::Timeout(wait));
    }

    #[test]
    fn vanished_worker_is_disconnected() {
        let (mut worker, _requests, responses) = detached();
        drop(responses);
        assert_eq!(
            worker.await_response(1, Duration::from_millis(20)).unwrap_err(),
            WorkerError::Disconnected
        );
    }
}
