//! Error types for the pitch core.
//!
//! Error strategy:
//! - Configuration errors (bad note names, bad enum values): fail fast, these are caller bugs
//! - Signal absence (no pitch, quiet input): not an error, reported as data
//! - Calibration failures: returned as `calibration::CalibrationError` values
//! - Worker plumbing: `WorkerError`, recoverable by restarting the session

use thiserror::Error;

/// A note name or note-derived value that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("Invalid note name '{0}'\n  Expected a letter A-G, optional '#', and an octave (e.g. C4, F#3, C-1)")]
    InvalidName(String),

    #[error("Note '{name}' is outside the MIDI range 0-127")]
    OutOfRange { name: String },
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Unknown difficulty '{0}'\n  Valid values: easy, normal, hard")]
    UnknownDifficulty(String),

    #[error("Unknown difference method '{0}'\n  Valid values: direct, fft")]
    UnknownMethod(String),

    #[error("Invalid detector configuration: {0}")]
    Detector(String),
}

/// Failures talking to the detector worker thread.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkerError {
    #[error("A detection request is already in flight (request {0})")]
    Busy(u64),

    #[error("Detector worker is no longer running")]
    Disconnected,

    #[error("Detector worker did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Detector worker rejected request {id}: {reason}")]
    Rejected { id: u64, reason: String },
}
