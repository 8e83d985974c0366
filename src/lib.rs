//! Scale Climber: a singing game built on real-time pitch detection.
//!
//! Microphone frames go through a YIN detector (`dsp`), get compared against
//! target notes (`notes`) and drive the practice and scale-challenge state
//! machines (`game`). `calibration` measures a singer's range to pick the
//! starting octave. Results and checkpoints live in SQLite (`storage`).

pub mod audio;
pub mod calibration;
pub mod config;
pub mod dsp;
pub mod error;
pub mod game;
pub mod notes;
pub mod paths;
pub mod report;
pub mod storage;
pub mod tui;

pub use calibration::{CalibrationEngine, CalibrationError, CalibrationResult, PitchSource, RangeSample};
pub use dsp::{DetectorConfig, PitchEstimate, YinDetector};
pub use error::{ConfigError, NoteError, WorkerError};
pub use game::{GameSession, PracticeMode, ScaleChallenge, ScoreBoard};
