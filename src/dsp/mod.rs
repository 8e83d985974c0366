pub mod worker;
pub mod yin;

pub use worker::{DetectorRequest, DetectorResponse, DetectorWorker};
pub use yin::{DetectorConfig, DifferenceMethod, PitchEstimate, YinDetector};
