//! Game rules: hold detection, practice and challenge modes, scoring.
//!
//! Everything here is synchronous and deterministic given the `now_ms`
//! values passed in, so tests drive it with a `ManualClock`.

pub mod challenge;
pub mod clock;
pub mod events;
pub mod hold;
pub mod practice;
pub mod score;
pub mod session;
pub mod snapshot;

pub use challenge::{ChallengeConfig, ChallengeSnapshot, Difficulty, Lifecycle, ScaleChallenge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventBus, FailReason, ModeEvent, ModeListener, NoteHit, NoteMiss, Progress};
pub use practice::{PracticeConfig, PracticeMode, PracticeStats};
pub use score::{Grade, NoteScore, ScoreBoard, ScoreStats, Tier};
pub use session::{AutosaveTimer, GameSession, Mode, SessionOptions, Tick};
