pub mod challenge;
pub mod practice;

use crate::audio::capture::LiveInput;
use crate::game::{Clock, GameSession, ModeEvent, Progress};

/// Frame period for the game screens, about 30 fps.
pub const FRAME: std::time::Duration = std::time::Duration::from_millis(33);

/// Hand the session any estimate published since the last frame.
pub(crate) fn pump_estimate<C: Clock>(input: &LiveInput, session: &mut GameSession<C>, last_seq: &mut u64) {
    if let Some((seq, estimate)) = input.latest() {
        if seq != *last_seq {
            *last_seq = seq;
            session.push_estimate(estimate);
        }
    }
}

/// The last progress report in a frame's events.
pub(crate) fn last_progress(events: &[ModeEvent]) -> Option<&Progress> {
    events.iter().rev().find_map(|e| match e {
        ModeEvent::Progress(p) => Some(p),
        _ => None,
    })
}
