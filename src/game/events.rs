use serde::{Deserialize, Serialize};

/// A note was held in tune long enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteHit {
    pub note: String,
    /// Position in the scale (always 0 in practice mode).
    pub note_index: usize,
    /// Mean signed cents over the hold.
    pub average_cents: f32,
    /// From the moment the note became the target until the hold completed.
    pub time_to_hit_ms: u64,
    pub hold_duration_ms: u64,
    /// Attempts used on this note, including the successful one.
    pub attempts: u32,
}

/// A note ran out of attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMiss {
    pub note: String,
    pub note_index: usize,
    pub attempts: u32,
    pub time_on_note_ms: u64,
}

/// Live feedback while the singer is on (or near) the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub note: String,
    pub note_index: usize,
    pub total_notes: usize,
    /// Signed cents from the target, when a pitch was detected.
    pub cents: Option<f32>,
    /// Fraction of the required hold time completed, 0..1.
    pub hold_progress: f32,
}

/// Why a challenge ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailReason {
    TimeLimitExceeded,
    TooManyFailures,
}

impl FailReason {
    /// Stable code used in stored results and messages.
    pub fn code(&self) -> &'static str {
        match self {
            FailReason::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            FailReason::TooManyFailures => "TOO_MANY_FAILURES",
        }
    }
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Everything a mode state machine can report from one update.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeEvent {
    NoteHit(NoteHit),
    NoteMiss(NoteMiss),
    Progress(Progress),
    /// A hold was lost before completing.
    AttemptFailed { note: String, attempt: u32 },
    Complete,
    Failed(FailReason),
}

/// Callback hooks for mode events. Every method has an empty default.
pub trait ModeListener {
    fn on_note_hit(&mut self, _hit: &NoteHit) {}
    fn on_note_miss(&mut self, _miss: &NoteMiss) {}
    fn on_progress(&mut self, _progress: &Progress) {}
    fn on_attempt_failed(&mut self, _note: &str, _attempt: u32) {}
    fn on_complete(&mut self) {}
    fn on_fail(&mut self, _reason: FailReason) {}
}

/// Registry of listeners. Events are delivered in order to every listener.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn ModeListener + Send>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn ModeListener + Send>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, events: &[ModeEvent]) {
        for event in events {
            for listener in &mut self.listeners {
                match event {
                    ModeEvent::NoteHit(hit) => listener.on_note_hit(hit),
                    ModeEvent::NoteMiss(miss) => listener.on_note_miss(miss),
                    ModeEvent::Progress(progress) => listener.on_progress(progress),
                    ModeEvent::AttemptFailed { note, attempt } => {
                        listener.on_attempt_failed(note, *attempt)
                    }
                    ModeEvent::Complete => listener.on_complete(),
                    ModeEvent::Failed(reason) => listener.on_fail(*reason),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ModeListener for Recorder {
        fn on_note_hit(&mut self, hit: &NoteHit) {
            self.log.lock().unwrap().push(format!("hit {}", hit.note));
        }
        fn on_complete(&mut self) {
            self.log.lock().unwrap().push("complete".into());
        }
        fn on_fail(&mut self, reason: FailReason) {
            self.log.lock().unwrap().push(format!("fail {reason}"));
        }
    }

    fn hit(note: &str) -> ModeEvent {
        ModeEvent::NoteHit(NoteHit {
            note: note.into(),
            note_index: 0,
            average_cents: 0.0,
            time_to_hit_ms: 1500,
            hold_duration_ms: 1500,
            attempts: 1,
        })
    }

    #[test]
    fn dispatch_reaches_every_listener_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(Recorder { log: Arc::clone(&log) }));
        bus.subscribe(Box::new(Recorder { log: Arc::clone(&log) }));
        assert_eq!(bus.len(), 2);

        bus.dispatch(&[hit("C4"), ModeEvent::Complete]);

        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["hit C4", "hit C4", "complete", "complete"]);
    }

    #[test]
    fn unhandled_events_use_defaults() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        bus.subscribe(Box::new(Recorder { log: Arc::clone(&log) }));
        bus.dispatch(&[ModeEvent::AttemptFailed {
            note: "C4".into(),
            attempt: 1,
        }]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn fail_reason_codes() {
        assert_eq!(FailReason::TimeLimitExceeded.code(), "TIME_LIMIT_EXCEEDED");
        assert_eq!(FailReason::TooManyFailures.to_string(), "TOO_MANY_FAILURES");
        let json = serde_json::to_string(&FailReason::TooManyFailures).unwrap();
        assert_eq!(json, "\"TOO_MANY_FAILURES\"");
    }
}
