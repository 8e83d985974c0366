use serde_json::{json, Value};

use crate::dsp::PitchEstimate;

use super::challenge::{ChallengeConfig, Lifecycle, ScaleChallenge};
use super::clock::Clock;
use super::events::{EventBus, ModeEvent, ModeListener};
use super::practice::{PracticeConfig, PracticeMode};
use super::score::ScoreBoard;
use crate::error::NoteError;

/// Fires once every `interval_ms` of accumulated session time.
///
/// Irregular frame spacing only shifts when the save lands; a long stall
/// produces one save, not a burst.
#[derive(Debug, Clone, PartialEq)]
pub struct AutosaveTimer {
    interval_ms: u64,
    accumulated_ms: u64,
}

impl AutosaveTimer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            accumulated_ms: 0,
        }
    }

    /// Add `delta_ms` of elapsed time. True when a save is due.
    pub fn advance(&mut self, delta_ms: u64) -> bool {
        if self.interval_ms == 0 {
            return false;
        }
        self.accumulated_ms += delta_ms;
        if self.accumulated_ms < self.interval_ms {
            return false;
        }
        self.accumulated_ms %= self.interval_ms;
        true
    }

    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
    }
}

/// Loop timing knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    /// Reuse the last estimate for at most this long before assuming silence.
    pub stale_estimate_ms: u64,
    /// 0 disables auto-save.
    pub autosave_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stale_estimate_ms: 250,
            autosave_ms: 5000,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Mode {
    Practice(PracticeMode),
    Challenge(ScaleChallenge),
}

/// Result of one loop iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    pub events: Vec<ModeEvent>,
    /// The caller should write a checkpoint now.
    pub autosave_due: bool,
    /// The mode just finished (completed or failed).
    pub finished: bool,
}

/// One running game: a mode, its score, its listeners and its clock.
///
/// Owned by a single control loop. Estimates arrive through `push_estimate`
/// whenever the detector has one; `tick` runs once per frame regardless.
pub struct GameSession<C: Clock> {
    mode: Mode,
    score: ScoreBoard,
    bus: EventBus,
    clock: C,
    options: SessionOptions,
    autosave: AutosaveTimer,
    latest: Option<(PitchEstimate, u64)>,
    last_tick_ms: Option<u64>,
}

impl<C: Clock> GameSession<C> {
    pub fn new(mode: Mode, clock: C, options: SessionOptions) -> Self {
        Self {
            mode,
            score: ScoreBoard::new(),
            bus: EventBus::new(),
            clock,
            autosave: AutosaveTimer::new(options.autosave_ms),
            options,
            latest: None,
            last_tick_ms: None,
        }
    }

    pub fn practice(config: PracticeConfig, clock: C, options: SessionOptions) -> Result<Self, NoteError> {
        Ok(Self::new(Mode::Practice(PracticeMode::new(config)?), clock, options))
    }

    pub fn new_challenge(config: ChallengeConfig, clock: C, options: SessionOptions) -> Result<Self, NoteError> {
        Ok(Self::new(Mode::Challenge(ScaleChallenge::new(config)?), clock, options))
    }

    /// Rebuild a challenge session from a checkpoint written by `checkpoint`.
    pub fn resume(checkpoint: &Value, clock: C, options: SessionOptions) -> Self {
        let challenge = ScaleChallenge::restore(checkpoint.get("challenge").unwrap_or(&Value::Null));
        let mut session = Self::new(Mode::Challenge(challenge), clock, options);
        session.score = ScoreBoard::restore(checkpoint.get("score").unwrap_or(&Value::Null));
        tracing::info!(
            index = session.challenge().map_or(0, |c| c.current_note_index()),
            score = session.score.total_score,
            "resumed challenge from checkpoint"
        );
        session
    }

    pub fn subscribe(&mut self, listener: Box<dyn ModeListener + Send>) {
        self.bus.subscribe(listener);
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut Mode {
        &mut self.mode
    }

    pub fn challenge(&self) -> Option<&ScaleChallenge> {
        match &self.mode {
            Mode::Challenge(c) => Some(c),
            Mode::Practice(_) => None,
        }
    }

    pub fn practice_mode(&self) -> Option<&PracticeMode> {
        match &self.mode {
            Mode::Practice(p) => Some(p),
            Mode::Challenge(_) => None,
        }
    }

    pub fn practice_mode_mut(&mut self) -> Option<&mut PracticeMode> {
        match &mut self.mode {
            Mode::Practice(p) => Some(p),
            Mode::Challenge(_) => None,
        }
    }

    pub fn score(&self) -> &ScoreBoard {
        &self.score
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Start a ready challenge. No-op for practice.
    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        if let Mode::Challenge(c) = &mut self.mode {
            c.start(now);
        }
        self.last_tick_ms = Some(now);
        self.autosave.reset();
    }

    /// Record a fresh estimate from the detector.
    pub fn push_estimate(&mut self, estimate: PitchEstimate) {
        self.latest = Some((estimate, self.clock.now_ms()));
    }

    /// The estimate this frame will use: the latest one while it is fresh,
    /// otherwise silence.
    pub fn current_estimate(&self, now_ms: u64) -> PitchEstimate {
        match self.latest {
            Some((estimate, at)) if now_ms.saturating_sub(at) <= self.options.stale_estimate_ms => estimate,
            _ => PitchEstimate::unvoiced(0.0),
        }
    }

    /// Run one frame of the active mode.
    pub fn tick(&mut self) -> Tick {
        let now = self.clock.now_ms();
        let delta = self.last_tick_ms.map_or(0, |last| now.saturating_sub(last));
        self.last_tick_ms = Some(now);

        let estimate = self.current_estimate(now);
        let was_finished = self.is_finished();

        let events = match &mut self.mode {
            Mode::Practice(p) => p.update(&estimate, now),
            Mode::Challenge(c) => {
                let events = c.update(&estimate, now);
                for event in &events {
                    match event {
                        ModeEvent::NoteHit(hit) => {
                            let s = self.score.add_note(hit.average_cents, hit.time_to_hit_ms, true);
                            tracing::debug!(note = %hit.note, tier = s.tier.label(), points = s.total_points, "scored");
                        }
                        ModeEvent::NoteMiss(miss) => {
                            self.score.add_note(0.0, miss.time_on_note_ms, false);
                        }
                        _ => {}
                    }
                }
                events
            }
        };
        self.bus.dispatch(&events);

        let active = matches!(&self.mode, Mode::Challenge(c) if c.lifecycle() == Lifecycle::Active);
        let autosave_due = active && self.autosave.advance(delta);
        if autosave_due {
            tracing::debug!(now, "auto-save due");
        }

        Tick {
            events,
            autosave_due,
            finished: !was_finished && self.is_finished(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.mode {
            Mode::Challenge(c) => c.lifecycle().is_finished(),
            Mode::Practice(_) => false,
        }
    }

    /// Serializable state of a challenge session, or None for practice.
    pub fn checkpoint(&self) -> Option<Value> {
        let now = self.clock.now_ms();
        match &self.mode {
            Mode::Challenge(c) => Some(json!({
                "challenge": c.snapshot(now),
                "score": self.score,
            })),
            Mode::Practice(_) => None,
        }
    }
}
