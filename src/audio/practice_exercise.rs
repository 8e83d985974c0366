use anyhow::{Context, Result};
use console::style;

use crate::audio::capture::LiveInput;
use crate::config::AppConfig;
use crate::game::{Difficulty, GameSession, PracticeConfig, SystemClock};
use crate::report::results;
use crate::tui::screens;
use crate::tui::widgets::feed::Feed;

/// Practice settings after command-line overrides. Tolerance and hold time
/// come from the difficulty.
pub fn practice_config(config: &AppConfig, note: Option<&str>, difficulty: Option<Difficulty>) -> PracticeConfig {
    let mut game = config.game.clone();
    if let Some(note) = note {
        game.practice_note = note.to_string();
    }
    if let Some(difficulty) = difficulty {
        game.difficulty = difficulty;
    }
    game.practice()
}

/// Hold single notes with live feedback until the user quits.
pub fn run_practice(config: &AppConfig, note: Option<&str>, difficulty: Option<Difficulty>) -> Result<()> {
    let practice = practice_config(config, note, difficulty);
    let mut session = GameSession::practice(practice, SystemClock::new(), config.game.session_options())
        .context("Invalid practice note")?;

    let feed = Feed::new();
    session.subscribe(feed.listener());

    let input = LiveInput::start(&config.detector)?;
    tracing::info!(device = input.device_name(), "practice started");

    {
        let mut tui = crate::tui::init()?;
        screens::practice::run(&mut tui.terminal, &input, &mut session, &feed)?;
    }
    drop(input);

    if let Some(practice) = session.practice_mode() {
        results::print_practice_summary(practice.target_note(), practice.stats());
        tracing::info!(
            attempts = practice.stats().attempts,
            successes = practice.stats().successes,
            "practice finished"
        );
    } else {
        println!("{}", style("Practice ended.").dim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply() {
        let config = AppConfig::default();
        let practice = practice_config(&config, Some("G3"), Some(Difficulty::Easy));
        assert_eq!(practice.target_note, "G3");
        assert_eq!(practice.tolerance_cents, 50.0);
        assert_eq!(practice.hold_time_ms, 1200);

        let practice = practice_config(&config, None, None);
        assert_eq!(practice.target_note, "C4");
        assert_eq!(practice.tolerance_cents, 25.0);
    }
}
