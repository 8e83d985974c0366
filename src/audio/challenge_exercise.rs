use anyhow::{Context, Result};
use console::style;
use serde_json::Value;

use crate::audio::capture::LiveInput;
use crate::config::AppConfig;
use crate::game::{ChallengeConfig, Difficulty, GameSession, Lifecycle, SystemClock};
use crate::report::results;
use crate::storage::records::{CalibrationRecord, ChallengeRecord};
use crate::storage::store;
use crate::tui::screens;
use crate::tui::screens::challenge::ChallengeExit;
use crate::tui::widgets::feed::Feed;

#[derive(Debug, Clone, Default)]
pub struct ChallengeOptions {
    pub octave: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub resume: bool,
}

/// Octave precedence: command line, then the latest calibration, then config.
pub fn challenge_config(
    config: &AppConfig,
    options: &ChallengeOptions,
    calibration: Option<&CalibrationRecord>,
) -> ChallengeConfig {
    let mut challenge = config.game.challenge();
    if let Some(difficulty) = options.difficulty {
        challenge.difficulty = difficulty;
    }
    challenge.octave = options
        .octave
        .or_else(|| calibration.map(|c| c.result.recommended_octave))
        .unwrap_or(challenge.octave);
    challenge
}

/// Record a saved run the user chose not to resume as abandoned.
fn abandon_checkpoint(checkpoint: &Value) -> Result<()> {
    let stale = GameSession::resume(checkpoint, SystemClock::new(), Default::default());
    if let Some(challenge) = stale.challenge() {
        let record = ChallengeRecord::from_run(challenge, stale.score(), stale.now_ms());
        store::finish_challenge(&record)?;
        tracing::info!(notes = record.notes_reached, "discarded saved run");
    }
    Ok(())
}

pub fn run_challenge(config: &AppConfig, options: &ChallengeOptions) -> Result<()> {
    let session_options = config.game.session_options();
    let checkpoint = store::load_challenge_checkpoint()?;

    let mut session = match (options.resume, checkpoint) {
        (true, Some(checkpoint)) => {
            println!("  Resuming your saved run.");
            GameSession::resume(&checkpoint, SystemClock::new(), session_options)
        }
        (resume, checkpoint) => {
            if resume {
                println!("  No saved run found, starting a new one.");
            }
            if let Some(checkpoint) = checkpoint {
                println!("  {}", style("Your previous unfinished run was recorded as abandoned.").dim());
                abandon_checkpoint(&checkpoint)?;
            }
            let calibration = store::latest_calibration().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not read calibration");
                None
            });
            let challenge = challenge_config(config, options, calibration.as_ref());
            GameSession::new_challenge(challenge, SystemClock::new(), session_options)
                .with_context(|| format!("Cannot build a scale in octave {}", challenge.octave))?
        }
    };

    let feed = Feed::new();
    session.subscribe(feed.listener());

    let input = LiveInput::start(&config.detector)?;
    tracing::info!(device = input.device_name(), "challenge screen opened");

    let exit = {
        let mut tui = crate::tui::init()?;
        let mut autosave = |checkpoint: &Value| {
            if let Err(e) = store::save_challenge_checkpoint(checkpoint) {
                tracing::warn!(error = %e, "auto-save failed");
            }
        };
        screens::challenge::run(&mut tui.terminal, &input, &mut session, &feed, &mut autosave)?
    };
    drop(input);

    let Some(challenge) = session.challenge() else {
        return Ok(());
    };

    match (exit, challenge.lifecycle()) {
        (ChallengeExit::Finished, _) => {
            let record = ChallengeRecord::from_run(challenge, session.score(), session.now_ms());
            let previous_best = store::best_score(record.difficulty.as_str())?;
            store::finish_challenge(&record)?;
            results::print_challenge_summary(&record, previous_best);
        }
        (ChallengeExit::Abandoned, Lifecycle::Active) => {
            if let Some(checkpoint) = session.checkpoint() {
                store::save_challenge_checkpoint(&checkpoint)?;
            }
            println!();
            println!(
                "  Progress saved. Continue with {}.",
                style("scale-climber challenge --resume").cyan()
            );
            println!();
        }
        (ChallengeExit::Abandoned, _) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationResult, VoiceType};

    fn calibrated(octave: i32) -> CalibrationRecord {
        CalibrationRecord {
            recorded_at: "2026-03-01T10:00:00+00:00".into(),
            result: CalibrationResult {
                lowest_note: "E2".into(),
                highest_note: "E4".into(),
                lowest_midi: 40,
                highest_midi: 64,
                recommended_octave: octave,
                voice_type: VoiceType::Baritone,
            },
        }
    }

    #[test]
    fn octave_precedence() {
        let config = AppConfig::default();
        let cal = calibrated(3);

        let opts = ChallengeOptions::default();
        assert_eq!(challenge_config(&config, &opts, None).octave, 4);
        assert_eq!(challenge_config(&config, &opts, Some(&cal)).octave, 3);

        let opts = ChallengeOptions {
            octave: Some(5),
            difficulty: Some(Difficulty::Hard),
            resume: false,
        };
        let challenge = challenge_config(&config, &opts, Some(&cal));
        assert_eq!(challenge.octave, 5);
        assert_eq!(challenge.difficulty, Difficulty::Hard);
    }
}
