use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dsp::DetectorConfig;
use crate::game::{ChallengeConfig, Difficulty, PracticeConfig, SessionOptions};
use crate::notes;
use crate::paths;

/// Application configuration, loaded from config.toml.
///
/// Every section and field falls back to its Default, so the file is
/// optional and may be partial. Unknown enum values (difficulty, method)
/// are parse errors rather than silent defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub difficulty: Difficulty,
    /// Octave the scale challenge starts in.
    pub octave: i32,
    pub practice_note: String,
    /// Seconds of challenge time between checkpoints. 0 disables.
    pub autosave_secs: f32,
    /// How long the last detector result stays usable.
    pub stale_estimate_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            octave: 4,
            practice_note: "C4".into(),
            autosave_secs: 5.0,
            stale_estimate_ms: 250,
        }
    }
}

impl GameConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            stale_estimate_ms: self.stale_estimate_ms,
            autosave_ms: (self.autosave_secs.max(0.0) * 1000.0) as u64,
        }
    }

    pub fn challenge(&self) -> ChallengeConfig {
        ChallengeConfig {
            octave: self.octave,
            difficulty: self.difficulty,
        }
    }

    /// Practice settings. Tolerance and hold time follow the difficulty.
    pub fn practice(&self) -> PracticeConfig {
        let settings = self.difficulty.settings();
        PracticeConfig {
            target_note: self.practice_note.clone(),
            tolerance_cents: settings.tolerance_cents,
            hold_time_ms: settings.hold_time_ms,
        }
    }
}

impl AppConfig {
    /// Check values serde cannot: detector ranges and note names.
    pub fn validate(&self) -> Result<()> {
        self.detector.validate().context("Invalid [detector] section")?;
        notes::note_name_to_midi(&self.game.practice_note).context("Invalid game.practice_note")?;
        notes::transpose(&format!("C{}", self.game.octave + 1), 0).context("Invalid game.octave")?;
        Ok(())
    }
}

/// Load the application config from $XDG_CONFIG_HOME/scale-climber/config.toml.
/// If the file doesn't exist, returns defaults.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&paths::config_file())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}
