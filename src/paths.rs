use std::path::PathBuf;
use std::sync::OnceLock;

/// XDG-compliant directory layout for scale-climber.
///
/// On Linux:
///   Config:  $XDG_CONFIG_HOME/scale-climber  (~/.config/scale-climber)
///   Data:    $XDG_DATA_HOME/scale-climber    (~/.local/share/scale-climber)
///
/// On macOS both live under ~/Library/Application Support/scale-climber.
/// The `dirs` crate handles platform detection; resolved bases are cached.

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

const APP_DIR: &str = "scale-climber";

/// Root data directory: $XDG_DATA_HOME/scale-climber
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    })
}

/// Root config directory: $XDG_CONFIG_HOME/scale-climber
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    })
}

/// Config file path: <config_dir>/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Database path: <data_dir>/scale-climber.db
pub fn db_path() -> PathBuf {
    data_dir().join("scale-climber.db")
}

/// Log file used while the TUI owns the terminal: <data_dir>/scale-climber.log
pub fn log_file() -> PathBuf {
    data_dir().join("scale-climber.log")
}

/// Create the data directory if needed.
pub fn ensure_data_dir() -> anyhow::Result<&'static PathBuf> {
    let dir = data_dir();
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory {}: {e}", dir.display()))?;
    Ok(dir)
}
