mod cli;

use std::fs::File;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use scale_climber::audio::{calibrate_exercise, challenge_exercise, devices, practice_exercise};
use scale_climber::config;
use scale_climber::paths;
use scale_climber::report::history;
use scale_climber::storage::store;

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if cli.quiet { "error" } else { filter };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // The game screens own stdout and stderr, so their logs go to a file.
    if cli.command.uses_tui() {
        let file = paths::ensure_data_dir()
            .ok()
            .and_then(|_| File::create(paths::log_file()).ok());
        if let Some(file) = file {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = config::load_config()?;

    match cli.command {
        Command::Devices => devices::list_devices(),

        Command::Calibrate => calibrate_exercise::run_calibration(&config).map(|_| ()),

        Command::Practice { note, difficulty } => {
            practice_exercise::run_practice(&config, note.as_deref(), difficulty)
        }

        Command::Challenge {
            octave,
            difficulty,
            resume,
        } => challenge_exercise::run_challenge(
            &config,
            &challenge_exercise::ChallengeOptions {
                octave,
                difficulty,
                resume,
            },
        ),

        Command::History { last } => {
            history::print_history(&store::recent_challenges(last)?);
            Ok(())
        }

        Command::Paths => {
            println!("{:8} {}", style("Data").bold(), paths::data_dir().display());
            println!("{:8} {}", style("Config").bold(), paths::config_file().display());
            println!("{:8} {}", style("Database").bold(), paths::db_path().display());
            println!("{:8} {}", style("Log").bold(), paths::log_file().display());
            Ok(())
        }
    }
}
