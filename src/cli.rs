use clap::{ArgAction, Parser, Subcommand};

use scale_climber::game::Difficulty;

#[derive(Parser)]
#[command(name = "scale-climber")]
#[command(version, about = "Sing up the C-major scale against the clock")]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List available microphones
    Devices,

    /// Measure your vocal range and pick a starting octave
    Calibrate,

    /// Hold single notes with live feedback
    Practice {
        /// Note to start on, e.g. "A3" or "F#4"
        #[arg(long)]
        note: Option<String>,

        /// easy, normal or hard (sets tolerance and hold time)
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },

    /// Climb the eight notes of the scale within two minutes
    Challenge {
        /// Octave of the starting C (defaults to your calibration)
        #[arg(long)]
        octave: Option<i32>,

        #[arg(long)]
        difficulty: Option<Difficulty>,

        /// Continue the last unfinished run
        #[arg(long)]
        resume: bool,
    },

    /// Show recent challenge results
    History {
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        last: usize,
    },

    /// Show where data and config files are stored
    Paths,
}

impl Command {
    /// Commands that take over the terminal, so logs must go to a file.
    pub fn uses_tui(&self) -> bool {
        matches!(self, Command::Practice { .. } | Command::Challenge { .. })
    }
}
