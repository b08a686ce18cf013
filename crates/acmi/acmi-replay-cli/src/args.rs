use std::path::PathBuf;

use acmi_replay_core::EntityKind;
use clap::{Parser, Subcommand};

#[derive(Parser, Clone, Debug)]
#[command(name = "acmi-replay", version, about = "Inspect and replay ACMI 2.1 flight recordings")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,

    /// JSON configuration file (retention, origin, playback defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Header metadata, bounds and counts
    Summary { file: PathBuf },

    /// Entities of the recording, or only those alive at a time
    Entities {
        file: PathBuf,
        /// Seconds since reference time
        #[arg(long)]
        at: Option<f64>,
    },

    /// Lines skipped during import
    Diagnostics { file: PathBuf },

    /// Interpolated state of one object
    Query {
        file: PathBuf,
        /// Object id in hex, as written in the file
        #[arg(long)]
        id: String,
        #[arg(long)]
        at: f64,
        /// Trail window in seconds
        #[arg(long, default_value_t = 0.0)]
        trail: f64,
    },

    /// Drive playback with fixed ticks and print each frame
    Play {
        file: PathBuf,
        /// Start time (defaults to the recording start)
        #[arg(long)]
        from: Option<f64>,
        /// Wall-clock seconds per tick
        #[arg(long, default_value_t = 1.0)]
        step: f64,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        trail: Option<f64>,
        /// Hide a kind (aircraft, missile, explosion, unknown); repeatable
        #[arg(long, value_parser = parse_kind)]
        hide: Vec<EntityKind>,
        /// Stop after this many ticks
        #[arg(long, default_value_t = 10_000)]
        max_ticks: usize,
    },
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    s.parse()
}
