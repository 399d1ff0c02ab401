//! Command-line interface for strictly_arena.

use clap::{Parser, Subcommand};

/// Strictly Arena - real-time chess matchmaking with per-player clocks
#[derive(Parser, Debug)]
#[command(name = "strictly_arena")]
#[command(about = "Real-time chess match engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the matchmaking pool until Ctrl-C
    Serve {
        /// Path to the arena config file (defaults are used if it is missing)
        #[arg(short, long, default_value = "arena.toml")]
        config: std::path::PathBuf,
    },

    /// Pair random-move bots through the pool and report the results
    Simulate {
        /// Number of bots to queue
        #[arg(short, long, default_value = "8")]
        players: usize,

        /// Concurrent match slots
        #[arg(short, long, default_value = "2")]
        slots: usize,

        /// Plies after which a bot resigns on its turn
        #[arg(long, default_value = "200")]
        resign_after: usize,

        /// Start from the position without pawns
        #[arg(long)]
        no_pawns: bool,

        /// Base seed for reproducible bots
        #[arg(long)]
        seed: Option<u64>,

        /// Optional arena config file for clock and timeout settings
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
    },
}
