//! CLI argument parsing for the timer daemon.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Job Timer Daemon
///
/// Durable, at-least-once timer job scheduling.
#[derive(Parser, Debug)]
#[command(name = "timer-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default <config dir>/job-timer/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Schedule jobs from a file and fire them with the dry-run executor
    Run {
        /// JSON file holding an array of job definitions
        #[arg(short, long)]
        jobs: PathBuf,

        /// Fire past-due jobs immediately instead of rejecting them
        #[arg(long)]
        force_expired: bool,

        /// Exit once no job is SCHEDULED or RETRY anymore
        #[arg(long)]
        exit_when_idle: bool,
    },

    /// Print the upcoming fire instants of every job in a file
    Preview {
        /// JSON file holding an array of job definitions
        #[arg(short, long)]
        jobs: PathBuf,

        /// Number of fire instants per job
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Print the effective configuration as JSON
    Config,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
