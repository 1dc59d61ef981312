//! Job Timer Daemon
//!
//! Runs the timer job scheduler against job definitions loaded from a file.
//!
//! # Usage
//!
//! ```bash
//! timer-daemon run --jobs jobs.json [--exit-when-idle]
//! timer-daemon preview --jobs jobs.json [--count N]
//! timer-daemon config
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (<config dir>/job-timer/config.toml)
//! 3. Environment variables (TIMER_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use timer_daemon::{preview_jobs, run_jobs, show_config, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            jobs,
            force_expired,
            exit_when_idle,
        } => {
            run_jobs(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                &jobs,
                force_expired,
                exit_when_idle,
            )
            .await?;
        }
        Commands::Preview { jobs, count } => {
            preview_jobs(&jobs, count)?;
        }
        Commands::Config => {
            show_config(cli.config.as_deref(), cli.log_level.as_deref())?;
        }
    }

    Ok(())
}
