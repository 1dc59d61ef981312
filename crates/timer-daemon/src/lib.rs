//! Timer daemon library exports.
//!
//! This crate provides the CLI binary for the job timer service.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, preview, config)
//! - `dry_run`: Executor that logs firings instead of delivering them

pub mod cli;
pub mod commands;
pub mod dry_run;

pub use cli::{Cli, Commands};
pub use commands::{
    load_jobs, load_settings, preview_jobs, render_preview, run_jobs, run_with_settings,
    show_config, RunSummary,
};
pub use dry_run::DryRunExecutor;
