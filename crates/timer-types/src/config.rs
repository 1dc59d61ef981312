//! Configuration loading for the job timer service.
//!
//! Layered config: defaults -> default config file -> `--config` file ->
//! `TIMER_*` environment variables -> CLI flags (applied by the caller).
//! The default config file lives at `<config dir>/job-timer/config.*`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// How the delay before a retry is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay before every retry
    Fixed { delay_ms: u64 },
    /// `initial_ms * multiplier^(attempt - 1)`, capped at `max_ms`
    Exponential {
        initial_ms: u64,
        multiplier: f64,
        max_ms: u64,
    },
}

impl Default for BackoffKind {
    fn default() -> Self {
        BackoffKind::Exponential {
            initial_ms: 1_000,
            multiplier: 2.0,
            max_ms: 60_000,
        }
    }
}

/// Retry policy applied when an execution fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Consecutive failures after which the job moves to ERROR
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffKind,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: BackoffKind::default(),
        }
    }
}

/// Configuration for the timer job scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Horizon within which jobs are armed as in-process timers.
    #[serde(default = "default_chunk_minutes")]
    pub scheduler_chunk_in_minutes: u64,

    /// Period of the recovery scan. Clamped to the chunk size.
    #[serde(default = "default_load_interval_minutes")]
    pub load_job_interval_in_minutes: u64,

    /// Fire past-due jobs immediately instead of rejecting them.
    #[serde(default)]
    pub force_execute_expired_jobs: bool,

    /// How far in the past a fire time may be and still count as due now.
    #[serde(default = "default_expired_tolerance_ms")]
    pub expired_tolerance_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_chunk_minutes() -> u64 {
    10
}

fn default_load_interval_minutes() -> u64 {
    10
}

fn default_expired_tolerance_ms() -> u64 {
    1_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_chunk_in_minutes: default_chunk_minutes(),
            load_job_interval_in_minutes: default_load_interval_minutes(),
            force_execute_expired_jobs: false,
            expired_tolerance_ms: default_expired_tolerance_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TypesError::Config` for zero intervals or a malformed backoff.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.scheduler_chunk_in_minutes == 0 {
            return Err(TypesError::Config(
                "scheduler_chunk_in_minutes must be > 0".to_string(),
            ));
        }
        if self.load_job_interval_in_minutes == 0 {
            return Err(TypesError::Config(
                "load_job_interval_in_minutes must be > 0".to_string(),
            ));
        }
        if let BackoffKind::Exponential {
            initial_ms,
            multiplier,
            max_ms,
        } = self.retry.backoff
        {
            if initial_ms == 0 || multiplier < 1.0 || max_ms < initial_ms {
                return Err(TypesError::Config(format!(
                    "invalid exponential backoff: initial={}ms multiplier={} max={}ms",
                    initial_ms, multiplier, max_ms
                )));
            }
        }
        Ok(())
    }

    /// Whether the load interval exceeds the chunk and will be clamped.
    pub fn load_interval_exceeds_chunk(&self) -> bool {
        self.load_job_interval_in_minutes > self.scheduler_chunk_in_minutes
    }

    /// Copy with the load interval clamped to the chunk size.
    ///
    /// A load interval longer than the chunk leaves a window in which due
    /// jobs are never scanned.
    pub fn clamped(&self) -> Self {
        let mut config = self.clone();
        config.load_job_interval_in_minutes = self
            .load_job_interval_in_minutes
            .min(self.scheduler_chunk_in_minutes);
        config
    }

    pub fn chunk(&self) -> chrono::Duration {
        let minutes = i64::try_from(self.scheduler_chunk_in_minutes).unwrap_or(i64::MAX);
        chrono::Duration::try_minutes(minutes).unwrap_or(chrono::Duration::MAX)
    }

    pub fn load_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.load_job_interval_in_minutes.saturating_mul(60))
    }

    pub fn expired_tolerance(&self) -> chrono::Duration {
        let millis = i64::try_from(self.expired_tolerance_ms).unwrap_or(i64::MAX);
        chrono::Duration::try_milliseconds(millis).unwrap_or(chrono::Duration::MAX)
    }
}

/// Timer primitive backing armed jobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerBackend {
    /// One tokio task per armed timer
    #[default]
    Tokio,
    /// One-shot jobs on a tokio-cron-scheduler instance
    Cron,
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub timer_backend: TimerBackend,

    /// Seconds given to in-flight firings on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            timer_backend: TimerBackend::default(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (`<config dir>/job-timer/config.*`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`TIMER_LOG_LEVEL`,
    ///    `TIMER_SCHEDULER__SCHEDULER_CHUNK_IN_MINUTES`, ...)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "job-timer")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self::load_from(&config_dir, cli_config_path, None)
    }

    /// Load settings from explicit sources.
    ///
    /// `config_dir` replaces the platform config directory. `env` replaces
    /// the process environment when given.
    pub fn load_from(
        config_dir: &Path,
        cli_config_path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, TypesError> {
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .set_default("shutdown_timeout_secs", default_shutdown_timeout() as i64)
            .map_err(|e| TypesError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("TIMER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env.map(|vars| vars.into_iter().collect())),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        settings.scheduler.validate()?;
        Ok(settings)
    }
}
