//! Error types for the scheduler crate.
//!
//! `SchedulerError` is what callers of schedule/cancel/fire observe.
//! `ExecutionError` describes a failed firing; it never leaves the
//! scheduler and is turned into a RETRY or ERROR transition instead.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

use timer_storage::StorageError;
use timer_types::{JobStatus, TypesError};

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed job definition
    #[error("Invalid job: {0}")]
    Validation(String),

    /// The stored job is already in a terminal state
    #[error("Job {id} is already finalized with status {status}")]
    AlreadyFinalized { id: String, status: JobStatus },

    /// Fire time is in the past and forced execution is disabled
    #[error("Job {id} expired: fire time {fire_time} is in the past")]
    Expired {
        id: String,
        fire_time: DateTime<Utc>,
    },

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Repository failure, surfaced unchanged
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Error from the underlying timer primitive
    #[error("Timer error: {0}")]
    Timer(String),

    /// Invalid scheduler configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Recovery loop is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Recovery loop is not running
    #[error("Scheduler is not running")]
    NotRunning,
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        SchedulerError::Timer(err.to_string())
    }
}

impl From<TypesError> for SchedulerError {
    fn from(err: TypesError) -> Self {
        match err {
            TypesError::Config(msg) => SchedulerError::Config(msg),
            other => SchedulerError::Validation(other.to_string()),
        }
    }
}

/// Why a single firing failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Executor reported or raised a failure
    #[error("Execution failed: {0}")]
    Failed(String),

    /// Executor exceeded the job's execution timeout
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    /// No registered executor accepts the recipient kind
    #[error("No executor accepts recipient kind '{0}'")]
    NoExecutor(String),
}
