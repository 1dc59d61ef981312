//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend cannot be reached; callers may retry later
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Write rejected by a concurrent modification
    #[error("Storage conflict on job {0}")]
    Conflict(String),

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(String),
}
