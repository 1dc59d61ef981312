//! Result of one job firing as reported by an executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome code of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionCode {
    Success,
    Failure,
}

/// What an executor reports after firing a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecutionResponse {
    pub job_id: String,
    pub code: ExecutionCode,
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobExecutionResponse {
    /// A successful response stamped now.
    pub fn success(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            code: ExecutionCode::Success,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed response stamped now.
    pub fn failure(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            code: ExecutionCode::Failure,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn succeeded(&self) -> bool {
        self.code == ExecutionCode::Success
    }
}
