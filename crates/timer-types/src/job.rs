//! The persisted job record.
//!
//! `JobDetails` is owned by the repository. The scheduler reads it, applies
//! one transition, and writes it back; it never keeps a long-lived copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypesError;
use crate::recipient::Recipient;
use crate::trigger::{TimeUnit, Trigger};

/// Lifecycle state of a job.
///
/// `Scheduled -> {Executed, Retry, Error, Canceled}`,
/// `Retry -> {Scheduled, Error}`. Executed, Canceled and Error are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Scheduled,
    Retry,
    Executed,
    Canceled,
    Error,
}

impl JobStatus {
    /// No further firings are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Executed | JobStatus::Canceled | JobStatus::Error
        )
    }

    /// The job may still fire.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "SCHEDULED"),
            JobStatus::Retry => write!(f, "RETRY"),
            JobStatus::Executed => write!(f, "EXECUTED"),
            JobStatus::Canceled => write!(f, "CANCELED"),
            JobStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// One scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    /// Caller-assigned, globally unique
    pub id: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    /// Execution failures since the last success
    #[serde(default)]
    pub retries: u32,
    /// Higher is admitted first within a scan
    #[serde(default)]
    pub priority: i32,
    /// Successful firings so far
    #[serde(default)]
    pub execution_counter: u32,
    /// Handle of the armed timer, if any
    #[serde(default)]
    pub scheduled_id: Option<Uuid>,
    pub recipient: Recipient,
    pub trigger: Trigger,
    #[serde(default)]
    pub execution_timeout: Option<u64>,
    #[serde(default)]
    pub execution_timeout_unit: Option<TimeUnit>,
}

impl JobDetails {
    /// Start building a job.
    pub fn builder() -> JobDetailsBuilder {
        JobDetailsBuilder::default()
    }

    /// Maximum duration of one firing, if configured.
    ///
    /// A timeout without a unit is read as milliseconds.
    pub fn execution_timeout(&self) -> Option<std::time::Duration> {
        self.execution_timeout.map(|amount| {
            self.execution_timeout_unit
                .unwrap_or(TimeUnit::Millis)
                .to_duration(amount)
        })
    }

    /// Copy the present fields of `patch` onto a clone of `self`.
    ///
    /// A `None` patch returns `self` unchanged.
    pub fn merge(&self, patch: Option<&JobDetailsPatch>) -> JobDetails {
        let mut merged = self.clone();
        let Some(patch) = patch else {
            return merged;
        };

        if let Some(id) = &patch.id {
            merged.id = id.clone();
        }
        if let Some(correlation_id) = &patch.correlation_id {
            merged.correlation_id = Some(correlation_id.clone());
        }
        if let Some(status) = patch.status {
            merged.status = status;
        }
        if let Some(last_update) = patch.last_update {
            merged.last_update = Some(last_update);
        }
        if let Some(retries) = patch.retries {
            merged.retries = retries;
        }
        if let Some(priority) = patch.priority {
            merged.priority = priority;
        }
        if let Some(execution_counter) = patch.execution_counter {
            merged.execution_counter = execution_counter;
        }
        if let Some(scheduled_id) = patch.scheduled_id {
            merged.scheduled_id = Some(scheduled_id);
        }
        if let Some(recipient) = &patch.recipient {
            merged.recipient = recipient.clone();
        }
        if let Some(trigger) = &patch.trigger {
            merged.trigger = trigger.clone();
        }
        if let Some(timeout) = patch.execution_timeout {
            merged.execution_timeout = Some(timeout);
        }
        if let Some(unit) = patch.execution_timeout_unit {
            merged.execution_timeout_unit = Some(unit);
        }
        merged
    }
}

/// Partial job used for PATCH-style updates. Only `Some` fields apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetailsPatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub execution_counter: Option<u32>,
    #[serde(default)]
    pub scheduled_id: Option<Uuid>,
    #[serde(default)]
    pub recipient: Option<Recipient>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub execution_timeout: Option<u64>,
    #[serde(default)]
    pub execution_timeout_unit: Option<TimeUnit>,
}

impl From<&JobDetails> for JobDetailsPatch {
    fn from(job: &JobDetails) -> Self {
        Self {
            id: Some(job.id.clone()),
            correlation_id: job.correlation_id.clone(),
            status: Some(job.status),
            last_update: job.last_update,
            retries: Some(job.retries),
            priority: Some(job.priority),
            execution_counter: Some(job.execution_counter),
            scheduled_id: job.scheduled_id,
            recipient: Some(job.recipient.clone()),
            trigger: Some(job.trigger.clone()),
            execution_timeout: job.execution_timeout,
            execution_timeout_unit: job.execution_timeout_unit,
        }
    }
}

/// Fluent builder for [`JobDetails`].
#[derive(Debug, Default, Clone)]
pub struct JobDetailsBuilder {
    id: Option<String>,
    correlation_id: Option<String>,
    status: JobStatus,
    last_update: Option<DateTime<Utc>>,
    retries: u32,
    priority: i32,
    execution_counter: u32,
    scheduled_id: Option<Uuid>,
    recipient: Option<Recipient>,
    trigger: Option<Trigger>,
    execution_timeout: Option<u64>,
    execution_timeout_unit: Option<TimeUnit>,
}

impl JobDetailsBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn last_update(mut self, last_update: DateTime<Utc>) -> Self {
        self.last_update = Some(last_update);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn execution_counter(mut self, execution_counter: u32) -> Self {
        self.execution_counter = execution_counter;
        self
    }

    pub fn scheduled_id(mut self, scheduled_id: Uuid) -> Self {
        self.scheduled_id = Some(scheduled_id);
        self
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn execution_timeout(mut self, amount: u64, unit: TimeUnit) -> Self {
        self.execution_timeout = Some(amount);
        self.execution_timeout_unit = Some(unit);
        self
    }

    /// Build the job.
    ///
    /// # Errors
    ///
    /// Returns `TypesError::Validation` if the id is missing or blank, or if
    /// the recipient or trigger is missing.
    pub fn build(self) -> Result<JobDetails, TypesError> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| TypesError::Validation("job id is required".to_string()))?;
        let recipient = self
            .recipient
            .ok_or_else(|| TypesError::Validation(format!("job {} has no recipient", id)))?;
        let trigger = self
            .trigger
            .ok_or_else(|| TypesError::Validation(format!("job {} has no trigger", id)))?;

        Ok(JobDetails {
            id,
            correlation_id: self.correlation_id,
            status: self.status,
            last_update: self.last_update,
            retries: self.retries,
            priority: self.priority,
            execution_counter: self.execution_counter,
            scheduled_id: self.scheduled_id,
            recipient,
            trigger,
            execution_timeout: self.execution_timeout,
            execution_timeout_unit: self.execution_timeout_unit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> JobDetails {
        JobDetails::builder()
            .id("job-1")
            .correlation_id("order-77")
            .priority(5)
            .recipient(Recipient::http("http://localhost/callback"))
            .trigger(Trigger::point_in_time(Utc::now()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let job = sample_job();
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.retries, 0);
        assert_eq!(job.execution_counter, 0);
        assert!(job.scheduled_id.is_none());
        assert!(job.execution_timeout().is_none());
    }

    #[test]
    fn test_builder_requires_id_and_trigger() {
        let result = JobDetails::builder()
            .id("  ")
            .recipient(Recipient::http("http://x"))
            .trigger(Trigger::point_in_time(Utc::now()))
            .build();
        assert!(matches!(result, Err(TypesError::Validation(_))));

        let result = JobDetails::builder()
            .id("job-2")
            .recipient(Recipient::http("http://x"))
            .build();
        match result {
            Err(TypesError::Validation(msg)) => assert!(msg.contains("trigger")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(JobStatus::Scheduled.is_active());
        assert!(JobStatus::Retry.is_active());
        assert!(JobStatus::Executed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert_eq!(JobStatus::Retry.to_string(), "RETRY");
    }

    #[test]
    fn test_merge_none_returns_base() {
        let job = sample_job();
        assert_eq!(job.merge(None), job);
    }

    #[test]
    fn test_merge_replaces_only_present_fields() {
        let job = sample_job();
        let patch = JobDetailsPatch {
            priority: Some(9),
            recipient: Some(Recipient::http("http://other/callback")),
            ..Default::default()
        };

        let merged = job.merge(Some(&patch));
        assert_eq!(merged.priority, 9);
        assert_eq!(merged.recipient, Recipient::http("http://other/callback"));
        assert_eq!(merged.id, job.id);
        assert_eq!(merged.correlation_id, job.correlation_id);
        assert_eq!(merged.trigger, job.trigger);
    }

    #[test]
    fn test_patch_from_job_keeps_absent_optionals() {
        let base = sample_job();
        let mut incoming = base.clone();
        incoming.correlation_id = None;
        incoming.priority = 1;

        let merged = base.merge(Some(&JobDetailsPatch::from(&incoming)));
        assert_eq!(merged.priority, 1);
        assert_eq!(merged.correlation_id.as_deref(), Some("order-77"));
    }

    #[test]
    fn test_execution_timeout_units() {
        let mut job = sample_job();
        job.execution_timeout = Some(250);
        assert_eq!(
            job.execution_timeout(),
            Some(std::time::Duration::from_millis(250))
        );
        job.execution_timeout_unit = Some(TimeUnit::Seconds);
        assert_eq!(
            job.execution_timeout(),
            Some(std::time::Duration::from_secs(250))
        );
    }

    #[test]
    fn test_deserialize_minimal_job() {
        let json = r#"{
            "id": "job-9",
            "recipient": {"type": "http", "url": "http://svc/hook"},
            "trigger": {"type": "point_in_time", "next_fire_time": "2030-01-01T00:00:00Z"}
        }"#;
        let job: JobDetails = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.priority, 0);
        assert!(job.trigger.has_next_fire_time().is_some());
    }
}
