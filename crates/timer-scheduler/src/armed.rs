//! Index of jobs currently armed in this process.
//!
//! Tracks, per job id, the timer handle and the fire time it was armed for.
//! The recovery scan consults it to skip jobs that are already armed, and
//! `TimerJobScheduler::scheduled` answers from it without touching storage.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Local record of one armed timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedJob {
    /// Handle returned by the timer service
    pub scheduled_id: Uuid,
    /// Instant the timer was armed for
    pub fire_time: DateTime<Utc>,
    /// Whether the timer has fired and the execution is in flight
    pub firing: bool,
}

impl ArmedJob {
    pub fn new(scheduled_id: Uuid, fire_time: DateTime<Utc>) -> Self {
        Self {
            scheduled_id,
            fire_time,
            firing: false,
        }
    }
}

/// Thread-safe map of job id to [`ArmedJob`].
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use timer_scheduler::{ArmedJob, ArmedJobs};
/// use uuid::Uuid;
///
/// let armed = ArmedJobs::new();
/// let handle = Uuid::new_v4();
/// let now = Utc::now();
/// armed.insert("job-1", ArmedJob::new(handle, now));
/// assert_eq!(armed.fire_time("job-1"), Some(now));
///
/// assert!(armed.mark_firing("job-1", handle));
/// assert!(armed.remove_if_handle("job-1", handle));
/// assert!(armed.get("job-1").is_none());
/// ```
#[derive(Debug, Default)]
pub struct ArmedJobs {
    jobs: DashMap<String, ArmedJob>,
}

impl ArmedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an armed timer, replacing any previous entry for the job.
    pub fn insert(&self, job_id: &str, armed: ArmedJob) -> Option<ArmedJob> {
        self.jobs.insert(job_id.to_string(), armed)
    }

    pub fn get(&self, job_id: &str) -> Option<ArmedJob> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    /// Fire time of the armed timer for `job_id`.
    pub fn fire_time(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.jobs.get(job_id).map(|entry| entry.fire_time)
    }

    /// Flag the entry as firing if it still belongs to `scheduled_id`.
    pub fn mark_firing(&self, job_id: &str, scheduled_id: Uuid) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(mut entry) if entry.scheduled_id == scheduled_id => {
                entry.firing = true;
                true
            }
            _ => false,
        }
    }

    /// Drop the entry regardless of handle.
    pub fn remove(&self, job_id: &str) -> Option<ArmedJob> {
        self.jobs.remove(job_id).map(|(_, armed)| armed)
    }

    /// Drop the entry only if it still belongs to `scheduled_id`.
    pub fn remove_if_handle(&self, job_id: &str, scheduled_id: Uuid) -> bool {
        self.jobs
            .remove_if(job_id, |_, armed| armed.scheduled_id == scheduled_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
