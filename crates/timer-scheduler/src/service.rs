//! Job management facade.
//!
//! Create, read, update and cancel operations expressed over the
//! scheduler and repository, for transports that expose jobs to clients.

use tracing::info;

use timer_types::{JobDetails, JobDetailsPatch};

use crate::error::SchedulerError;
use crate::scheduler::TimerJobScheduler;

/// CRUD-style access to scheduled jobs.
#[derive(Debug, Clone)]
pub struct JobService {
    scheduler: TimerJobScheduler,
}

impl JobService {
    pub fn new(scheduler: TimerJobScheduler) -> Self {
        Self { scheduler }
    }

    /// Schedule a new job, or re-schedule an active one with the same id.
    pub async fn create(&self, job: JobDetails) -> Result<JobDetails, SchedulerError> {
        info!(job_id = %job.id, trigger = job.trigger.kind(), "Creating job");
        self.scheduler.schedule(job).await
    }

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotFound` if the job does not exist.
    pub async fn get(&self, id: &str) -> Result<JobDetails, SchedulerError> {
        self.scheduler
            .repository()
            .get(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    /// Cancel a job. Returns `None` if it does not exist.
    pub async fn cancel(&self, id: &str) -> Result<Option<JobDetails>, SchedulerError> {
        self.scheduler.cancel(id).await
    }

    /// Apply `patch` to an active job and re-schedule it.
    ///
    /// # Errors
    ///
    /// - `Validation` if the patch names a different id
    /// - `NotFound` if the job does not exist
    /// - `AlreadyFinalized` if the job is terminal
    pub async fn patch(
        &self,
        id: &str,
        patch: JobDetailsPatch,
    ) -> Result<JobDetails, SchedulerError> {
        if let Some(patch_id) = &patch.id {
            if patch_id != id {
                return Err(SchedulerError::Validation(format!(
                    "patch id {} does not match job {}",
                    patch_id, id
                )));
            }
        }

        let stored = self.get(id).await?;
        if stored.status.is_terminal() {
            return Err(SchedulerError::AlreadyFinalized {
                id: stored.id,
                status: stored.status,
            });
        }

        let merged = stored.merge(Some(&patch));
        info!(job_id = %id, "Patching job");
        self.scheduler.schedule(merged).await
    }

    pub fn scheduler(&self) -> &TimerJobScheduler {
        &self.scheduler
    }
}
