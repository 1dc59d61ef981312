//! Repository contract consumed by the scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use timer_types::{JobDetails, JobStatus};

use crate::error::StorageError;

/// Stream of jobs returned by range queries.
pub type JobStream<'a> = BoxStream<'a, Result<JobDetails, StorageError>>;

/// Durable storage for job records.
///
/// Implementations own retrying of their own transient failures; the
/// scheduler surfaces any error returned here to its caller unchanged.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Fetch a job by id.
    async fn get(&self, id: &str) -> Result<Option<JobDetails>, StorageError>;

    /// Whether a job with `id` is stored.
    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Insert or replace a job, returning the stored value.
    async fn save(&self, job: JobDetails) -> Result<JobDetails, StorageError>;

    /// Remove a job by id, returning what was stored.
    async fn delete(&self, id: &str) -> Result<Option<JobDetails>, StorageError>;

    /// Remove the stored record matching `job.id`.
    async fn delete_job(&self, job: &JobDetails) -> Result<Option<JobDetails>, StorageError> {
        self.delete(&job.id).await
    }

    /// Jobs whose next fire time lies in `[from, to]` and whose status is
    /// one of `statuses`, highest priority first.
    fn find_by_status_between_dates_order_by_priority<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &'a [JobStatus],
    ) -> JobStream<'a>;

    /// Every stored job, in no particular order.
    fn find_all(&self) -> JobStream<'_>;
}
