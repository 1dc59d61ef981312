//! In-memory job repository.
//!
//! Backed by a sharded concurrent map, so unrelated jobs never contend on a
//! single lock. Availability can be switched off to exercise storage error
//! paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::{debug, trace};

use timer_types::{JobDetails, JobStatus};

use crate::error::StorageError;
use crate::repository::{JobRepository, JobStream};

/// Map-backed [`JobRepository`].
#[derive(Debug)]
pub struct InMemoryJobRepository {
    jobs: DashMap<String, JobDetails>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl Default for InMemoryJobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Toggle availability; while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of saves and deletes performed so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "in-memory repository switched off".to_string(),
            ))
        }
    }

    fn unavailable_stream(&self) -> Option<JobStream<'_>> {
        self.check_available()
            .err()
            .map(|e| stream::iter(vec![Err(e)]).boxed())
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn get(&self, id: &str) -> Result<Option<JobDetails>, StorageError> {
        self.check_available()?;
        Ok(self.jobs.get(id).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        self.check_available()?;
        Ok(self.jobs.contains_key(id))
    }

    async fn save(&self, job: JobDetails) -> Result<JobDetails, StorageError> {
        self.check_available()?;
        trace!(job_id = %job.id, status = %job.status, "Saving job");
        self.jobs.insert(job.id.clone(), job.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(job)
    }

    async fn delete(&self, id: &str) -> Result<Option<JobDetails>, StorageError> {
        self.check_available()?;
        let removed = self.jobs.remove(id).map(|(_, job)| job);
        if removed.is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
            debug!(job_id = %id, "Deleted job");
        }
        Ok(removed)
    }

    fn find_by_status_between_dates_order_by_priority<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &'a [JobStatus],
    ) -> JobStream<'a> {
        if let Some(failed) = self.unavailable_stream() {
            return failed;
        }

        let mut matching: Vec<(DateTime<Utc>, JobDetails)> = self
            .jobs
            .iter()
            .filter(|entry| statuses.contains(&entry.status))
            .filter_map(|entry| {
                let fire_time = entry.trigger.has_next_fire_time()?;
                (fire_time >= from && fire_time <= to).then(|| (fire_time, entry.value().clone()))
            })
            .collect();

        matching.sort_by(|(a_time, a), (b_time, b)| {
            b.priority.cmp(&a.priority).then(a_time.cmp(b_time))
        });

        stream::iter(matching.into_iter().map(|(_, job)| Ok(job))).boxed()
    }

    fn find_all(&self) -> JobStream<'_> {
        if let Some(failed) = self.unavailable_stream() {
            return failed;
        }
        let jobs: Vec<JobDetails> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        stream::iter(jobs.into_iter().map(Ok)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use futures::TryStreamExt;
    use timer_types::{Recipient, Trigger};

    fn job(id: &str, priority: i32, fire_in: Duration, status: JobStatus) -> JobDetails {
        JobDetails::builder()
            .id(id)
            .priority(priority)
            .status(status)
            .recipient(Recipient::http("http://localhost/callback"))
            .trigger(Trigger::point_in_time(Utc::now() + fire_in))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_get_exists_delete() {
        let repo = InMemoryJobRepository::new();
        let saved = repo
            .save(job("a", 0, Duration::minutes(1), JobStatus::Scheduled))
            .await
            .unwrap();

        assert!(repo.exists("a").await.unwrap());
        assert_eq!(repo.get("a").await.unwrap(), Some(saved.clone()));

        let deleted = repo.delete_job(&saved).await.unwrap();
        assert_eq!(deleted, Some(saved));
        assert!(!repo.exists("a").await.unwrap());
        assert_eq!(repo.delete("a").await.unwrap(), None);
        assert_eq!(repo.write_count(), 2);
    }

    #[tokio::test]
    async fn test_range_query_filters_and_orders_by_priority() {
        let repo = InMemoryJobRepository::new();
        repo.save(job("low", 1, Duration::minutes(1), JobStatus::Scheduled))
            .await
            .unwrap();
        repo.save(job("high", 10, Duration::minutes(2), JobStatus::Retry))
            .await
            .unwrap();
        repo.save(job("late", 50, Duration::hours(2), JobStatus::Scheduled))
            .await
            .unwrap();
        repo.save(job("done", 99, Duration::minutes(1), JobStatus::Executed))
            .await
            .unwrap();

        let now = Utc::now();
        let statuses = [JobStatus::Scheduled, JobStatus::Retry];
        let found: Vec<JobDetails> = repo
            .find_by_status_between_dates_order_by_priority(
                now,
                now + Duration::minutes(10),
                &statuses,
            )
            .try_collect()
            .await
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_unavailable_repository_fails_every_call() {
        let repo = InMemoryJobRepository::new();
        repo.set_available(false);

        assert!(matches!(
            repo.get("a").await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(repo
            .save(job("a", 0, Duration::minutes(1), JobStatus::Scheduled))
            .await
            .is_err());

        let result: Result<Vec<JobDetails>, StorageError> = repo.find_all().try_collect().await;
        assert!(result.is_err());

        repo.set_available(true);
        assert!(repo.get("a").await.unwrap().is_none());
        assert!(repo.is_empty());
    }
}
