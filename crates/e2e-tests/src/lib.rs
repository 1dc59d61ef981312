//! End-to-end test infrastructure for the job timer service.
//!
//! Provides a shared TestHarness wiring a real tokio timer service, the
//! in-memory repository and a scripted executor, plus polling helpers for
//! asserting on asynchronous state transitions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;

use timer_scheduler::{
    JobExecutorResolver, JobSchedulerManager, JobService, ScriptedExecutor, TimerJobScheduler,
    TokioTimerService,
};
use timer_storage::{InMemoryJobRepository, JobRepository};
use timer_types::{BackoffKind, JobDetails, JobStatus, Recipient, RetryPolicy, SchedulerConfig, Trigger};

/// Shared test harness for E2E tests.
///
/// One harness is one scheduler process. Several harnesses may share a
/// repository to simulate restarts.
pub struct TestHarness {
    pub repository: Arc<InMemoryJobRepository>,
    pub timer: Arc<TokioTimerService>,
    pub executor: Arc<ScriptedExecutor>,
    pub scheduler: TimerJobScheduler,
    pub manager: JobSchedulerManager,
    pub service: JobService,
}

impl TestHarness {
    /// Create a harness with a fresh repository.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_repository(Arc::new(InMemoryJobRepository::new()), config)
    }

    /// Create a harness over an existing repository.
    pub fn with_repository(repository: Arc<InMemoryJobRepository>, config: SchedulerConfig) -> Self {
        let timer = Arc::new(TokioTimerService::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let scheduler = TimerJobScheduler::new(
            repository.clone(),
            timer.clone(),
            JobExecutorResolver::new().with_executor(executor.clone()),
            config,
        )
        .expect("Failed to create scheduler");
        let manager = JobSchedulerManager::new(scheduler.clone());
        let service = JobService::new(scheduler.clone());

        Self {
            repository,
            timer,
            executor,
            scheduler,
            manager,
            service,
        }
    }

    /// Simulate a process stop: pending timers are dropped, the recovery
    /// loop is stopped if running.
    pub async fn stop(&self) {
        if self.manager.is_running() {
            self.manager
                .shutdown()
                .await
                .expect("Failed to stop recovery loop");
        }
        self.timer.shutdown();
    }

    /// Fetch a stored job, panicking if absent.
    pub async fn job(&self, id: &str) -> JobDetails {
        self.repository
            .get(id)
            .await
            .expect("Repository read failed")
            .unwrap_or_else(|| panic!("Job {} not found", id))
    }

    /// Poll until the stored job reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: JobStatus, timeout: Duration) -> JobDetails {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.job(id).await;
            if job.status == status {
                return job;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "Job {} did not reach {} within {:?}, last seen {:?}",
                    id, status, timeout, job
                );
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Jobs currently SCHEDULED or RETRY.
    pub async fn active_jobs(&self) -> Vec<JobDetails> {
        self.repository
            .find_all()
            .try_filter(|job| futures::future::ready(job.status.is_active()))
            .try_collect()
            .await
            .expect("Repository scan failed")
    }
}

/// Config with the given chunk and a fast fixed retry delay.
pub fn test_config(chunk_minutes: u64) -> SchedulerConfig {
    SchedulerConfig {
        scheduler_chunk_in_minutes: chunk_minutes,
        load_job_interval_in_minutes: 1,
        retry: RetryPolicy {
            max_retries: 3,
            backoff: BackoffKind::Fixed { delay_ms: 50 },
        },
        ..Default::default()
    }
}

/// HTTP job with the given trigger.
pub fn http_job(id: &str, trigger: Trigger) -> JobDetails {
    JobDetails::builder()
        .id(id)
        .recipient(Recipient::http(format!("http://localhost:8080/jobs/{}", id)))
        .trigger(trigger)
        .build()
        .expect("Failed to build job")
}

/// Instant `millis` milliseconds from now.
pub fn in_millis(millis: i64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::milliseconds(millis)
}
