//! Timer job scheduler.
//!
//! Admits jobs into in-process timers within a bounded horizon (the chunk),
//! fires them through the executor seam and drives the job status machine:
//!
//! ```text
//! SCHEDULED --fire ok, more firings--> SCHEDULED
//! SCHEDULED --fire ok, trigger done--> EXECUTED
//! SCHEDULED --fire failed----------->  RETRY | ERROR
//! RETRY     --fire ok--------------->  SCHEDULED | EXECUTED
//! any active --cancel--------------->  CANCELED
//! ```
//!
//! Every operation on a job runs under that job's lock, so cancel and fire
//! for the same job never interleave inside a read-modify-write. The lock is
//! released while the executor runs; completion re-reads the stored job and
//! keeps a cancellation that happened in the meantime.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use timer_storage::JobRepository;
use timer_types::{JobDetails, JobDetailsPatch, JobExecutionResponse, JobStatus, SchedulerConfig};

use crate::armed::{ArmedJob, ArmedJobs};
use crate::error::{ExecutionError, SchedulerError};
use crate::executor::JobExecutorResolver;
use crate::retry::retry_delay;
use crate::timer::{TimerCallback, TimerService};

/// Whether `fire_time` is further in the past than the configured tolerance.
pub fn is_expired(fire_time: DateTime<Utc>, now: DateTime<Utc>, config: &SchedulerConfig) -> bool {
    now.checked_sub_signed(config.expired_tolerance())
        .is_some_and(|threshold| fire_time < threshold)
}

/// End of the window within which `schedule` arms jobs.
fn chunk_horizon(now: DateTime<Utc>, config: &SchedulerConfig) -> DateTime<Utc> {
    now.checked_add_signed(config.chunk())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// End of the window the recovery scan loads and arms.
///
/// One load interval past the chunk, so a job deferred just beyond the chunk
/// is armed by the next scan even when scans run late.
pub(crate) fn recovery_horizon(now: DateTime<Utc>, config: &SchedulerConfig) -> DateTime<Utc> {
    let end = chunk_horizon(now, config);
    chrono::Duration::from_std(config.load_interval())
        .ok()
        .and_then(|interval| end.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn instant_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn normalize(config: SchedulerConfig) -> SchedulerConfig {
    if config.load_interval_exceeds_chunk() {
        warn!(
            load_job_interval_in_minutes = config.load_job_interval_in_minutes,
            scheduler_chunk_in_minutes = config.scheduler_chunk_in_minutes,
            "Load interval exceeds scheduler chunk, clamping to chunk size"
        );
        config.clamped()
    } else {
        config
    }
}

/// Outcome of re-admitting a stored job from the recovery scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// Armed, or left for a later scan
    Admitted(JobDetails),
    /// Missed firings were skipped; admitted at the next occurrence
    FastForwarded(JobDetails),
    /// No occurrence left after the missed ones; persisted as ERROR
    Abandoned(JobDetails),
    /// Gone, no longer active, or already armed here
    Skipped,
}

struct Inner {
    repository: Arc<dyn JobRepository>,
    timer: Arc<dyn TimerService>,
    executors: JobExecutorResolver,
    config: RwLock<Arc<SchedulerConfig>>,
    armed: ArmedJobs,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Schedules, fires and cancels timer jobs.
///
/// Cheap to clone; clones share state. Timer callbacks hold only a weak
/// reference, so dropping every clone stops pending firings from running.
#[derive(Clone)]
pub struct TimerJobScheduler {
    inner: Arc<Inner>,
}

impl TimerJobScheduler {
    /// Create a scheduler over `repository` and `timer`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Config` if `config` is invalid. A load
    /// interval longer than the chunk is clamped with a warning.
    pub fn new(
        repository: Arc<dyn JobRepository>,
        timer: Arc<dyn TimerService>,
        executors: JobExecutorResolver,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let config = normalize(config);

        info!(
            chunk_minutes = config.scheduler_chunk_in_minutes,
            load_interval_minutes = config.load_job_interval_in_minutes,
            force_execute_expired_jobs = config.force_execute_expired_jobs,
            executors = executors.len(),
            "Timer job scheduler created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                repository,
                timer,
                executors,
                config: RwLock::new(Arc::new(config)),
                armed: ArmedJobs::new(),
                locks: DashMap::new(),
            }),
        })
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<SchedulerConfig> {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration. Already armed timers are left as they are.
    pub fn reconfigure(&self, config: SchedulerConfig) -> Result<(), SchedulerError> {
        config.validate()?;
        let config = Arc::new(normalize(config));
        *self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
        info!("Scheduler configuration updated");
        Ok(())
    }

    pub fn repository(&self) -> Arc<dyn JobRepository> {
        Arc::clone(&self.inner.repository)
    }

    /// Fire time of the job if it is armed in this process.
    pub fn scheduled(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.inner.armed.fire_time(job_id)
    }

    /// Local armed-timer entry for the job.
    pub fn armed(&self, job_id: &str) -> Option<ArmedJob> {
        self.inner.armed.get(job_id)
    }

    /// Number of jobs armed in this process.
    pub fn armed_count(&self) -> usize {
        self.inner.armed.len()
    }

    /// Admit a job.
    ///
    /// Jobs firing within the chunk are armed and persisted with their timer
    /// handle. Jobs firing later are persisted without a handle and left to
    /// the recovery scan. Re-scheduling an active job disarms its previous
    /// timer and merges the incoming fields over the stored record.
    ///
    /// # Errors
    ///
    /// - `AlreadyFinalized` if the stored job is terminal
    /// - `Expired` if the fire time is past and forced execution is off
    /// - `Validation` if the trigger has no remaining fire time
    /// - `Storage`/`Timer` if the repository or timer fails
    pub async fn schedule(&self, job: JobDetails) -> Result<JobDetails, SchedulerError> {
        if job.id.trim().is_empty() {
            return Err(SchedulerError::Validation("job id is required".to_string()));
        }
        let job_id = job.id.clone();
        self.with_job_lock(&job_id, self.schedule_locked(job)).await
    }

    /// Cancel a job by id.
    ///
    /// Returns `None` if no such job exists. A terminal job is returned
    /// unchanged.
    pub async fn cancel(&self, job_id: &str) -> Result<Option<JobDetails>, SchedulerError> {
        self.with_job_lock(job_id, self.cancel_locked(job_id)).await
    }

    /// Cancel the job described by `job`.
    pub async fn cancel_job(&self, job: &JobDetails) -> Result<JobDetails, SchedulerError> {
        self.cancel(&job.id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(job.id.clone()))
    }

    /// Cancel the job produced by a pending lookup once it resolves.
    pub async fn cancel_pending<F>(&self, pending: F) -> Result<JobDetails, SchedulerError>
    where
        F: Future<Output = Result<JobDetails, SchedulerError>> + Send,
    {
        let job = pending.await?;
        self.cancel_job(&job).await
    }

    /// Re-admit a stored job found by the recovery scan.
    ///
    /// Unlike `schedule`, a past-due SCHEDULED job is not rejected: without
    /// forced execution its missed firings are skipped and it is armed at
    /// its next occurrence, or moved to ERROR when none is left. RETRY jobs
    /// and forced jobs fire immediately.
    pub async fn recover(&self, job_id: &str) -> Result<Recovery, SchedulerError> {
        self.with_job_lock(job_id, self.recover_locked(job_id)).await
    }

    /// Handle an elapsed timer for `job_id`.
    ///
    /// Returns the stored job after completion, or `None` when the timer was
    /// stale (job gone, canceled, or re-armed under another handle).
    pub async fn fire(
        &self,
        job_id: &str,
        scheduled_id: Uuid,
    ) -> Result<Option<JobDetails>, SchedulerError> {
        let claimed = self
            .with_job_lock(job_id, self.claim(job_id, scheduled_id))
            .await;
        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.inner.armed.remove_if_handle(job_id, scheduled_id);
                return Err(e);
            }
        };

        let outcome = self.execute(&job).await;

        let completed = self
            .with_job_lock(job_id, self.complete(job, scheduled_id, outcome))
            .await;
        if completed.is_err() {
            self.inner.armed.remove_if_handle(job_id, scheduled_id);
        }
        completed
    }

    async fn with_job_lock<T, Fut>(&self, job_id: &str, op: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let lock = self
            .inner
            .locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        drop(lock);
        self.inner
            .locks
            .remove_if(job_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn schedule_locked(&self, incoming: JobDetails) -> Result<JobDetails, SchedulerError> {
        let stored = self.inner.repository.get(&incoming.id).await?;
        if let Some(stored) = &stored {
            if stored.status.is_terminal() {
                return Err(SchedulerError::AlreadyFinalized {
                    id: stored.id.clone(),
                    status: stored.status,
                });
            }
        }

        // The lifecycle fields belong to the scheduler, never to the caller.
        let job = match &stored {
            Some(stored) => {
                let mut merged = stored.merge(Some(&JobDetailsPatch::from(&incoming)));
                merged.status = stored.status;
                merged.retries = stored.retries;
                merged.execution_counter = stored.execution_counter;
                merged
            }
            None => JobDetails {
                status: JobStatus::Scheduled,
                retries: 0,
                execution_counter: 0,
                scheduled_id: None,
                ..incoming
            },
        };

        let fire_time = job.trigger.has_next_fire_time().ok_or_else(|| {
            SchedulerError::Validation(format!("job {} has no remaining fire time", job.id))
        })?;

        let config = self.config();
        let now = Utc::now();
        let due = if is_expired(fire_time, now, &config) {
            if job.status == JobStatus::Retry {
                now
            } else if config.force_execute_expired_jobs {
                info!(job_id = %job.id, fire_time = %fire_time, "Job expired, executing immediately");
                now
            } else {
                return Err(SchedulerError::Expired {
                    id: job.id,
                    fire_time,
                });
            }
        } else {
            fire_time
        };

        if let Some(stored) = &stored {
            self.disarm(stored).await;
        }
        self.admit(job, due, now, chunk_horizon(now, &config)).await
    }

    async fn recover_locked(&self, job_id: &str) -> Result<Recovery, SchedulerError> {
        let Some(mut job) = self.inner.repository.get(job_id).await? else {
            return Ok(Recovery::Skipped);
        };
        if !job.status.is_active() || self.inner.armed.get(job_id).is_some() {
            return Ok(Recovery::Skipped);
        }
        // Left over from a timer that no longer runs here
        self.disarm(&job).await;

        let config = self.config();
        let now = Utc::now();
        let horizon = recovery_horizon(now, &config);

        let Some(fire_time) = job.trigger.has_next_fire_time() else {
            warn!(job_id = %job.id, "Active job has no remaining fire time");
            return self.abandon(job, now).await.map(Recovery::Abandoned);
        };

        if !is_expired(fire_time, now, &config) {
            return self
                .admit(job, fire_time, now, horizon)
                .await
                .map(Recovery::Admitted);
        }
        if job.status == JobStatus::Retry || config.force_execute_expired_jobs {
            info!(job_id = %job.id, fire_time = %fire_time, "Recovered job past due, executing immediately");
            return self.admit(job, now, now, horizon).await.map(Recovery::Admitted);
        }

        let threshold = now
            .checked_sub_signed(config.expired_tolerance())
            .unwrap_or(now);
        let skipped = job.trigger.skip_until(threshold);
        match skipped.has_next_fire_time() {
            Some(next) => {
                warn!(
                    job_id = %job.id,
                    missed = %fire_time,
                    next_fire_time = %next,
                    "Skipping missed firings"
                );
                job.trigger = skipped;
                self.admit(job, next, now, horizon)
                    .await
                    .map(Recovery::FastForwarded)
            }
            None => {
                warn!(job_id = %job.id, missed = %fire_time, "Job missed its last firing");
                self.abandon(job, now).await.map(Recovery::Abandoned)
            }
        }
    }

    async fn abandon(
        &self,
        mut job: JobDetails,
        now: DateTime<Utc>,
    ) -> Result<JobDetails, SchedulerError> {
        job.status = JobStatus::Error;
        job.scheduled_id = None;
        job.last_update = Some(now);
        let saved = self.inner.repository.save(job).await?;
        error!(job_id = %saved.id, "Job moved to ERROR without firing");
        Ok(saved)
    }

    async fn admit(
        &self,
        mut job: JobDetails,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> Result<JobDetails, SchedulerError> {
        if due > horizon {
            job.scheduled_id = None;
            job.last_update = Some(now);
            self.inner.armed.remove(&job.id);
            let saved = self.inner.repository.save(job).await?;
            debug!(
                job_id = %saved.id,
                fire_time = %due,
                "Job beyond current chunk, deferred to recovery scan"
            );
            return Ok(saved);
        }

        self.arm_and_save(job, due, now).await
    }

    async fn arm_and_save(
        &self,
        mut job: JobDetails,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<JobDetails, SchedulerError> {
        let delay = (due - now).to_std().unwrap_or(Duration::ZERO);
        let scheduled_id = self
            .inner
            .timer
            .arm(delay, self.timer_callback(&job.id))
            .await?;

        job.scheduled_id = Some(scheduled_id);
        job.last_update = Some(now);
        match self.inner.repository.save(job).await {
            Ok(saved) => {
                self.inner
                    .armed
                    .insert(&saved.id, ArmedJob::new(scheduled_id, due));
                info!(
                    job_id = %saved.id,
                    scheduled_id = %scheduled_id,
                    status = %saved.status,
                    delay_ms = delay.as_millis() as u64,
                    "Job armed"
                );
                Ok(saved)
            }
            Err(e) => {
                self.inner.timer.disarm(scheduled_id).await;
                Err(e.into())
            }
        }
    }

    async fn disarm(&self, job: &JobDetails) {
        let mut handles = Vec::with_capacity(2);
        if let Some(armed) = self.inner.armed.remove(&job.id) {
            handles.push(armed.scheduled_id);
        }
        if let Some(stored) = job.scheduled_id {
            if !handles.contains(&stored) {
                handles.push(stored);
            }
        }
        for handle in handles {
            if self.inner.timer.disarm(handle).await {
                debug!(job_id = %job.id, scheduled_id = %handle, "Previous timer disarmed");
            }
        }
    }

    fn timer_callback(&self, job_id: &str) -> TimerCallback {
        let inner = Arc::downgrade(&self.inner);
        let job_id = job_id.to_string();
        Arc::new(move |scheduled_id| {
            let inner = inner.clone();
            let job_id = job_id.clone();
            async move {
                let Some(inner) = inner.upgrade() else {
                    debug!(job_id = %job_id, "Scheduler dropped, ignoring timer");
                    return;
                };
                let scheduler = TimerJobScheduler { inner };
                if let Err(e) = scheduler.fire(&job_id, scheduled_id).await {
                    error!(job_id = %job_id, error = %e, "Failed to process fired job");
                }
            }
            .boxed()
        })
    }

    async fn cancel_locked(&self, job_id: &str) -> Result<Option<JobDetails>, SchedulerError> {
        let Some(mut job) = self.inner.repository.get(job_id).await? else {
            debug!(job_id = %job_id, "Cancel requested for unknown job");
            return Ok(None);
        };
        if job.status.is_terminal() {
            debug!(job_id = %job_id, status = %job.status, "Cancel requested for finalized job");
            return Ok(Some(job));
        }

        self.disarm(&job).await;
        job.status = JobStatus::Canceled;
        job.scheduled_id = None;
        job.last_update = Some(Utc::now());
        let saved = self.inner.repository.save(job).await?;
        info!(job_id = %saved.id, "Job canceled");
        Ok(Some(saved))
    }

    async fn claim(
        &self,
        job_id: &str,
        scheduled_id: Uuid,
    ) -> Result<Option<JobDetails>, SchedulerError> {
        let stored = self.inner.repository.get(job_id).await?;
        match stored {
            Some(job) if job.status.is_active() && job.scheduled_id == Some(scheduled_id) => {
                self.inner.armed.mark_firing(job_id, scheduled_id);
                debug!(job_id = %job_id, scheduled_id = %scheduled_id, "Timer fired");
                Ok(Some(job))
            }
            other => {
                self.inner.armed.remove_if_handle(job_id, scheduled_id);
                debug!(
                    job_id = %job_id,
                    scheduled_id = %scheduled_id,
                    status = ?other.map(|job| job.status),
                    "Ignoring stale timer"
                );
                Ok(None)
            }
        }
    }

    async fn execute(&self, job: &JobDetails) -> Result<JobExecutionResponse, ExecutionError> {
        let executor = self
            .inner
            .executors
            .resolve(&job.recipient)
            .ok_or_else(|| ExecutionError::NoExecutor(job.recipient.kind().to_string()))?;

        debug!(job_id = %job.id, executor = executor.name(), "Executing job");
        let fired = job.clone();
        let mut task = tokio::spawn(async move { executor.execute(&fired).await });

        let joined = match job.execution_timeout() {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(ExecutionError::Timeout(limit));
                }
            },
            None => task.await,
        };

        joined.unwrap_or_else(|e| Err(ExecutionError::Failed(format!("executor aborted: {}", e))))
    }

    async fn complete(
        &self,
        fired: JobDetails,
        scheduled_id: Uuid,
        outcome: Result<JobExecutionResponse, ExecutionError>,
    ) -> Result<Option<JobDetails>, SchedulerError> {
        let Some(current) = self.inner.repository.get(&fired.id).await? else {
            self.inner.armed.remove_if_handle(&fired.id, scheduled_id);
            warn!(job_id = %fired.id, "Job removed while executing");
            return Ok(None);
        };
        if !current.status.is_active() || current.scheduled_id != Some(scheduled_id) {
            self.inner.armed.remove_if_handle(&fired.id, scheduled_id);
            info!(
                job_id = %current.id,
                status = %current.status,
                "Job changed while executing, keeping stored state"
            );
            return Ok(Some(current));
        }

        let completed = match outcome {
            Ok(response) if response.succeeded() => self.on_success(current).await?,
            Ok(response) => {
                let reason = response
                    .message
                    .unwrap_or_else(|| "executor reported failure".to_string());
                self.on_failure(current, reason).await?
            }
            Err(e) => self.on_failure(current, e.to_string()).await?,
        };
        Ok(Some(completed))
    }

    async fn on_success(&self, mut job: JobDetails) -> Result<JobDetails, SchedulerError> {
        job.execution_counter = job.execution_counter.saturating_add(1);
        job.retries = 0;
        let (_, advanced) = job.trigger.next_fire_time();
        job.trigger = advanced;

        let now = Utc::now();
        match job.trigger.has_next_fire_time() {
            Some(next) => {
                job.status = JobStatus::Scheduled;
                info!(
                    job_id = %job.id,
                    executions = job.execution_counter,
                    next_fire_time = %next,
                    "Job executed, rescheduling"
                );
                let horizon = chunk_horizon(now, &self.config());
                self.admit(job, next, now, horizon).await
            }
            None => {
                job.status = JobStatus::Executed;
                job.scheduled_id = None;
                job.last_update = Some(now);
                let saved = self.inner.repository.save(job).await?;
                self.inner.armed.remove(&saved.id);
                info!(
                    job_id = %saved.id,
                    executions = saved.execution_counter,
                    "Job executed, no further firings"
                );
                Ok(saved)
            }
        }
    }

    async fn on_failure(&self, mut job: JobDetails, reason: String) -> Result<JobDetails, SchedulerError> {
        let config = self.config();
        job.retries = job.retries.saturating_add(1);
        let now = Utc::now();

        if job.retries < config.retry.max_retries {
            job.status = JobStatus::Retry;
            let delay = retry_delay(&config.retry, job.retries);
            warn!(
                job_id = %job.id,
                retries = job.retries,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "Job execution failed, retrying"
            );
            self.arm_and_save(job, instant_after(now, delay), now).await
        } else {
            job.status = JobStatus::Error;
            job.scheduled_id = None;
            job.last_update = Some(now);
            let saved = self.inner.repository.save(job).await?;
            self.inner.armed.remove(&saved.id);
            error!(
                job_id = %saved.id,
                retries = saved.retries,
                error = %reason,
                "Job execution failed, retries exhausted"
            );
            Ok(saved)
        }
    }
}

impl std::fmt::Debug for TimerJobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerJobScheduler")
            .field("armed", &self.inner.armed.len())
            .field("executors", &self.inner.executors)
            .finish()
    }
}
