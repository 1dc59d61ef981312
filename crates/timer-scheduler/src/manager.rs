//! Periodic recovery scan.
//!
//! Loads SCHEDULED and RETRY jobs whose next fire time falls before the end
//! of the recovery window and hands each one that is not already armed in
//! this process back to the scheduler. This picks up jobs deferred beyond
//! an earlier chunk and jobs left behind by a previous process. Jobs that
//! missed firings while no process was running skip ahead to their next
//! occurrence, or move to ERROR when none is left.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use timer_types::JobStatus;

use crate::error::SchedulerError;
use crate::scheduler::{recovery_horizon, Recovery, TimerJobScheduler};

/// Counts from one recovery scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Jobs returned by the range query
    pub found: usize,
    /// Skipped because they are armed here already
    pub already_armed: usize,
    /// Of the armed ones, those whose execution is running
    pub in_flight: usize,
    /// Handed to the scheduler
    pub submitted: usize,
    /// Missed firings skipped, admitted at the next occurrence
    pub fast_forwarded: usize,
    /// Missed their last firing and moved to ERROR
    pub abandoned: usize,
    /// Rejected by the scheduler
    pub failed: usize,
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the recovery scan on a timer.
///
/// The first scan runs as soon as `start()` is called, then once per load
/// interval measured from the start of the previous scan. The interval is
/// re-read from the scheduler after every scan, so `reconfigure` takes
/// effect on the next cycle.
pub struct JobSchedulerManager {
    scheduler: TimerJobScheduler,
    is_running: AtomicBool,
    running: Mutex<Option<RunningLoop>>,
}

impl JobSchedulerManager {
    pub fn new(scheduler: TimerJobScheduler) -> Self {
        Self {
            scheduler,
            is_running: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    pub fn scheduler(&self) -> &TimerJobScheduler {
        &self.scheduler
    }

    /// Start the periodic scan.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if already started.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.scheduler.clone(), token.clone()));
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(RunningLoop { token, handle });

        info!("Job scheduler manager started");
        Ok(())
    }

    /// Stop the periodic scan and wait for the loop to exit.
    ///
    /// Armed timers are left alone. A scan in progress is abandoned.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if not started.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating job scheduler manager shutdown");
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(RunningLoop { token, handle }) = running {
            token.cancel();
            if let Err(e) = handle.await {
                warn!("Recovery loop ended abnormally: {}", e);
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Job scheduler manager shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Run a single recovery scan now.
    pub async fn scan_once(&self) -> Result<ScanReport, SchedulerError> {
        scan(&self.scheduler).await
    }
}

fn ticker(period: Duration, first_tick: Instant) -> Interval {
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_loop(scheduler: TimerJobScheduler, token: CancellationToken) {
    let mut period = scheduler.config().load_interval();
    let mut ticks = ticker(period, Instant::now());

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticks.tick() => {}
        }

        tokio::select! {
            _ = token.cancelled() => break,
            result = scan(&scheduler) => {
                if let Err(e) = result {
                    warn!(error = %e, "Recovery scan failed");
                }
            }
        }

        let configured = scheduler.config().load_interval();
        if configured != period {
            debug!(?configured, previous = ?period, "Load interval changed");
            period = configured;
            ticks = ticker(period, Instant::now() + period);
        }
    }
    debug!("Recovery loop stopped");
}

async fn scan(scheduler: &TimerJobScheduler) -> Result<ScanReport, SchedulerError> {
    let config = scheduler.config();
    let to = recovery_horizon(Utc::now(), &config);
    let statuses = [JobStatus::Scheduled, JobStatus::Retry];
    let repository = scheduler.repository();

    let mut report = ScanReport::default();
    let mut pending = JoinSet::new();

    let mut jobs = repository.find_by_status_between_dates_order_by_priority(
        DateTime::<Utc>::MIN_UTC,
        to,
        &statuses,
    );
    while let Some(job) = jobs.next().await {
        let job = job?;
        report.found += 1;

        if let Some(armed) = scheduler.armed(&job.id) {
            report.already_armed += 1;
            if armed.firing {
                report.in_flight += 1;
            }
            continue;
        }

        let scheduler = scheduler.clone();
        pending.spawn(async move {
            let outcome = scheduler.recover(&job.id).await;
            outcome.map_err(|e| (job.id, e))
        });
        report.submitted += 1;
    }
    drop(jobs);

    while let Some(joined) = pending.join_next().await {
        match joined {
            Ok(Ok(Recovery::FastForwarded(_))) => report.fast_forwarded += 1,
            Ok(Ok(Recovery::Abandoned(_))) => report.abandoned += 1,
            Ok(Ok(Recovery::Admitted(_) | Recovery::Skipped)) => {}
            Ok(Err((job_id, e))) => {
                report.failed += 1;
                warn!(job_id = %job_id, error = %e, "Failed to schedule recovered job");
            }
            Err(e) => {
                report.failed += 1;
                error!(error = %e, "Recovery task panicked");
            }
        }
    }

    info!(
        found = report.found,
        submitted = report.submitted,
        already_armed = report.already_armed,
        in_flight = report.in_flight,
        fast_forwarded = report.fast_forwarded,
        abandoned = report.abandoned,
        failed = report.failed,
        "Recovery scan complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use timer_storage::{InMemoryJobRepository, JobRepository};
    use timer_types::{JobDetails, Recipient, SchedulerConfig, Trigger};

    use crate::executor::JobExecutorResolver;
    use crate::testing::{RecordingTimerService, ScriptedExecutor};

    struct Fixture {
        repo: Arc<InMemoryJobRepository>,
        timer: Arc<RecordingTimerService>,
        executor: Arc<ScriptedExecutor>,
        manager: JobSchedulerManager,
    }

    fn job(id: &str, fire_in: ChronoDuration, status: JobStatus) -> JobDetails {
        JobDetails::builder()
            .id(id)
            .status(status)
            .recipient(Recipient::http("http://localhost/callback"))
            .trigger(Trigger::point_in_time(Utc::now() + fire_in))
            .build()
            .unwrap()
    }

    fn setup(config: SchedulerConfig) -> Fixture {
        let repo = Arc::new(InMemoryJobRepository::new());
        let timer = Arc::new(RecordingTimerService::new());
        let executor = Arc::new(ScriptedExecutor::new());
        let scheduler = TimerJobScheduler::new(
            repo.clone(),
            timer.clone(),
            JobExecutorResolver::new().with_executor(executor.clone()),
            config,
        )
        .unwrap();
        Fixture {
            repo,
            timer,
            executor,
            manager: JobSchedulerManager::new(scheduler),
        }
    }

    fn five_minute_chunk() -> SchedulerConfig {
        SchedulerConfig {
            scheduler_chunk_in_minutes: 5,
            load_job_interval_in_minutes: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scan_arms_jobs_inside_window() {
        let fx = setup(five_minute_chunk());
        let soon = job("soon", ChronoDuration::minutes(1), JobStatus::Scheduled);
        let fire_time = soon.trigger.has_next_fire_time().unwrap();
        fx.repo.save(soon).await.unwrap();
        fx.repo
            .save(job("later", ChronoDuration::minutes(30), JobStatus::Scheduled))
            .await
            .unwrap();
        fx.repo
            .save(job("done", ChronoDuration::minutes(1), JobStatus::Executed))
            .await
            .unwrap();

        let report = fx.manager.scan_once().await.unwrap();

        assert_eq!(report.found, 1);
        assert_eq!(report.submitted, 1);
        assert_eq!(fx.timer.arm_count(), 1);
        assert_eq!(fx.manager.scheduler().scheduled("soon"), Some(fire_time));
        assert!(fx.manager.scheduler().scheduled("later").is_none());
        assert!(fx.repo.get("soon").await.unwrap().unwrap().scheduled_id.is_some());
    }

    #[tokio::test]
    async fn test_scan_arms_job_deferred_just_past_chunk() {
        let fx = setup(five_minute_chunk());
        let deferred = fx
            .manager
            .scheduler()
            .schedule(job("edge", ChronoDuration::seconds(5 * 60 + 20), JobStatus::Scheduled))
            .await
            .unwrap();
        assert!(deferred.scheduled_id.is_none());

        let report = fx.manager.scan_once().await.unwrap();

        assert_eq!(report.found, 1);
        assert_eq!(report.submitted, 1);
        assert_eq!(fx.timer.arm_count(), 1);
        assert!(fx.repo.get("edge").await.unwrap().unwrap().scheduled_id.is_some());
    }

    #[tokio::test]
    async fn test_scan_skips_already_armed_jobs() {
        let fx = setup(five_minute_chunk());
        fx.manager
            .scheduler()
            .schedule(job("soon", ChronoDuration::minutes(1), JobStatus::Scheduled))
            .await
            .unwrap();

        let report = fx.manager.scan_once().await.unwrap();

        assert_eq!(report.already_armed, 1);
        assert_eq!(report.in_flight, 0);
        assert_eq!(report.submitted, 0);
        assert_eq!(fx.timer.arm_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_reports_in_flight_execution() {
        let fx = setup(five_minute_chunk());
        fx.executor.push_sleep(std::time::Duration::from_millis(300));
        let saved = fx
            .manager
            .scheduler()
            .schedule(job("slow", ChronoDuration::minutes(1), JobStatus::Scheduled))
            .await
            .unwrap();

        let timer = fx.timer.clone();
        let handle = saved.scheduled_id.unwrap();
        let firing = tokio::spawn(async move { timer.fire(handle).await });
        for _ in 0..50 {
            if fx.executor.execution_count() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let report = fx.manager.scan_once().await.unwrap();
        assert_eq!(report.already_armed, 1);
        assert_eq!(report.in_flight, 1);
        assert_eq!(report.submitted, 0);

        assert!(firing.await.unwrap());
        let done = fx.repo.get("slow").await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Executed);
    }

    #[tokio::test]
    async fn test_scan_abandons_missed_one_shot_and_recovers_retry() {
        let fx = setup(five_minute_chunk());
        fx.repo
            .save(job("missed", ChronoDuration::hours(-1), JobStatus::Scheduled))
            .await
            .unwrap();
        fx.repo
            .save(job("retrying", ChronoDuration::hours(-1), JobStatus::Retry))
            .await
            .unwrap();

        let report = fx.manager.scan_once().await.unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.abandoned, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(fx.timer.arm_count(), 1);
        assert_eq!(fx.timer.last_delay(), Some(std::time::Duration::ZERO));

        let retrying = fx.repo.get("retrying").await.unwrap().unwrap();
        assert_eq!(retrying.status, JobStatus::Retry);
        assert!(retrying.scheduled_id.is_some());

        let missed = fx.repo.get("missed").await.unwrap().unwrap();
        assert_eq!(missed.status, JobStatus::Error);
        assert!(missed.scheduled_id.is_none());

        // ERROR jobs are out of the query, so they do not come back
        let report = fx.manager.scan_once().await.unwrap();
        assert_eq!(report.found, 1);
        assert_eq!(report.already_armed, 1);
        assert_eq!(report.abandoned, 0);
    }

    #[tokio::test]
    async fn test_scan_fast_forwards_missed_interval() {
        let fx = setup(five_minute_chunk());
        let trigger = Trigger::interval(
            Utc::now() - ChronoDuration::hours(1),
            None,
            0,
            60_000,
        )
        .unwrap();
        fx.repo
            .save(
                JobDetails::builder()
                    .id("every-minute")
                    .recipient(Recipient::http("http://localhost/callback"))
                    .trigger(trigger)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        let report = fx.manager.scan_once().await.unwrap();
        assert_eq!(report.fast_forwarded, 1);
        assert_eq!(fx.timer.arm_count(), 1);

        let stored = fx.repo.get("every-minute").await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Scheduled);
        assert!(stored.scheduled_id.is_some());
        let next = stored.trigger.has_next_fire_time().unwrap();
        assert!(next > Utc::now() - ChronoDuration::seconds(2));

        let report = fx.manager.scan_once().await.unwrap();
        assert_eq!(report.already_armed, 1);
        assert_eq!(report.fast_forwarded, 0);
        assert_eq!(fx.timer.arm_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_forces_expired_when_configured() {
        let fx = setup(SchedulerConfig {
            force_execute_expired_jobs: true,
            ..five_minute_chunk()
        });
        fx.repo
            .save(job("expired", ChronoDuration::hours(-1), JobStatus::Scheduled))
            .await
            .unwrap();

        let report = fx.manager.scan_once().await.unwrap();

        assert_eq!(report.submitted, 1);
        assert_eq!(report.abandoned, 0);
        assert_eq!(fx.timer.last_delay(), Some(std::time::Duration::ZERO));
    }

    #[tokio::test]
    async fn test_scan_surfaces_storage_failure() {
        let fx = setup(five_minute_chunk());
        fx.repo.set_available(false);
        assert!(matches!(
            fx.manager.scan_once().await,
            Err(SchedulerError::Storage(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_scans_once_per_interval() {
        let fx = setup(five_minute_chunk());
        fx.manager.start().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // Saved after the first scan; only the next tick picks it up
        fx.repo
            .save(job("next", ChronoDuration::minutes(3), JobStatus::Scheduled))
            .await
            .unwrap();
        assert_eq!(fx.timer.arm_count(), 0);

        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        assert_eq!(fx.timer.arm_count(), 1);

        fx.manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_start_stop() {
        let fx = setup(five_minute_chunk());
        fx.repo
            .save(job("soon", ChronoDuration::minutes(1), JobStatus::Scheduled))
            .await
            .unwrap();

        fx.manager.start().unwrap();
        assert!(fx.manager.is_running());
        assert!(matches!(fx.manager.start(), Err(SchedulerError::AlreadyRunning)));

        for _ in 0..50 {
            if fx.timer.arm_count() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(fx.timer.arm_count(), 1);

        fx.manager.shutdown().await.unwrap();
        assert!(!fx.manager.is_running());
        assert!(matches!(
            fx.manager.shutdown().await,
            Err(SchedulerError::NotRunning)
        ));

        // Restart after a clean shutdown.
        fx.manager.start().unwrap();
        fx.manager.shutdown().await.unwrap();
    }
}
