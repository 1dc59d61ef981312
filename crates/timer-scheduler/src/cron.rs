//! Timer service backed by tokio-cron-scheduler one-shot jobs.
//!
//! Provides lifecycle management around a `JobScheduler` with graceful
//! shutdown. Each armed timer is a one-shot job whose uuid doubles as the
//! timer handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SchedulerError;
use crate::timer::{TimerCallback, TimerService};

/// [`TimerService`] on top of a tokio-cron-scheduler instance.
///
/// The scheduler is created but not started. Call `start()` before arming.
pub struct CronTimerService {
    scheduler: JobScheduler,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl CronTimerService {
    pub async fn new() -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    /// Start the underlying scheduler.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if already started.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.scheduler.start().await?;
        info!("Cron timer service started");

        Ok(())
    }

    /// Stop the underlying scheduler. Pending one-shots are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if not started.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating cron timer service shutdown");
        self.shutdown_token.cancel();

        let mut scheduler = self.scheduler.clone();
        if let Err(e) = scheduler.shutdown().await {
            warn!("Error during cron scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Cron timer service shutdown complete");

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimerService for CronTimerService {
    async fn arm(&self, delay: Duration, callback: TimerCallback) -> Result<Uuid, SchedulerError> {
        let shutdown_token = self.shutdown_token.clone();

        let job = Job::new_one_shot_async(delay, move |uuid, _lock| {
            let callback = callback.clone();
            let token = shutdown_token.clone();
            Box::pin(async move {
                if token.is_cancelled() {
                    debug!(scheduled_id = %uuid, "Skipping one-shot after shutdown");
                    return;
                }
                callback(uuid).await;
            })
        })?;

        let scheduled_id = self.scheduler.add(job).await?;
        debug!(
            scheduled_id = %scheduled_id,
            delay_ms = delay.as_millis() as u64,
            "One-shot job armed"
        );
        Ok(scheduled_id)
    }

    async fn disarm(&self, scheduled_id: Uuid) -> bool {
        match self.scheduler.remove(&scheduled_id).await {
            Ok(()) => true,
            Err(e) => {
                debug!(scheduled_id = %scheduled_id, error = %e, "One-shot job not removed");
                false
            }
        }
    }
}
