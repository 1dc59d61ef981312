//! Timer primitive seam.
//!
//! A timer service arms one-shot delays and hands back an opaque handle.
//! When the delay elapses it invokes the callback with that handle. Disarming
//! a handle that already fired or never existed is a no-op.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::SchedulerError;

/// Invoked with the timer handle when an armed delay elapses.
pub type TimerCallback = Arc<dyn Fn(Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

/// One-shot timers keyed by opaque handles.
#[async_trait]
pub trait TimerService: Send + Sync {
    /// Arm `callback` to run once after `delay`.
    async fn arm(&self, delay: Duration, callback: TimerCallback) -> Result<Uuid, SchedulerError>;

    /// Cancel an armed timer. Returns whether a pending timer was removed.
    async fn disarm(&self, scheduled_id: Uuid) -> bool;
}

/// Timer service that spawns one tokio task per armed timer.
///
/// Each task races its sleep against a per-timer cancellation token that is
/// a child of the service's shutdown token.
#[derive(Debug, Default)]
pub struct TokioTimerService {
    timers: Arc<DashMap<Uuid, CancellationToken>>,
    shutdown_token: CancellationToken,
}

impl TokioTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers that have not yet fired or been disarmed.
    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    /// Cancel every pending timer. Timers armed afterwards never fire.
    pub fn shutdown(&self) {
        info!(pending = self.timers.len(), "Shutting down tokio timer service");
        self.shutdown_token.cancel();
        self.timers.clear();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }
}

#[async_trait]
impl TimerService for TokioTimerService {
    async fn arm(&self, delay: Duration, callback: TimerCallback) -> Result<Uuid, SchedulerError> {
        if self.shutdown_token.is_cancelled() {
            return Err(SchedulerError::Timer(
                "timer service is shut down".to_string(),
            ));
        }

        let scheduled_id = Uuid::new_v4();
        let token = self.shutdown_token.child_token();
        self.timers.insert(scheduled_id, token.clone());

        let timers = Arc::clone(&self.timers);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(scheduled_id = %scheduled_id, "Timer cancelled before firing");
                }
                _ = tokio::time::sleep(delay) => {
                    if timers.remove(&scheduled_id).is_some() {
                        callback(scheduled_id).await;
                    }
                }
            }
        });

        debug!(scheduled_id = %scheduled_id, delay_ms = delay.as_millis() as u64, "Timer armed");
        Ok(scheduled_id)
    }

    async fn disarm(&self, scheduled_id: Uuid) -> bool {
        match self.timers.remove(&scheduled_id) {
            Some((_, token)) => {
                token.cancel();
                debug!(scheduled_id = %scheduled_id, "Timer disarmed");
                true
            }
            None => false,
        }
    }
}
