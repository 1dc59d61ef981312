//! Test doubles for the scheduler seams.
//!
//! `RecordingTimerService` never fires on its own; tests fire handles
//! explicitly. `ScriptedExecutor` plays back a queue of outcomes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use timer_types::{JobDetails, JobExecutionResponse, Recipient};

use crate::error::{ExecutionError, SchedulerError};
use crate::executor::JobExecutor;
use crate::timer::{TimerCallback, TimerService};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timer service that records arms and disarms and fires only on demand.
#[derive(Default)]
pub struct RecordingTimerService {
    pending: DashMap<Uuid, TimerCallback>,
    order: Mutex<Vec<Uuid>>,
    delays: Mutex<Vec<Duration>>,
    arms: AtomicUsize,
    disarms: AtomicUsize,
}

impl RecordingTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total timers armed so far.
    pub fn arm_count(&self) -> usize {
        self.arms.load(Ordering::SeqCst)
    }

    /// Timers removed by `disarm` before firing.
    pub fn disarm_count(&self) -> usize {
        self.disarms.load(Ordering::SeqCst)
    }

    /// Handles still pending, in arm order.
    pub fn pending(&self) -> Vec<Uuid> {
        lock(&self.order)
            .iter()
            .filter(|handle| self.pending.contains_key(*handle))
            .copied()
            .collect()
    }

    /// Delays of every arm call, in order.
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }

    pub fn last_delay(&self) -> Option<Duration> {
        lock(&self.delays).last().copied()
    }

    /// Fire a pending timer. Returns false if `handle` is not pending.
    pub async fn fire(&self, handle: Uuid) -> bool {
        let Some((_, callback)) = self.pending.remove(&handle) else {
            return false;
        };
        callback(handle).await;
        true
    }

    /// Fire pending timers, including ones armed by earlier firings, until
    /// none are left. Returns how many fired.
    pub async fn fire_all(&self) -> usize {
        let mut fired = 0;
        while let Some(handle) = self.pending().first().copied() {
            if self.fire(handle).await {
                fired += 1;
            }
        }
        fired
    }
}

#[async_trait]
impl TimerService for RecordingTimerService {
    async fn arm(&self, delay: Duration, callback: TimerCallback) -> Result<Uuid, SchedulerError> {
        let handle = Uuid::new_v4();
        self.pending.insert(handle, callback);
        lock(&self.order).push(handle);
        lock(&self.delays).push(delay);
        self.arms.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn disarm(&self, scheduled_id: Uuid) -> bool {
        let removed = self.pending.remove(&scheduled_id).is_some();
        if removed {
            self.disarms.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }
}

/// One scripted execution outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Succeed,
    /// Executor returns a failure response
    Fail(String),
    /// Executor returns an error
    Error(String),
    /// Sleep, then succeed
    Sleep(Duration),
}

/// Executor that accepts every recipient and plays back scripted outcomes.
///
/// Once the script is exhausted the fallback outcome (success by default)
/// is used.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: Mutex<ScriptedOutcome>,
    executed: Mutex<Vec<String>>,
    executions: AtomicUsize,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(ScriptedOutcome::Succeed),
            executed: Mutex::new(Vec::new()),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, outcome: ScriptedOutcome) {
        lock(&self.script).push_back(outcome);
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(ScriptedOutcome::Fail(message.into()));
    }

    pub fn push_sleep(&self, duration: Duration) {
        self.push(ScriptedOutcome::Sleep(duration));
    }

    /// Fail every execution once the script runs out.
    pub fn always_fail(&self, message: impl Into<String>) {
        *lock(&self.fallback) = ScriptedOutcome::Fail(message.into());
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Ids of executed jobs, in execution order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        let scripted = lock(&self.script).pop_front();
        scripted.unwrap_or_else(|| lock(&self.fallback).clone())
    }
}

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn accepts(&self, _recipient: &Recipient) -> bool {
        true
    }

    async fn execute(&self, job: &JobDetails) -> Result<JobExecutionResponse, ExecutionError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        lock(&self.executed).push(job.id.clone());

        match self.next_outcome() {
            ScriptedOutcome::Succeed => Ok(JobExecutionResponse::success(&job.id)),
            ScriptedOutcome::Fail(message) => Ok(JobExecutionResponse::failure(&job.id, message)),
            ScriptedOutcome::Error(message) => Err(ExecutionError::Failed(message)),
            ScriptedOutcome::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(JobExecutionResponse::success(&job.id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::FutureExt;
    use std::sync::Arc;
    use timer_types::Trigger;

    #[tokio::test]
    async fn test_recording_timer_fires_on_demand() {
        let timer = RecordingTimerService::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let callback: TimerCallback = {
            let fired = fired.clone();
            Arc::new(move |_| {
                let fired = fired.clone();
                async move {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };

        let a = timer.arm(Duration::from_secs(1), callback.clone()).await.unwrap();
        let b = timer.arm(Duration::from_secs(2), callback).await.unwrap();
        assert_eq!(timer.pending(), vec![a, b]);
        assert!(timer.disarm(a).await);
        assert!(!timer.fire(a).await);
        assert!(timer.fire(b).await);

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.arm_count(), 2);
        assert_eq!(timer.disarm_count(), 1);
        assert_eq!(timer.delays(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn test_scripted_executor_plays_back_outcomes() {
        let executor = ScriptedExecutor::new();
        executor.push_failure("nope");
        executor.push(ScriptedOutcome::Error("boom".to_string()));

        let job = JobDetails::builder()
            .id("job")
            .recipient(Recipient::http("http://localhost/callback"))
            .trigger(Trigger::point_in_time(Utc::now()))
            .build()
            .unwrap();

        assert!(!executor.execute(&job).await.unwrap().succeeded());
        assert!(executor.execute(&job).await.is_err());
        assert!(executor.execute(&job).await.unwrap().succeeded());

        executor.always_fail("down");
        assert!(!executor.execute(&job).await.unwrap().succeeded());
        assert_eq!(executor.execution_count(), 4);
        assert_eq!(executor.executed().len(), 4);
    }
}
