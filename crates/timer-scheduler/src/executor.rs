//! Executor seam: performs the side effect of a firing.
//!
//! Executors declare which recipient kinds they accept, so a new delivery
//! kind is added by registering an executor with the resolver. The
//! scheduler itself never matches on recipient kinds.

use std::sync::Arc;

use async_trait::async_trait;

use timer_types::{JobDetails, JobExecutionResponse, Recipient};

use crate::error::ExecutionError;

/// Delivers a fired job to its recipient.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this executor can deliver to `recipient`.
    fn accepts(&self, recipient: &Recipient) -> bool;

    /// Deliver `job`. A failure response and an `Err` are both treated as a
    /// failed firing.
    async fn execute(&self, job: &JobDetails) -> Result<JobExecutionResponse, ExecutionError>;
}

/// Picks the executor for a recipient. First match wins.
#[derive(Clone, Default)]
pub struct JobExecutorResolver {
    executors: Vec<Arc<dyn JobExecutor>>,
}

impl JobExecutorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an executor, builder style.
    pub fn with_executor(mut self, executor: Arc<dyn JobExecutor>) -> Self {
        self.register(executor);
        self
    }

    /// Add an executor.
    pub fn register(&mut self, executor: Arc<dyn JobExecutor>) {
        self.executors.push(executor);
    }

    /// Find the executor for `recipient`.
    pub fn resolve(&self, recipient: &Recipient) -> Option<Arc<dyn JobExecutor>> {
        self.executors
            .iter()
            .find(|executor| executor.accepts(recipient))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for JobExecutorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.executors.iter().map(|e| e.name()).collect();
        f.debug_struct("JobExecutorResolver")
            .field("executors", &names)
            .finish()
    }
}
