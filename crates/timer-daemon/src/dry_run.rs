//! Executor that logs each firing instead of delivering it.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use timer_scheduler::{ExecutionError, JobExecutor};
use timer_types::{JobDetails, JobExecutionResponse, Recipient};

/// Accepts every recipient and reports success.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    fired: AtomicU64,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Firings handled so far.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobExecutor for DryRunExecutor {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn accepts(&self, recipient: &Recipient) -> bool {
        match recipient {
            Recipient::Http(_) => true,
        }
    }

    async fn execute(&self, job: &JobDetails) -> Result<JobExecutionResponse, ExecutionError> {
        let firing = self.fired.fetch_add(1, Ordering::SeqCst) + 1;
        match &job.recipient {
            Recipient::Http(http) => info!(
                job_id = %job.id,
                correlation_id = ?job.correlation_id,
                method = %http.method,
                url = %http.url,
                execution = job.execution_counter + 1,
                firing,
                "Dry-run firing"
            ),
        }
        Ok(JobExecutionResponse::success(&job.id).with_message("dry run"))
    }
}
