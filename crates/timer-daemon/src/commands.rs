//! Command implementations for the timer daemon.
//!
//! Handles:
//! - run: Load config and jobs, schedule them, fire with the dry-run executor
//! - preview: Print upcoming fire instants per job
//! - config: Print the effective configuration

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use tokio::signal;
use tracing::{info, warn};

use timer_scheduler::{
    CronTimerService, JobExecutorResolver, JobSchedulerManager, JobService, TimerJobScheduler,
    TimerService, TokioTimerService,
};
use timer_storage::{InMemoryJobRepository, JobRepository};
use timer_types::{JobDetails, Settings, TimerBackend};

use crate::dry_run::DryRunExecutor;

/// Load layered settings and apply CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level_override: Option<&str>) -> Result<Settings> {
    let settings = Settings::load(config_path).context("Failed to load configuration")?;
    Ok(apply_cli_overrides(settings, log_level_override))
}

/// CLI flags take precedence over every other source.
fn apply_cli_overrides(mut settings: Settings, log_level_override: Option<&str>) -> Settings {
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    settings
}

fn init_tracing(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Read a JSON array of job definitions.
pub fn load_jobs(path: &Path) -> Result<Vec<JobDetails>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read jobs file {}", path.display()))?;
    let jobs: Vec<JobDetails> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse jobs file {}", path.display()))?;
    Ok(jobs)
}

/// Format up to `count` upcoming fire instants for each job.
pub fn render_preview(jobs: &[JobDetails], count: usize) -> String {
    let mut out = String::new();
    for job in jobs {
        let _ = writeln!(out, "{} ({})", job.id, job.trigger.kind());
        let instants = job.trigger.preview(count);
        if instants.is_empty() {
            let _ = writeln!(out, "  no remaining fire time");
        }
        for instant in instants {
            let _ = writeln!(out, "  {}", instant.to_rfc3339());
        }
    }
    out
}

/// Print upcoming fire instants for every job in `jobs_path`.
pub fn preview_jobs(jobs_path: &Path, count: usize) -> Result<()> {
    let jobs = load_jobs(jobs_path)?;
    print!("{}", render_preview(&jobs, count));
    Ok(())
}

/// Print the effective merged settings as JSON.
pub fn show_config(config_path: Option<&str>, log_level_override: Option<&str>) -> Result<()> {
    let settings = load_settings(config_path, log_level_override)?;
    let json = serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
    println!("{}", json);
    Ok(())
}

/// Outcome of a dry run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Jobs accepted by the scheduler
    pub submitted: usize,
    /// Jobs rejected at submission (expired, finalized, invalid)
    pub rejected: usize,
    /// Firings handled by the dry-run executor
    pub fired: u64,
    /// Final job count per status
    pub by_status: BTreeMap<String, usize>,
}

/// Run the scheduler over the jobs in `jobs_path` until Ctrl+C/SIGTERM,
/// or until no job is active when `exit_when_idle` is set.
pub async fn run_jobs(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    jobs_path: &Path,
    force_expired: bool,
    exit_when_idle: bool,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level_override)?;
    if force_expired {
        settings.scheduler.force_execute_expired_jobs = true;
    }

    init_tracing(&settings.log_level)?;

    info!("Timer daemon starting...");
    info!("Configuration:");
    info!("  Timer backend: {:?}", settings.timer_backend);
    info!(
        "  Chunk: {} min, load interval: {} min",
        settings.scheduler.scheduler_chunk_in_minutes, settings.scheduler.load_job_interval_in_minutes
    );
    info!("  Log level: {}", settings.log_level);

    let jobs = load_jobs(jobs_path)?;
    info!("Loaded {} job(s) from {:?}", jobs.len(), jobs_path);

    let summary = run_with_settings(&settings, jobs, exit_when_idle, shutdown_signal()).await?;

    info!(
        submitted = summary.submitted,
        rejected = summary.rejected,
        fired = summary.fired,
        "Timer daemon stopped"
    );
    for (status, count) in &summary.by_status {
        info!("  {}: {}", status, count);
    }
    Ok(())
}

/// Run the scheduler over `jobs` with an in-memory repository and the
/// dry-run executor until `shutdown` resolves (or, with `exit_when_idle`,
/// until no job is active).
pub async fn run_with_settings<F>(
    settings: &Settings,
    jobs: Vec<JobDetails>,
    exit_when_idle: bool,
    shutdown: F,
) -> Result<RunSummary>
where
    F: Future<Output = ()>,
{
    let repository = Arc::new(InMemoryJobRepository::new());
    let executor = Arc::new(DryRunExecutor::new());
    let timer = BackendTimer::build(settings.timer_backend).await?;

    let scheduler = TimerJobScheduler::new(
        repository.clone(),
        timer.service(),
        JobExecutorResolver::new().with_executor(executor.clone()),
        settings.scheduler.clone(),
    )
    .context("Failed to create scheduler")?;
    let service = JobService::new(scheduler.clone());

    let mut summary = RunSummary::default();
    for job in jobs {
        let job_id = job.id.clone();
        match service.create(job).await {
            Ok(saved) => {
                summary.submitted += 1;
                info!(
                    job_id = %job_id,
                    armed = saved.scheduled_id.is_some(),
                    "Job submitted"
                );
            }
            Err(e) => {
                summary.rejected += 1;
                warn!(job_id = %job_id, error = %e, "Job rejected");
            }
        }
    }

    let manager = JobSchedulerManager::new(scheduler);
    manager.start().context("Failed to start recovery loop")?;

    tokio::select! {
        _ = shutdown => {
            info!("Shutdown requested");
        }
        _ = wait_until_idle(&repository), if exit_when_idle => {
            info!("No active jobs left");
        }
    }

    let grace = Duration::from_secs(settings.shutdown_timeout_secs);
    match tokio::time::timeout(grace, manager.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Error stopping recovery loop: {}", e),
        Err(_) => warn!("Recovery loop did not stop within {:?}", grace),
    }
    timer.shutdown().await;

    summary.fired = executor.fired();
    let stored: Vec<JobDetails> = repository
        .find_all()
        .try_collect()
        .await
        .context("Failed to read final job states")?;
    for job in stored {
        *summary.by_status.entry(job.status.to_string()).or_default() += 1;
    }
    Ok(summary)
}

async fn wait_until_idle(repository: &InMemoryJobRepository) {
    loop {
        let active = repository
            .find_all()
            .try_filter(|job| futures::future::ready(job.status.is_active()))
            .try_collect::<Vec<_>>()
            .await;
        match active {
            Ok(active) if active.is_empty() => return,
            Ok(_) => {}
            Err(e) => warn!("Failed to poll job states: {}", e),
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

enum BackendTimer {
    Tokio(Arc<TokioTimerService>),
    Cron(Arc<CronTimerService>),
}

impl BackendTimer {
    async fn build(backend: TimerBackend) -> Result<Self> {
        match backend {
            TimerBackend::Tokio => Ok(BackendTimer::Tokio(Arc::new(TokioTimerService::new()))),
            TimerBackend::Cron => {
                let cron = CronTimerService::new()
                    .await
                    .context("Failed to create cron timer service")?;
                cron.start().await.context("Failed to start cron timer service")?;
                Ok(BackendTimer::Cron(Arc::new(cron)))
            }
        }
    }

    fn service(&self) -> Arc<dyn TimerService> {
        match self {
            BackendTimer::Tokio(timer) => timer.clone(),
            BackendTimer::Cron(timer) => timer.clone(),
        }
    }

    async fn shutdown(&self) {
        match self {
            BackendTimer::Tokio(timer) => timer.shutdown(),
            BackendTimer::Cron(timer) => {
                if let Err(e) = timer.shutdown().await {
                    warn!("Error during cron timer shutdown: {}", e);
                }
            }
        }
    }
}
