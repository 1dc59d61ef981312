//! # timer-scheduler
//!
//! Durable, at-least-once timer job scheduling.
//!
//! Jobs are persisted through a [`timer_storage::JobRepository`]. Only jobs
//! firing within the configured chunk are held as in-process timers; the
//! [`JobSchedulerManager`] periodically scans storage to arm the rest as
//! they come due and to recover jobs after a restart.
//!
//! ## Components
//!
//! - [`TimerJobScheduler`]: schedule, fire and cancel with per-job locking
//! - [`JobSchedulerManager`]: periodic recovery scan
//! - [`JobService`]: create/get/patch/cancel facade
//! - [`TimerService`]: timer primitive seam, with [`TokioTimerService`] and
//!   [`CronTimerService`] implementations
//! - [`JobExecutor`]: delivery seam, resolved per recipient kind
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use timer_scheduler::{JobExecutorResolver, JobSchedulerManager, TimerJobScheduler, TokioTimerService};
//! use timer_storage::InMemoryJobRepository;
//! use timer_types::SchedulerConfig;
//!
//! let scheduler = TimerJobScheduler::new(
//!     Arc::new(InMemoryJobRepository::new()),
//!     Arc::new(TokioTimerService::new()),
//!     JobExecutorResolver::new().with_executor(my_executor),
//!     SchedulerConfig::default(),
//! )?;
//! let manager = JobSchedulerManager::new(scheduler.clone());
//! manager.start()?;
//! scheduler.schedule(job).await?;
//! ```

pub mod armed;
pub mod cron;
pub mod error;
pub mod executor;
pub mod manager;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod testing;
pub mod timer;

pub use armed::{ArmedJob, ArmedJobs};
pub use cron::CronTimerService;
pub use error::{ExecutionError, SchedulerError};
pub use executor::{JobExecutor, JobExecutorResolver};
pub use manager::{JobSchedulerManager, ScanReport};
pub use retry::retry_delay;
pub use scheduler::{is_expired, Recovery, TimerJobScheduler};
pub use service::JobService;
pub use testing::{RecordingTimerService, ScriptedExecutor, ScriptedOutcome};
pub use timer::{TimerCallback, TimerService, TokioTimerService};
