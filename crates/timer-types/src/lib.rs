//! # timer-types
//!
//! Shared domain types for the job timer service.
//!
//! This crate defines the data exchanged between the scheduler, the
//! repository and executors:
//! - Triggers: when a job fires (point in time, interval, zoned timer)
//! - JobDetails: the persisted job record and its status machine
//! - Recipients: where a fired job is delivered
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use timer_types::{JobDetails, Recipient, Trigger};
//!
//! let job = JobDetails::builder()
//!     .id("invoice-reminder-42")
//!     .recipient(Recipient::http("http://billing/reminders"))
//!     .trigger(Trigger::point_in_time(Utc::now() + Duration::minutes(5)))
//!     .build()
//!     .unwrap();
//! assert!(job.trigger.has_next_fire_time().is_some());
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod job;
pub mod recipient;
pub mod trigger;

pub use config::{BackoffKind, RetryPolicy, SchedulerConfig, Settings, TimerBackend};
pub use error::TypesError;
pub use execution::{ExecutionCode, JobExecutionResponse};
pub use job::{JobDetails, JobDetailsBuilder, JobDetailsPatch, JobStatus};
pub use recipient::{HttpRecipient, Recipient};
pub use trigger::{IntervalTrigger, PointInTimeTrigger, SimpleTimerTrigger, TimeUnit, Trigger};
