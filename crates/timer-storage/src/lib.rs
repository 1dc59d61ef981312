//! Storage layer for the job timer service.
//!
//! Provides:
//! - The [`JobRepository`] contract the scheduler depends on
//! - [`InMemoryJobRepository`], a concurrent map-backed implementation used
//!   by tests and the dry-run daemon
//!
//! Durable backends implement [`JobRepository`] outside this workspace.

pub mod error;
pub mod memory;
pub mod repository;

pub use error::StorageError;
pub use memory::InMemoryJobRepository;
pub use repository::{JobRepository, JobStream};
