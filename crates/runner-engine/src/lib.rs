#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Coordinator, job runner, and timeout tracker for the periodic job runner.
//!
//! This crate owns every piece with a scheduling loop: the timeout watcher,
//! the per-job runner, and the coordinator that resolves/validates the job
//! set and drives the whole process lifecycle. `runner-core` supplies the
//! data model this crate operates on.

/// Public API for the engine crate.
pub mod api;

mod coordinator;
mod job_runner;
mod timeout_tracker;

pub use api::{CoordinatorEvent, CoordinatorHandle, CoordinatorOptions};
pub use coordinator::{resolve_job_set, start, validate_jobs, FatalNotifier};
pub use job_runner::Housekeeping;
pub use timeout_tracker::{TimeoutCancel, TimeoutTracker};
