#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Core data model for the periodic job runner.
//!
//! This crate has no notion of a scheduling loop or a coordinator — it only
//! defines the immutable job descriptor, the duration-parsing helpers, the
//! run-environment contract handed to a job invocation, and the process-wide
//! stop signal those pieces share.

mod duration;
mod environment;
mod error;
mod job;
mod stop_signal;

pub use duration::{duration_or_default, parse_duration, DurationInput};
pub use environment::{environment, JobError, RunEnv, TrackerEnv};
pub use error::ConfigError;
pub use job::{JobFn, RegisteredJob};
pub use stop_signal::StopSignal;
