use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::environment::{JobError, RunEnv};
use crate::error::ConfigError;

/// A job's callable, boxed and type-erased so a coordinator can hold a
/// homogeneous `Vec<RegisteredJob>` regardless of each job's concrete future
/// type.
pub type JobFn =
    Arc<dyn Fn(RunEnv) -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>> + Send + Sync>;

/// An immutable, validated job descriptor.
///
/// Built once at configuration time (see [`RegisteredJob::new`]) and shared
/// read-only afterward — every job runner holds an `Arc<RegisteredJob>`.
#[derive(Clone)]
pub struct RegisteredJob {
    name: String,
    interval: Duration,
    variance: Duration,
    timeout: Option<Duration>,
    callable: JobFn,
}

impl std::fmt::Debug for RegisteredJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredJob")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("variance", &self.variance)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RegisteredJob {
    /// Build a new job descriptor.
    ///
    /// `name` should follow the `module.function` registration contract (at
    /// least one `.`); this is checked here. Cross-job invariants — name
    /// uniqueness within a set — are the coordinator's job, since a single
    /// `RegisteredJob` has no visibility into its siblings.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        interval: Duration,
        variance: Duration,
        timeout: Option<Duration>,
        callable: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(RunEnv) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let name = name.into();

        if !name.contains('.') {
            return Err(ConfigError::MalformedName { name });
        }

        if matches!(timeout, Some(d) if d.is_zero()) {
            return Err(ConfigError::ZeroTimeout { name });
        }

        Ok(Self {
            name,
            interval,
            variance,
            timeout,
            callable: Arc::new(move |env| Box::pin(callable(env))),
        })
    }

    /// The job's fully-qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Minimum wall-clock gap between the start of consecutive invocations.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Additional random delay, sampled uniformly from `[0, variance]`, added
    /// to `interval` on every scheduling decision.
    pub fn variance(&self) -> Duration {
        self.variance
    }

    /// Per-invocation deadline, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Invoke the job's callable with the given run environment.
    pub fn call(&self, env: RunEnv) -> Pin<Box<dyn Future<Output = Result<(), JobError>> + Send>> {
        (self.callable)(env)
    }
}
