use std::time::Duration;

use clap::Parser;

use runner_engine::CoordinatorOptions;

/// `run-jobs`: host a fixed set of periodic jobs until shutdown.
#[derive(Debug, Clone, Parser)]
#[command(name = "run-jobs", version, about = "In-process periodic job runner")]
pub struct Cli {
    /// Run only these fully-qualified job names. Mutually exclusive with
    /// `--exclude-job`.
    #[arg(long = "include-job", env = "RUN_JOBS_INCLUDE_JOB", conflicts_with = "exclude_job")]
    pub include_job: Vec<String>,

    /// Run every registered job except these.
    #[arg(long = "exclude-job", env = "RUN_JOBS_EXCLUDE_JOB")]
    pub exclude_job: Vec<String>,

    /// If positive, arm an overall-runtime stop after this many seconds.
    #[arg(long, env = "RUN_JOBS_STOP_AFTER", default_value_t = 0)]
    pub stop_after: u64,

    /// Uniform jitter, in seconds, added to `--stop-after`.
    #[arg(long, env = "RUN_JOBS_STOP_VARIANCE", default_value_t = 0)]
    pub stop_variance: u64,

    /// Graceful-shutdown budget, in seconds.
    #[arg(long, env = "RUN_JOBS_STOP_TIMEOUT", default_value_t = 5)]
    pub stop_timeout: u64,

    /// Validate the resolved job set and exit without running anything.
    #[arg(long, env = "RUN_JOBS_TRIAL_RUN", default_value_t = false)]
    pub trial_run: bool,

    /// Raise the default log filter from `info` to `debug`.
    #[arg(short = 'v', long, env = "RUN_JOBS_VERBOSE", default_value_t = false)]
    pub verbose: bool,

    /// Add a job that never yields to the running set. Hidden: exists so the
    /// coordinator's forced-exit path (per-invocation timeout fires, but the
    /// stuck task can't be joined within `--stop-timeout`) can be driven from
    /// outside the process in a test, not a flag normal users should reach
    /// for.
    #[arg(long, env = "RUN_JOBS_DEBUG_STUCK_JOB", default_value_t = false, hide = true)]
    pub debug_stuck_job: bool,
}

impl Cli {
    /// Build the coordinator options this invocation describes.
    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            stop_after: (self.stop_after > 0).then(|| Duration::from_secs(self.stop_after)),
            stop_variance: Duration::from_secs(self.stop_variance),
            stop_timeout: Duration::from_secs(self.stop_timeout),
            trial_run: self.trial_run,
        }
    }
}
