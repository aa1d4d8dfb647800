use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::stop_signal::StopSignal;

/// An error returned by a job invocation.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// `RunEnv::sleep` was interrupted by the stop signal firing before the
    /// requested duration elapsed. A job that does nothing but sleep can
    /// propagate this with `?` to exit promptly without checking
    /// `is_stopping` after every wait.
    #[error("sleep interrupted by shutdown")]
    Interrupted,

    /// Any other job failure. Only escalated to a fatal, runner-terminating
    /// error if the job called `request_fatal_errors()` before returning it.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

struct SharedState {
    stop: StopSignal,
    rerun: AtomicBool,
    stop_requested: AtomicBool,
    fatal_requested: AtomicBool,
}

/// The job-facing half of the run environment, passed into a job invocation.
#[derive(Clone)]
pub struct RunEnv {
    state: Arc<SharedState>,
}

/// The runner-facing half of the run environment, read by the job runner
/// after the invocation returns. Backed by the same shared state as the
/// `RunEnv` handed to the job, but exposes only read-only accessors.
#[derive(Clone)]
pub struct TrackerEnv {
    state: Arc<SharedState>,
}

/// Build a fresh `(RunEnv, TrackerEnv)` pair bound to `stop`, for a single
/// job invocation.
pub fn environment(stop: StopSignal) -> (RunEnv, TrackerEnv) {
    let state = Arc::new(SharedState {
        stop,
        rerun: AtomicBool::new(false),
        stop_requested: AtomicBool::new(false),
        fatal_requested: AtomicBool::new(false),
    });

    (
        RunEnv {
            state: state.clone(),
        },
        TrackerEnv { state },
    )
}

impl RunEnv {
    /// Cooperatively wait up to `duration`.
    ///
    /// If the process-wide stop signal fires before `duration` elapses, this
    /// returns `Err(JobError::Interrupted)` instead of waiting out the full
    /// duration, so a job built entirely out of sleeps still reacts to
    /// shutdown promptly.
    pub async fn sleep(&self, duration: Duration) -> Result<(), JobError> {
        if self.state.stop.wait_timeout(duration).await {
            Err(JobError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Non-blocking check of the process-wide stop signal.
    pub fn is_stopping(&self) -> bool {
        self.state.stop.is_set()
    }

    /// Ask the runner to re-invoke this job immediately (no scheduling
    /// delay) once this invocation returns.
    pub fn request_rerun(&self) {
        self.state.rerun.store(true, Ordering::SeqCst);
    }

    /// Ask the coordinator to begin a graceful shutdown once this invocation
    /// returns.
    pub fn request_stop(&self) {
        self.state.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Mark any error this invocation subsequently returns as fatal: it will
    /// escalate out of the job runner and set the coordinator's exit-code
    /// latch, instead of being logged and absorbed.
    pub fn request_fatal_errors(&self) {
        self.state.fatal_requested.store(true, Ordering::SeqCst);
    }
}

impl TrackerEnv {
    /// Whether the job called [`RunEnv::request_rerun`].
    pub fn requested_rerun(&self) -> bool {
        self.state.rerun.load(Ordering::SeqCst)
    }

    /// Whether the job called [`RunEnv::request_stop`].
    pub fn requested_stop(&self) -> bool {
        self.state.stop_requested.load(Ordering::SeqCst)
    }

    /// Whether the job called [`RunEnv::request_fatal_errors`].
    pub fn requested_fatal_errors(&self) -> bool {
        self.state.fatal_requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_normally_without_stop() {
        let stop = StopSignal::new();
        let (run_env, _tracker) = environment(stop);
        run_env.sleep(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_interrupted_by_stop() {
        let stop = StopSignal::new();
        let (run_env, _tracker) = environment(stop.clone());

        let waiter = tokio::spawn(async move { run_env.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        stop.set();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, JobError::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn flags_flow_from_run_env_to_tracker_env() {
        let stop = StopSignal::new();
        let (run_env, tracker) = environment(stop);

        assert!(!tracker.requested_rerun());
        assert!(!tracker.requested_stop());
        assert!(!tracker.requested_fatal_errors());

        run_env.request_rerun();
        run_env.request_stop();
        run_env.request_fatal_errors();

        assert!(tracker.requested_rerun());
        assert!(tracker.requested_stop());
        assert!(tracker.requested_fatal_errors());
    }

    #[tokio::test(start_paused = true)]
    async fn is_stopping_reflects_global_signal() {
        let stop = StopSignal::new();
        let (run_env, _tracker) = environment(stop.clone());
        assert!(!run_env.is_stopping());
        stop.set();
        assert!(run_env.is_stopping());
    }
}
