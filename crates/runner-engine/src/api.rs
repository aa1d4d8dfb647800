//! Public API types for the job-runner coordinator.

use std::time::Duration;

use runner_core::StopSignal;

/// Options controlling the coordinator's top-level lifecycle.
///
/// Built by the embedding binary (typically from parsed CLI flags) and
/// handed to [`crate::start`] alongside the job set and the include/exclude
/// name lists.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// If set, arms a single overall-runtime timeout: the coordinator
    /// requests a stop `stop_after + uniform(0, stop_variance)` after
    /// startup.
    pub stop_after: Option<Duration>,

    /// Jitter added to `stop_after`. Ignored if `stop_after` is `None`.
    pub stop_variance: Duration,

    /// Budget for the graceful-shutdown fan-in (step 9 of the coordinator
    /// lifecycle). If any runner is still alive once this elapses, the
    /// coordinator logs every still-alive job and exits the process.
    pub stop_timeout: Duration,

    /// If set, the coordinator resolves and validates the job set and then
    /// returns success without installing signal handlers or starting any
    /// runner or the timeout tracker.
    pub trial_run: bool,
}

impl CoordinatorOptions {
    /// Default graceful-shutdown budget.
    pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            stop_after: None,
            stop_variance: Duration::ZERO,
            stop_timeout: Self::DEFAULT_STOP_TIMEOUT,
            trial_run: false,
        }
    }
}

/// Lifecycle notifications emitted by a running coordinator.
///
/// This is a broadcast stream for programmatic consumers embedding the
/// coordinator as a library (a status UI, a metrics exporter); the CLI
/// binary additionally re-emits each of these as a `tracing` event, but the
/// two are independent — a library user who never touches `tracing` still
/// gets the full event stream via [`CoordinatorHandle::subscribe`].
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// The coordinator finished startup and every runner is scheduled.
    Started,
    /// A stop has been requested (signal, `stop_after`, or a job calling
    /// `request_stop`).
    StopRequested,
    /// A job invocation began.
    JobStarted {
        /// The job's name.
        job: String,
    },
    /// A job invocation returned `Ok(())`.
    JobSucceeded {
        /// The job's name.
        job: String,
        /// How long the invocation took.
        duration: Duration,
    },
    /// A job invocation returned a non-fatal error; logged and absorbed.
    JobFailed {
        /// The job's name.
        job: String,
        /// The error's rendered message.
        error: String,
    },
    /// A job invocation returned an error after calling
    /// `request_fatal_errors()`; the runner for this job has terminated and
    /// the coordinator's exit code is now fixed at 1.
    JobFailedFatal {
        /// The job's name.
        job: String,
        /// The error's rendered message.
        error: String,
    },
    /// A job's per-invocation timeout fired.
    JobTimedOut {
        /// The job's name.
        job: String,
    },
    /// A job called `request_rerun()`.
    JobRerunRequested {
        /// The job's name.
        job: String,
    },
    /// A job called `request_stop()`.
    JobStopRequested {
        /// The job's name.
        job: String,
    },
    /// A `TimeoutCancel` was dropped/invoked after its deadline already
    /// fired.
    TimeoutCancelledLate {
        /// A human-readable label for the timeout (usually a job name).
        label: String,
    },
    /// A runner's own task panicked (not a job-level failure).
    RunnerPanicked {
        /// The job's name.
        job: String,
        /// The panic, rendered.
        error: String,
    },
    /// The graceful-shutdown budget elapsed with runners still alive; the
    /// process is about to exit(1).
    ShutdownTimedOut {
        /// Names of jobs whose runner did not join in time.
        still_alive: Vec<String>,
    },
    /// Every runner and the timeout tracker have stopped.
    Stopped,
}

/// Handle to a running coordinator instance.
pub struct CoordinatorHandle {
    pub(crate) events_tx: tokio::sync::broadcast::Sender<CoordinatorEvent>,
    /// A receiver subscribed before the lifecycle task was spawned, handed
    /// out by the first call to [`CoordinatorHandle::subscribe`]. Without
    /// this, a caller that subscribes only after `start` returns can lose a
    /// race against the already-running lifecycle task's first events (a
    /// `broadcast::Receiver` only sees values sent after it was created).
    pub(crate) initial_rx:
        std::sync::Mutex<Option<tokio::sync::broadcast::Receiver<CoordinatorEvent>>>,
    pub(crate) stop: StopSignal,
    pub(crate) join: tokio::task::JoinHandle<i32>,
}

impl CoordinatorHandle {
    /// Subscribe to the coordinator's event stream.
    ///
    /// The first call after `start` returns the receiver that was created
    /// before the lifecycle task was spawned, so it cannot miss the
    /// coordinator's own `Started` event or any other event emitted early in
    /// startup. Later calls (additional subscribers) get a fresh receiver
    /// that only observes events sent from that point on.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoordinatorEvent> {
        if let Some(rx) = self.initial_rx.lock().unwrap().take() {
            return rx;
        }
        self.events_tx.subscribe()
    }

    /// Request a graceful shutdown, equivalent to receiving one of the
    /// handled OS signals.
    pub fn request_stop(&self) {
        self.stop.set();
    }

    /// Wait for the coordinator to finish its lifecycle, returning the
    /// process exit code it computed (0 or 1).
    ///
    /// A panic inside the coordinator's own task (not a job runner) is
    /// itself a runner-infrastructure-class failure and is reported as
    /// exit code 1.
    pub async fn wait(self) -> i32 {
        self.join.await.unwrap_or(1)
    }
}
