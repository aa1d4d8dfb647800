//! Per-job execution loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use runner_core::{environment, JobError, RegisteredJob, StopSignal};

use crate::api::CoordinatorEvent;
use crate::coordinator::FatalNotifier;
use crate::timeout_tracker::TimeoutTracker;

fn jitter(variance: Duration) -> Duration {
    if variance.is_zero() {
        return Duration::ZERO;
    }
    let nanos = variance.as_nanos().min(u64::MAX as u128) as u64;
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}

/// Outcome of a single job invocation, as the loop needs it to reschedule.
struct InvocationResult {
    requested_rerun: bool,
}

/// An opaque periodic callback scheduled alongside a job's own invocations.
///
/// Stands in for the host-framework housekeeping a real embedding
/// application might need (closing idle database connections, flushing a
/// cache) — out of scope for this workspace's job set, but part of the
/// runner's scheduling contract regardless of whether any job supplies one.
#[derive(Clone)]
pub struct Housekeeping {
    interval: Duration,
    tick: Arc<dyn Fn() + Send + Sync>,
}

impl Housekeeping {
    /// Build a housekeeping provider ticking every `interval`.
    pub fn new(interval: Duration, tick: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            interval,
            tick: Arc::new(tick),
        }
    }
}

/// Drive `job` on its own cadence until the stop signal fires or the job
/// escalates a fatal error.
///
/// Runs entirely on the calling task — the coordinator spawns one of these
/// per registered job. `housekeeping`, if present, fires lazily alongside
/// the job's own invocations (see the Job runner component design).
pub async fn run_job_runner(
    job: Arc<RegisteredJob>,
    stop: StopSignal,
    tracker: Arc<TimeoutTracker>,
    events: broadcast::Sender<CoordinatorEvent>,
    fatal: FatalNotifier,
    housekeeping: Option<Housekeeping>,
) {
    let mut next_run = Instant::now() + jitter(job.variance());
    let mut next_housekeeping: Option<Instant> = None;

    loop {
        let next_event = match next_housekeeping {
            Some(h) => next_run.min(h),
            None => next_run,
        };
        let delay = next_event.saturating_duration_since(Instant::now());

        if stop.wait_timeout(delay).await {
            return;
        }

        let now = Instant::now();

        if now >= next_run {
            let started = Instant::now();
            let result = invoke(&job, &stop, &tracker, &events, &fatal).await;
            let execution_time = started.elapsed();

            next_run = if result.requested_rerun {
                Instant::now()
            } else {
                Instant::now()
                    + (job.interval() + jitter(job.variance())).saturating_sub(execution_time)
            };

            if next_housekeeping.is_none() {
                if let Some(hk) = &housekeeping {
                    next_housekeeping = Some(Instant::now() + hk.interval);
                }
            }

            if fatal.is_set() {
                return;
            }
        }

        if let Some(hk) = &housekeeping {
            if let Some(h) = next_housekeeping {
                if Instant::now() >= h {
                    (hk.tick)();
                    next_housekeeping = Some(Instant::now() + hk.interval);
                }
            }
        }

        if stop.is_set() {
            return;
        }
    }
}

async fn invoke(
    job: &Arc<RegisteredJob>,
    stop: &StopSignal,
    tracker: &Arc<TimeoutTracker>,
    events: &broadcast::Sender<CoordinatorEvent>,
    fatal: &FatalNotifier,
) -> InvocationResult {
    let (run_env, tracker_env) = environment(stop.clone());
    let started = Instant::now();

    let _ = events.send(CoordinatorEvent::JobStarted {
        job: job.name().to_string(),
    });

    let timeout_fired = Arc::new(AtomicBool::new(false));
    let cancel = job.timeout().map(|timeout| {
        let timeout_fired = timeout_fired.clone();
        let stop = stop.clone();
        let events = events.clone();
        let name = job.name().to_string();
        tracker.add_timeout(timeout, name.clone(), move || {
            timeout_fired.store(true, Ordering::SeqCst);
            let _ = events.send(CoordinatorEvent::JobTimedOut { job: name.clone() });
            stop.set();
        })
    });

    let outcome = job.call(run_env).await;

    if let Some(cancel) = cancel {
        cancel.cancel();
    }

    match outcome {
        Ok(()) => {
            let duration = started.elapsed();
            info!(job = job.name(), ?duration, "job succeeded");
            let _ = events.send(CoordinatorEvent::JobSucceeded {
                job: job.name().to_string(),
                duration,
            });
        }
        Err(JobError::Interrupted) => {
            info!(job = job.name(), "job interrupted by shutdown");
        }
        Err(JobError::Failed(err)) => {
            if tracker_env.requested_fatal_errors() {
                error!(job = job.name(), error = %err, "job failed fatally");
                let _ = events.send(CoordinatorEvent::JobFailedFatal {
                    job: job.name().to_string(),
                    error: format!("{err:#}"),
                });
                fatal.notify();
            } else {
                error!(job = job.name(), error = %err, "job failed");
                let _ = events.send(CoordinatorEvent::JobFailed {
                    job: job.name().to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    if timeout_fired.load(Ordering::SeqCst) {
        warn!(job = job.name(), "job timed out");
        fatal.notify();
    }

    if tracker_env.requested_rerun() {
        let _ = events.send(CoordinatorEvent::JobRerunRequested {
            job: job.name().to_string(),
        });
    }

    if tracker_env.requested_stop() {
        let _ = events.send(CoordinatorEvent::JobStopRequested {
            job: job.name().to_string(),
        });
        stop.set();
    }

    InvocationResult {
        requested_rerun: tracker_env.requested_rerun(),
    }
}
