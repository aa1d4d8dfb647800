//! Job-set resolution, validation, and the top-level run lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};
use tracing::{error, info};

use runner_core::{ConfigError, RegisteredJob, StopSignal};

use crate::api::{CoordinatorEvent, CoordinatorHandle, CoordinatorOptions};
use crate::job_runner::{run_job_runner, Housekeeping};
use crate::timeout_tracker::TimeoutTracker;

/// Shared fatal-exit-code latch, handed to every runner and to the overall
/// `stop_after` timeout callback.
///
/// Setting it also sets the stop signal: a fatal condition anywhere always
/// begins a shutdown, it doesn't just flip the eventual exit code.
#[derive(Clone)]
pub struct FatalNotifier {
    fatal: Arc<AtomicBool>,
    stop: StopSignal,
}

impl FatalNotifier {
    fn new(stop: StopSignal) -> Self {
        Self {
            fatal: Arc::new(AtomicBool::new(false)),
            stop,
        }
    }

    /// Latch the fatal flag and begin a stop.
    pub fn notify(&self) {
        self.fatal.store(true, Ordering::SeqCst);
        self.stop.set();
    }

    /// Whether the fatal flag has been latched.
    pub fn is_set(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }
}

/// Keep jobs named in `include`, or drop jobs named in `exclude` — the two
/// are mutually exclusive at the CLI layer, so at most one of them is
/// non-empty here.
pub fn resolve_job_set(
    jobs: Vec<RegisteredJob>,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<RegisteredJob>, ConfigError> {
    let resolved = if !include.is_empty() {
        let include: HashSet<&str> = include.iter().map(String::as_str).collect();
        let names: HashSet<&str> = jobs.iter().map(RegisteredJob::name).collect();
        for wanted in &include {
            if !names.contains(wanted) {
                return Err(ConfigError::UnknownIncludedJob {
                    name: (*wanted).to_string(),
                });
            }
        }
        jobs.into_iter()
            .filter(|j| include.contains(j.name()))
            .collect()
    } else if !exclude.is_empty() {
        let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();
        jobs.into_iter()
            .filter(|j| !exclude.contains(j.name()))
            .collect()
    } else {
        jobs
    };

    if resolved.is_empty() {
        return Err(ConfigError::NoJobs);
    }

    Ok(resolved)
}

/// Validate every cross-job invariant, collecting every violation rather
/// than stopping at the first.
pub fn validate_jobs(jobs: &[RegisteredJob]) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for job in jobs {
        if !job.name().contains('.') {
            errors.push(ConfigError::MalformedName {
                name: job.name().to_string(),
            });
        }
        if matches!(job.timeout(), Some(d) if d.is_zero()) {
            errors.push(ConfigError::ZeroTimeout {
                name: job.name().to_string(),
            });
        }
        if !seen.insert(job.name()) {
            errors.push(ConfigError::DuplicateName {
                name: job.name().to_string(),
            });
        }
    }

    errors
}

/// Resolve, validate, and start a coordinator for `jobs`.
///
/// Returns a [`CoordinatorHandle`] once the job set is valid; for a
/// `trial_run`, the returned handle's lifecycle task completes immediately
/// with exit code 0 without installing signal handlers or starting any
/// runner.
pub fn start(
    jobs: Vec<RegisteredJob>,
    include: &[String],
    exclude: &[String],
    options: CoordinatorOptions,
) -> Result<CoordinatorHandle, Vec<ConfigError>> {
    let jobs = resolve_job_set(jobs, include, exclude).map_err(|e| vec![e])?;

    let violations = validate_jobs(&jobs);
    if !violations.is_empty() {
        return Err(violations);
    }

    let (events_tx, _rx) = broadcast::channel(256);
    let stop = StopSignal::new();

    // Subscribe before spawning the lifecycle task: the task may start
    // sending events on another runtime thread immediately, before the
    // caller of `start` ever gets around to calling `subscribe`.
    let initial_rx = std::sync::Mutex::new(Some(events_tx.subscribe()));

    if options.trial_run {
        let events_tx_clone = events_tx.clone();
        let join = tokio::spawn(async move {
            let _ = events_tx_clone.send(CoordinatorEvent::Started);
            let _ = events_tx_clone.send(CoordinatorEvent::Stopped);
            0
        });
        return Ok(CoordinatorHandle {
            events_tx,
            initial_rx,
            stop,
            join,
        });
    }

    let events_for_lifecycle = events_tx.clone();
    let stop_for_lifecycle = stop.clone();
    let join = tokio::spawn(async move {
        run_lifecycle(jobs, options, stop_for_lifecycle, events_for_lifecycle).await
    });

    Ok(CoordinatorHandle {
        events_tx,
        initial_rx,
        stop,
        join,
    })
}

async fn run_lifecycle(
    jobs: Vec<RegisteredJob>,
    options: CoordinatorOptions,
    stop: StopSignal,
    events: broadcast::Sender<CoordinatorEvent>,
) -> i32 {
    install_signal_handlers(stop.clone());

    let tracker = TimeoutTracker::new(stop.clone(), events.clone());
    let tracker_handle = tracker.clone().spawn();

    let fatal = FatalNotifier::new(stop.clone());

    let mut runners: JoinSet<()> = JoinSet::new();
    let mut names_by_task: HashMap<tokio::task::Id, String> = HashMap::new();
    let mut job_count = 0usize;
    for job in jobs {
        let job = Arc::new(job);
        let name = job.name().to_string();
        let stop = stop.clone();
        let tracker = tracker.clone();
        let events = events.clone();
        let fatal = fatal.clone();
        let housekeeping: Option<Housekeeping> = None;
        let handle = runners.spawn(async move {
            run_job_runner(job, stop, tracker, events, fatal, housekeeping).await
        });
        names_by_task.insert(handle.id(), name);
        job_count += 1;
    }

    if let Some(stop_after) = options.stop_after {
        let jittered = stop_after + uniform(options.stop_variance);
        let stop_clone = stop.clone();
        tracker.add_timeout(jittered, "coordinator.stop_after", move || {
            stop_clone.set();
        });
    }

    let _ = events.send(CoordinatorEvent::Started);
    info!(jobs = job_count, "coordinator started");

    stop.wait().await;
    let _ = events.send(CoordinatorEvent::StopRequested);
    info!("stop requested, beginning graceful shutdown");

    let shutdown_started = Instant::now();

    while !runners.is_empty() {
        let budget = options
            .stop_timeout
            .saturating_sub(shutdown_started.elapsed());

        match tokio::time::timeout(budget, runners.join_next_with_id()).await {
            Ok(Some(Ok((id, ())))) => {
                names_by_task.remove(&id);
            }
            Ok(Some(Err(join_err))) => {
                let name = names_by_task.remove(&join_err.id());
                error!(job = name.as_deref().unwrap_or("?"), error = %join_err, "job runner panicked");
                let _ = events.send(CoordinatorEvent::RunnerPanicked {
                    job: name.unwrap_or_else(|| "?".to_string()),
                    error: join_err.to_string(),
                });
                fatal.notify();
            }
            Ok(None) => break,
            Err(_) => {
                let still_alive: Vec<String> = names_by_task.into_values().collect();
                error!(?still_alive, "shutdown timed out with runners still alive");
                let _ = events.send(CoordinatorEvent::ShutdownTimedOut {
                    still_alive,
                });
                std::process::exit(1);
            }
        }
    }

    if tokio::time::timeout(Duration::from_secs(1), tracker_handle)
        .await
        .is_err()
    {
        error!("timeout tracker did not exit promptly after stop");
    }
    let _ = events.send(CoordinatorEvent::Stopped);
    info!("coordinator stopped");

    if fatal.is_set() {
        1
    } else {
        0
    }
}

fn uniform(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let nanos = max.as_nanos().min(u64::MAX as u128) as u64;
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}

#[cfg(unix)]
fn install_signal_handlers(stop: StopSignal) {
    use tokio::signal::unix::{signal, SignalKind};

    for kind in [SignalKind::interrupt(), SignalKind::terminate(), SignalKind::quit()] {
        let stop = stop.clone();
        let mut sig = match signal(kind) {
            Ok(sig) => sig,
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                continue;
            }
        };
        tokio::spawn(async move {
            while sig.recv().await.is_some() {
                stop.set();
            }
        });
    }
}

#[cfg(not(unix))]
fn install_signal_handlers(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.set();
        }
    });
}
