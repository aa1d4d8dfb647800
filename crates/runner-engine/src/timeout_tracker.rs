//! Centralized per-invocation timeout watcher.
//!
//! One [`TimeoutTracker`] task serves every job runner in the process: each
//! runner registers a deadline before invoking its job and cancels it after
//! the invocation returns, instead of each runner racing its own
//! `tokio::time::timeout` against the job future. Centralizing the wait
//! means the watcher never has to poll user code — it only ever wakes on
//! its own `Notify` or on the next deadline.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::warn;

use runner_core::StopSignal;

use crate::api::CoordinatorEvent;

type TimeoutCallback = Arc<dyn Fn() + Send + Sync>;

struct Entry {
    deadline: Instant,
    label: String,
    callback: TimeoutCallback,
}

/// A single actor task watching every armed per-invocation deadline.
pub struct TimeoutTracker {
    entries: Mutex<BTreeMap<u64, Entry>>,
    next_key: AtomicU64,
    wake: Notify,
    stop: StopSignal,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl TimeoutTracker {
    /// Build a new tracker bound to the process-wide stop signal and event
    /// bus. Call [`TimeoutTracker::spawn`] to start its watch loop.
    pub fn new(stop: StopSignal, events: broadcast::Sender<CoordinatorEvent>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(BTreeMap::new()),
            next_key: AtomicU64::new(0),
            wake: Notify::new(),
            stop,
            events,
        })
    }

    /// Arm a deadline `duration` from now. `callback` runs synchronously on
    /// the tracker's own task when the deadline fires, so it must be cheap
    /// and non-blocking — typically just flipping an `AtomicBool` the
    /// runner polls after its job future resolves.
    pub fn add_timeout(
        self: &Arc<Self>,
        duration: Duration,
        label: impl Into<String>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> TimeoutCancel {
        let deadline = Instant::now() + duration;
        let key = self.next_key.fetch_add(1, Ordering::SeqCst);

        self.entries.lock().unwrap().insert(
            key,
            Entry {
                deadline,
                label: label.into(),
                callback: Arc::new(callback),
            },
        );
        self.wake.notify_one();

        TimeoutCancel {
            key,
            tracker: self.clone(),
        }
    }

    /// Spawn the tracker's watch loop onto the current runtime.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self: Arc<Self>) {
        loop {
            self.fire_due();

            if self.stop.is_set() {
                return;
            }

            let delay = self.next_delay();
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = sleep_until_or_pending(delay) => {}
                _ = self.stop.wait() => {}
            }
        }
    }

    /// Fire and remove every entry whose deadline has already passed, in
    /// deadline order (ties broken by registration order).
    fn fire_due(&self) {
        let now = Instant::now();
        let mut due: Vec<(u64, Entry)> = {
            let mut entries = self.entries.lock().unwrap();
            let due_keys: Vec<u64> = entries
                .iter()
                .filter(|(_, e)| e.deadline <= now)
                .map(|(k, _)| *k)
                .collect();
            due_keys
                .into_iter()
                .map(|k| (k, entries.remove(&k).unwrap()))
                .collect()
        };

        due.sort_by(|(key_a, a), (key_b, b)| a.deadline.cmp(&b.deadline).then(key_a.cmp(key_b)));

        for (_, entry) in due {
            (entry.callback)();
        }
    }

    /// Delay until the next deadline, if any entries remain armed.
    fn next_delay(&self) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .map(|e| e.deadline.saturating_duration_since(now))
            .min()
    }
}

async fn sleep_until_or_pending(delay: Option<Duration>) {
    match delay {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// A handle to an armed timeout, returned by [`TimeoutTracker::add_timeout`].
///
/// Cancelling after the deadline has already fired is a normal race (the job
/// finished just as the watcher was firing it) and is not an error: it is
/// logged and reported as [`CoordinatorEvent::TimeoutCancelledLate`] so
/// operators can see invocations running close to their budget.
pub struct TimeoutCancel {
    key: u64,
    tracker: Arc<TimeoutTracker>,
}

impl TimeoutCancel {
    /// Disarm this timeout. A no-op, other than logging, if it already
    /// fired.
    pub fn cancel(&self) {
        let removed = self.tracker.entries.lock().unwrap().remove(&self.key);
        match removed {
            Some(_) => {}
            None => {
                warn!(key = self.key, "timeout cancelled after it already fired");
                let _ = self
                    .tracker
                    .events
                    .send(CoordinatorEvent::TimeoutCancelledLate {
                        label: format!("#{}", self.key),
                    });
            }
        }
    }
}
