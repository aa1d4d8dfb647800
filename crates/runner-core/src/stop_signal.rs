use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// The process-wide stop latch.
///
/// Every component — the coordinator, every job runner, and the timeout
/// tracker — holds a clone of the same `StopSignal`. Setting it is
/// irreversible: once stop has been requested, `is_set` never goes back to
/// `false`.
///
/// Backed by [`CancellationToken`], which already provides the "set once,
/// broadcast-wait, non-blocking is-set check" semantics this needs.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    /// Create a fresh, unset stop signal.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request a stop. Idempotent.
    pub fn set(&self) {
        self.token.cancel();
    }

    /// Non-blocking check for whether stop has been requested.
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait, with no bound, until stop is requested.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Wait up to `timeout` for stop to be requested.
    ///
    /// Returns `true` if stop was (or became) set before `timeout` elapsed,
    /// `false` if the timeout elapsed first.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_set() {
            return true;
        }
        tokio::time::timeout(timeout, self.token.cancelled())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn starts_unset() {
        let stop = StopSignal::new();
        assert!(!stop.is_set());
    }

    #[tokio::test(start_paused = true)]
    async fn set_is_observed_immediately() {
        let stop = StopSignal::new();
        stop.set();
        assert!(stop.is_set());
        assert!(stop.wait_timeout(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_returns_false_when_not_set() {
        let stop = StopSignal::new();
        assert!(!stop.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_wakes_early_when_set_concurrently() {
        let stop = StopSignal::new();
        let waiter = stop.clone();
        let handle = tokio::spawn(async move { waiter.wait_timeout(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.set();

        assert!(handle.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_state() {
        let a = StopSignal::new();
        let b = a.clone();
        a.set();
        assert!(b.is_set());
    }
}
