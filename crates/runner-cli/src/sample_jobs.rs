//! Demo jobs wired into the `run-jobs` binary out of the box.
//!
//! Stands in for the out-of-scope job-discovery collaborator: a real
//! embedding application assembles its own `Vec<RegisteredJob>` from its own
//! module layout. This one hardcodes a few illustrative jobs so the binary
//! is runnable without any setup and so integration tests have real job
//! bodies to exercise.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use runner_core::RegisteredJob;

/// Build the default job set for the `run-jobs` binary.
pub fn default_jobs() -> Vec<RegisteredJob> {
    vec![heartbeat_job(), sleeper_job(), rerun_counter_job()]
}

/// Logs a line on every invocation. No timeout, no variance.
fn heartbeat_job() -> RegisteredJob {
    RegisteredJob::new(
        "sample_jobs.heartbeat",
        Duration::from_secs(30),
        Duration::ZERO,
        None,
        |_env| async {
            info!("heartbeat");
            Ok(())
        },
    )
    .expect("heartbeat job descriptor is valid")
}

/// Sleeps cooperatively inside its own invocation, demonstrating prompt
/// interruption via `JobError::Interrupted` propagation.
fn sleeper_job() -> RegisteredJob {
    RegisteredJob::new(
        "sample_jobs.sleeper",
        Duration::from_secs(60),
        Duration::from_secs(5),
        Some(Duration::from_secs(30)),
        |env| async move {
            env.sleep(Duration::from_secs(10)).await?;
            Ok(())
        },
    )
    .expect("sleeper job descriptor is valid")
}

/// Always fails after marking itself fatal. Opt-in only — never part of
/// [`default_jobs`], since a binary that exits 1 out of the box is a poor
/// demo — but exercises `request_fatal_errors`/`JobFailedFatal` end to end
/// for callers that want to see the fatal path, and for tests.
pub fn fatal_job() -> RegisteredJob {
    RegisteredJob::new(
        "sample_jobs.fatal",
        Duration::from_secs(1),
        Duration::ZERO,
        None,
        |env| async move {
            env.request_fatal_errors();
            Err(anyhow::anyhow!("sample_jobs.fatal always fails").into())
        },
    )
    .expect("fatal job descriptor is valid")
}

/// Never yields once invoked. Opt-in only — never part of [`default_jobs`]
/// — this demonstrates the coordinator's last-resort `std::process::exit(1)`
/// when a runner's per-invocation timeout fires but the stuck task can't be
/// joined within `--stop-timeout`.
pub fn stuck_job() -> RegisteredJob {
    RegisteredJob::new(
        "sample_jobs.stuck",
        Duration::ZERO,
        Duration::ZERO,
        Some(Duration::from_millis(200)),
        |_env| async {
            loop {
                std::hint::spin_loop();
            }
        },
    )
    .expect("stuck job descriptor is valid")
}

/// Increments a shared counter and requests an immediate rerun a handful of
/// times before settling back onto its normal cadence.
fn rerun_counter_job() -> RegisteredJob {
    let count = Arc::new(AtomicU64::new(0));

    RegisteredJob::new(
        "sample_jobs.rerun_counter",
        Duration::from_secs(30),
        Duration::ZERO,
        None,
        move |env| {
            let count = count.clone();
            async move {
                let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                info!(count = n, "rerun_counter tick");
                if n % 5 != 0 {
                    env.request_rerun();
                }
                Ok(())
            }
        },
    )
    .expect("rerun_counter job descriptor is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner_core::{environment, JobError, StopSignal};

    #[tokio::test]
    async fn fatal_job_marks_itself_fatal_and_fails() {
        let job = fatal_job();
        let (run_env, tracker_env) = environment(StopSignal::new());

        let err = job.call(run_env).await.unwrap_err();

        assert!(matches!(err, JobError::Failed(_)));
        assert!(tracker_env.requested_fatal_errors());
    }

    #[test]
    fn stuck_job_descriptor_is_valid() {
        let job = stuck_job();
        assert_eq!(job.name(), "sample_jobs.stuck");
        assert_eq!(job.timeout(), Some(Duration::from_millis(200)));
    }
}
