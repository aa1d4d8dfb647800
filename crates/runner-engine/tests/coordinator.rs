//! Scenario tests over a paused Tokio clock, per the testable properties
//! every complete implementation of this system is expected to satisfy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runner_core::{ConfigError, RegisteredJob};
use runner_engine::{start, CoordinatorOptions};

fn counting_job(name: &str, interval: Duration, variance: Duration) -> (RegisteredJob, Arc<AtomicU64>) {
    let count = Arc::new(AtomicU64::new(0));
    let count_clone = count.clone();
    let job = RegisteredJob::new(name, interval, variance, None, move |_env| {
        let count = count_clone.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .unwrap();
    (job, count)
}

#[tokio::test(start_paused = true)]
async fn smoke_one_job_one_invocation() {
    let (job, count) = counting_job("smoke.job", Duration::from_secs(1), Duration::ZERO);

    let handle = start(
        vec![job],
        &[],
        &[],
        CoordinatorOptions {
            stop_after: Some(Duration::from_secs(1)),
            ..Default::default()
        },
    )
    .unwrap();

    let exit_code = handle.wait().await;
    assert_eq!(exit_code, 0);
    assert!(count.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(start_paused = true)]
async fn fast_cadence_runs_roughly_ten_times() {
    let (job, count) = counting_job(
        "fast.cadence",
        Duration::from_millis(100),
        Duration::ZERO,
    );

    let handle = start(
        vec![job],
        &[],
        &[],
        CoordinatorOptions {
            stop_after: Some(Duration::from_secs(1)),
            ..Default::default()
        },
    )
    .unwrap();

    let exit_code = handle.wait().await;
    assert_eq!(exit_code, 0);
    let n = count.load(Ordering::SeqCst);
    assert!((8..=12).contains(&n), "expected 8..=12 invocations, got {n}");
}

#[tokio::test(start_paused = true)]
async fn slow_cadence_runs_exactly_once() {
    let (job, count) = counting_job("slow.cadence", Duration::from_secs(30), Duration::ZERO);

    let handle = start(
        vec![job],
        &[],
        &[],
        CoordinatorOptions {
            stop_after: Some(Duration::from_secs(1)),
            ..Default::default()
        },
    )
    .unwrap();

    let exit_code = handle.wait().await;
    assert_eq!(exit_code, 0);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn rerun_drives_many_invocations_without_delay() {
    let count = Arc::new(AtomicU64::new(0));
    let count_clone = count.clone();
    let job = RegisteredJob::new(
        "rerun.counter",
        Duration::from_secs(30),
        Duration::ZERO,
        None,
        move |env| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                env.request_rerun();
                Ok(())
            }
        },
    )
    .unwrap();

    let handle = start(
        vec![job],
        &[],
        &[],
        CoordinatorOptions {
            stop_after: Some(Duration::from_secs(1)),
            ..Default::default()
        },
    )
    .unwrap();

    let exit_code = handle.wait().await;
    assert_eq!(exit_code, 0);
    assert!(count.load(Ordering::SeqCst) > 10);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_exits_one() {
    let job = RegisteredJob::new(
        "fatal.job",
        Duration::from_millis(10),
        Duration::ZERO,
        None,
        |env| async move {
            env.request_fatal_errors();
            Err(anyhow::anyhow!("boom").into())
        },
    )
    .unwrap();

    let handle = start(vec![job], &[], &[], CoordinatorOptions::default()).unwrap();

    let exit_code = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    assert_eq!(exit_code, 1);
}

// Scenario 6 ("stuck with timeout") from the testable-properties list isn't
// exercised here: a job that genuinely never yields would also starve this
// test's own paused-clock runtime (virtual-time auto-advance needs the
// runtime to go idle), and the coordinator's response to it is
// `std::process::exit(1)`, which would tear down the test binary itself.
// It's covered instead by `runner-cli/tests/stuck_job_forces_exit.rs`, which
// spawns the compiled `run-jobs` binary as a real process.

#[tokio::test(start_paused = true)]
async fn sleep_is_interrupted_by_stop() {
    let job = RegisteredJob::new(
        "sleeper.job",
        Duration::from_secs(60),
        Duration::ZERO,
        None,
        |env| async move {
            env.sleep(Duration::from_secs(300)).await?;
            Ok(())
        },
    )
    .unwrap();

    let handle = start(
        vec![job],
        &[],
        &[],
        CoordinatorOptions {
            stop_after: Some(Duration::from_secs(1)),
            stop_timeout: Duration::from_secs(5),
            ..Default::default()
        },
    )
    .unwrap();

    let exit_code = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .unwrap();
    assert_eq!(exit_code, 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_include_name_is_rejected() {
    let (job, _count) = counting_job("known.job", Duration::from_secs(1), Duration::ZERO);

    let err = start(
        vec![job],
        &["nonexistent.module.fn".to_string()],
        &[],
        CoordinatorOptions::default(),
    )
    .unwrap_err();

    assert_eq!(err.len(), 1);
    assert!(matches!(err[0], ConfigError::UnknownIncludedJob { .. }));
}

#[tokio::test(start_paused = true)]
async fn external_stop_request_yields_graceful_exit() {
    let (job, count) = counting_job("signal.job", Duration::from_millis(50), Duration::ZERO);

    let handle = start(vec![job], &[], &[], CoordinatorOptions::default()).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.request_stop();

    let exit_code = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    assert_eq!(exit_code, 0);
    assert!(count.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(start_paused = true)]
async fn trial_run_validates_without_starting_runners() {
    let (job, count) = counting_job("trial.job", Duration::from_millis(1), Duration::ZERO);

    let handle = start(
        vec![job],
        &[],
        &[],
        CoordinatorOptions {
            trial_run: true,
            ..Default::default()
        },
    )
    .unwrap();

    let exit_code = tokio::time::timeout(Duration::from_secs(1), handle.wait())
        .await
        .unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
