mod cli;
mod sample_jobs;

use clap::Parser;
use tracing::{error, info, warn};

use runner_engine::{CoordinatorEvent, CoordinatorHandle};

use crate::cli::Cli;

fn init_tracing(verbose: bool) {
    let log_directive = if verbose {
        "run_jobs=debug,runner_engine=debug,runner_core=debug"
    } else {
        "run_jobs=info,runner_engine=info,runner_core=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_directive)
        .with_target(false)
        .init();
}

async fn log_events(handle: &CoordinatorHandle) {
    let mut events = handle.subscribe();
    loop {
        match events.recv().await {
            Ok(CoordinatorEvent::Started) => info!("coordinator started"),
            Ok(CoordinatorEvent::StopRequested) => info!("stop requested"),
            Ok(CoordinatorEvent::JobStarted { job }) => info!(job, "job started"),
            Ok(CoordinatorEvent::JobSucceeded { job, duration }) => {
                info!(job, ?duration, "job succeeded")
            }
            Ok(CoordinatorEvent::JobFailed { job, error: err }) => {
                error!(job, error = err, "job failed")
            }
            Ok(CoordinatorEvent::JobFailedFatal { job, error: err }) => {
                error!(job, error = err, "job failed fatally")
            }
            Ok(CoordinatorEvent::JobTimedOut { job }) => warn!(job, "job timed out"),
            Ok(CoordinatorEvent::JobRerunRequested { job }) => info!(job, "job requested rerun"),
            Ok(CoordinatorEvent::JobStopRequested { job }) => info!(job, "job requested stop"),
            Ok(CoordinatorEvent::TimeoutCancelledLate { label }) => {
                warn!(label, "timeout cancelled after it fired")
            }
            Ok(CoordinatorEvent::RunnerPanicked { job, error: err }) => {
                error!(job, error = err, "runner panicked")
            }
            Ok(CoordinatorEvent::ShutdownTimedOut { still_alive }) => {
                error!(?still_alive, "shutdown timed out")
            }
            Ok(CoordinatorEvent::Stopped) => {
                info!("coordinator stopped");
                return;
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!(version = env!("CARGO_PKG_VERSION"), "run-jobs starting");

    let mut jobs = sample_jobs::default_jobs();
    if cli.debug_stuck_job {
        jobs.push(sample_jobs::stuck_job());
    }
    let options = cli.coordinator_options();

    let handle = match runner_engine::start(jobs, &cli.include_job, &cli.exclude_job, options) {
        Ok(handle) => handle,
        Err(violations) => {
            for violation in &violations {
                error!(error = %violation, "configuration error");
            }
            std::process::exit(1);
        }
    };

    log_events(&handle).await;
    let exit_code = handle.wait().await;
    std::process::exit(exit_code);
}
