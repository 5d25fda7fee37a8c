//! Run modes: a single job invocation or the cron daemon.

use crate::jobs::{JobKind, JobRunner, RunResult, UnknownJobError};
use crate::scheduler::{Cadence, CronScheduler};
use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Keep running and trigger every job on its cadence.
    Daemon,
    /// Run one job, then exit.
    Once(JobKind),
}

impl FromStr for RunMode {
    type Err = UnknownJobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(RunMode::Daemon),
            other => other.parse().map(RunMode::Once),
        }
    }
}

/// Log the outcome of a finished run.
pub fn log_run_result(result: &RunResult) {
    if result.overall_success {
        info!("{} run finished: success", result.job);
    } else {
        let failed = result
            .failed_step()
            .map(|o| o.step)
            .unwrap_or("definition");
        warn!("{} run finished: failed at {}", result.job, failed);
    }
}

/// Run `kind` once and release the notification transport.
pub async fn run_once(runner: &JobRunner, kind: JobKind) -> RunResult {
    let result = runner.run(kind).await;
    log_run_result(&result);
    runner.notifier().close().await;
    result
}

/// Schedule every defined job on its cadence and run until `shutdown_token`
/// is cancelled.
///
/// Every cadence is parsed before anything is scheduled, so an invalid
/// expression fails the whole daemon up front.
pub async fn run_daemon(runner: Arc<JobRunner>, shutdown_token: CancellationToken) -> Result<()> {
    let mut cadences = Vec::with_capacity(JobKind::ALL.len());
    for kind in JobKind::ALL {
        let Some(spec) = runner.spec(kind) else {
            warn!("No definition for {} job, not scheduling it", kind);
            continue;
        };
        let cadence = Cadence::parse(&spec.cadence)
            .with_context(|| format!("Invalid cadence for {} job", kind))?;
        cadences.push((kind, cadence));
    }

    let mut scheduler = CronScheduler::new(shutdown_token);
    for (kind, cadence) in cadences {
        info!("Scheduled {} job with cadence '{}'", kind, cadence);

        let job_runner = Arc::clone(&runner);
        scheduler.schedule(kind.as_str(), cadence, move || {
            let runner = Arc::clone(&job_runner);
            async move {
                let result = runner.run(kind).await;
                log_run_result(&result);
            }
        });
    }

    info!("Application started in cron mode");
    scheduler.run().await;
    runner.notifier().close().await;
    Ok(())
}

/// Run whatever `mode` names.
///
/// `build_runner` is only called for a known mode. An unknown mode is logged
/// and treated as a clean exit. Daemon mode stops on Ctrl+C or SIGTERM.
pub async fn dispatch<F>(mode: &str, build_runner: F) -> Result<()>
where
    F: FnOnce() -> Result<JobRunner>,
{
    let mode: RunMode = match mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            error!("{}", e);
            return Ok(());
        }
    };

    let runner = build_runner()?;
    match mode {
        RunMode::Once(kind) => {
            run_once(&runner, kind).await;
            Ok(())
        }
        RunMode::Daemon => {
            let shutdown_token = CancellationToken::new();
            let signal_token = shutdown_token.clone();
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                signal_token.cancel();
            });

            run_daemon(Arc::new(runner), shutdown_token).await?;
            info!("Shutdown complete");
            Ok(())
        }
    }
}

/// Resolve when the process receives Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, initiating graceful shutdown"),
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, initiating graceful shutdown");
}
