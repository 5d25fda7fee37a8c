use super::cadence::Cadence;
use chrono::Local;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on a single sleep, so wall-clock jumps are noticed.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// How long shutdown waits for in-flight runs before aborting them.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Triggers tasks on independent cron cadences until cancelled.
///
/// Each registered cadence gets its own loop. A trigger spawns the task and
/// returns to waiting immediately, so a slow run never delays other cadences
/// and may overlap with the next run of its own cadence.
pub struct CronScheduler {
    shutdown_token: CancellationToken,
    loops: JoinSet<()>,
    grace_period: Duration,
}

impl CronScheduler {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            shutdown_token,
            loops: JoinSet::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Number of registered cadences still running.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Run `task` every time `cadence` fires.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F, Fut>(&mut self, name: impl Into<String>, cadence: Cadence, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = self.shutdown_token.child_token();
        let grace_period = self.grace_period;
        self.loops
            .spawn(cadence_loop(name, cadence, task, token, grace_period));
    }

    /// Request shutdown of every cadence loop.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Wait until every cadence loop has stopped.
    ///
    /// Loops stop when the shutdown token is cancelled (or a cadence has no
    /// future occurrence).
    pub async fn run(mut self) {
        info!("Starting cron scheduler with {} cadence(s)", self.loops.len());

        while let Some(result) = self.loops.join_next().await {
            if let Err(e) = result {
                error!("Cadence loop terminated abnormally: {}", e);
            }
        }

        info!("Cron scheduler stopped");
    }
}

async fn cadence_loop<F, Fut>(
    name: String,
    cadence: Cadence,
    task: F,
    token: CancellationToken,
    grace_period: Duration,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let mut next_run = cadence.next_after(&Local::now());

    loop {
        let Some(target) = next_run else {
            warn!(
                "Cadence '{}' for {} has no upcoming occurrence, stopping",
                cadence, name
            );
            break;
        };

        let now = Local::now();
        if target <= now {
            info!("Triggering {} (cadence '{}')", name, cadence);
            in_flight.spawn(task());
            // Missed occurrences (e.g. after a suspend) collapse into this one
            next_run = cadence.next_after(&now);
            continue;
        }

        let wait = (target - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SLEEP);
        debug!("{} next run at {}, sleeping {:?}", name, target, wait);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            Some(result) = in_flight.join_next() => {
                if let Err(e) = result {
                    error!("{} run terminated abnormally: {}", name, e);
                }
            }
            _ = token.cancelled() => {
                debug!("Cadence loop for {} received shutdown signal", name);
                break;
            }
        }
    }

    if !in_flight.is_empty() {
        info!(
            "Waiting up to {:?} for {} running {} job(s) to finish",
            grace_period,
            in_flight.len(),
            name
        );
        let drained = tokio::time::timeout(grace_period, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Aborting {} {} job(s) still running", in_flight.len(), name);
            in_flight.abort_all();
        }
    }
}
