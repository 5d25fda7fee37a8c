use super::job::{JobKind, JobSpec, RenderContext};
use crate::notifications::Notifier;
use crate::process::ProcessExecutor;
use crate::run_log::{LogCollector, RunLog};
use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Outcome of a single executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: &'static str,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Result of one job invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub job: JobKind,
    /// Steps that actually ran, in order. Steps skipped after a failure are absent.
    pub step_outcomes: Vec<StepOutcome>,
    pub overall_success: bool,
}

impl RunResult {
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.step_outcomes.iter().find(|o| !o.success)
    }
}

/// Runs job definitions and reports each run to the notifier.
///
/// Every invocation gets its own [`LogCollector`], so runs of different jobs
/// (or overlapping runs of the same job) never mix their output.
pub struct JobRunner {
    jobs: HashMap<JobKind, JobSpec>,
    executor: Arc<dyn ProcessExecutor>,
    notifier: Arc<Notifier>,
    env: HashMap<String, String>,
}

impl JobRunner {
    pub fn new(
        specs: impl IntoIterator<Item = JobSpec>,
        executor: Arc<dyn ProcessExecutor>,
        notifier: Arc<Notifier>,
        env: HashMap<String, String>,
    ) -> Self {
        let jobs = specs.into_iter().map(|spec| (spec.kind, spec)).collect();
        Self {
            jobs,
            executor,
            notifier,
            env,
        }
    }

    pub fn spec(&self, kind: JobKind) -> Option<&JobSpec> {
        self.jobs.get(&kind)
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Run `kind` with placeholders rendered for today's local date.
    pub async fn run(&self, kind: JobKind) -> RunResult {
        let ctx = RenderContext::for_date(Local::now().date_naive());
        self.run_with_context(kind, &ctx).await
    }

    /// Run `kind` and flush its log to the notifier, whatever the outcome.
    pub async fn run_with_context(&self, kind: JobKind, ctx: &RenderContext) -> RunResult {
        let collector = Arc::new(LogCollector::new());
        let log = RunLog::new(kind.as_str(), Arc::clone(&collector));
        let start_time = Instant::now();

        log.info(format!("Starting {} job", kind));

        let result = match self.jobs.get(&kind) {
            Some(spec) => self.run_steps(spec, ctx, &log).await,
            None => {
                log.error(format!("No definition configured for {} job", kind));
                RunResult {
                    job: kind,
                    step_outcomes: Vec::new(),
                    overall_success: false,
                }
            }
        };

        if result.overall_success {
            log.info(format!("{} job completed successfully", kind));
        } else {
            log.warn(format!("{} job failed", kind));
        }
        debug!("{} job took {:?}", kind, start_time.elapsed());

        self.notifier.flush(collector.snapshot_and_clear()).await;
        result
    }

    async fn run_steps(&self, spec: &JobSpec, ctx: &RenderContext, log: &RunLog) -> RunResult {
        let mut step_outcomes = Vec::with_capacity(spec.steps.len());
        let mut overall_success = true;

        for step in &spec.steps {
            let command = step.command.render(ctx);
            match self.executor.execute(&command, &self.env, log).await {
                Ok(()) => {
                    log.info(step.success_message.clone());
                    step_outcomes.push(StepOutcome {
                        step: step.name,
                        success: true,
                        error_message: None,
                    });
                }
                Err(e) => {
                    log.warn(format!(
                        "Step '{}' failed running '{}': {}",
                        step.name, command, e
                    ));
                    step_outcomes.push(StepOutcome {
                        step: step.name,
                        success: false,
                        error_message: Some(e.to_string()),
                    });
                    overall_success = false;
                    break;
                }
            }
        }

        if !overall_success {
            if let Some(cleanup) = &spec.cleanup {
                let command = cleanup.render(ctx);
                if let Err(e) = self.executor.execute(&command, &self.env, log).await {
                    log.warn(format!("Cleanup failed running '{}': {}", command, e));
                }
            }
        }

        RunResult {
            job: spec.kind,
            step_outcomes,
            overall_success,
        }
    }
}
