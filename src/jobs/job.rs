use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest subset bucket used by the check job; ISO week 53 folds into it.
pub const CHECK_SUBSET_BUCKETS: u32 = 52;

/// The maintenance jobs this runner knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Backup,
    Check,
    Prune,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Backup, JobKind::Check, JobKind::Prune];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Backup => "backup",
            JobKind::Check => "check",
            JobKind::Prune => "prune",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested job name did not match any known job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job '{0}' (expected one of: backup, check, prune)")]
pub struct UnknownJobError(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backup" => Ok(JobKind::Backup),
            "check" => Ok(JobKind::Check),
            "prune" => Ok(JobKind::Prune),
            other => Err(UnknownJobError(other.to_string())),
        }
    }
}

/// Values substituted into command templates at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContext {
    /// Check-subset week bucket, in `1..=52`.
    pub week: u32,
}

impl RenderContext {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            week: check_subset_week(date),
        }
    }
}

/// ISO week of `date` (Monday-start weeks), clamped to [`CHECK_SUBSET_BUCKETS`].
pub fn check_subset_week(date: NaiveDate) -> u32 {
    date.iso_week().week().min(CHECK_SUBSET_BUCKETS)
}

/// A shell command with `{placeholder}` slots.
///
/// Only `{week}` is recognised; any other braces are passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn render(&self, ctx: &RenderContext) -> String {
        self.0.replace("{week}", &ctx.week.to_string())
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One command inside a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStep {
    /// Short label used in log lines, e.g. `backup` or `forget`.
    pub name: &'static str,
    pub command: CommandTemplate,
    /// Logged at info level when the step succeeds.
    pub success_message: String,
}

impl JobStep {
    pub fn new(name: &'static str, command: CommandTemplate, success_message: impl Into<String>) -> Self {
        Self {
            name,
            command,
            success_message: success_message.into(),
        }
    }
}

/// Definition of a job: its ordered steps and when it runs.
///
/// Steps run in order and the first failure skips the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub kind: JobKind,
    pub steps: Vec<JobStep>,
    /// Cron cadence used in daemon mode.
    pub cadence: String,
    /// Run once after a failed step, if set.
    pub cleanup: Option<CommandTemplate>,
}
