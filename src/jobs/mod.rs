//! Maintenance job definitions and execution.
//!
//! A job is an ordered list of shell steps (backup then forget, or a single
//! check or prune). [`JobRunner`] executes them with abort-on-failure
//! semantics and always reports the run through the notifier.

mod job;
mod runner;

pub use job::{
    check_subset_week, CommandTemplate, JobKind, JobSpec, JobStep, RenderContext,
    UnknownJobError, CHECK_SUBSET_BUCKETS,
};
pub use runner::{JobRunner, RunResult, StepOutcome};
