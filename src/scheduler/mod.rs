//! Cron-driven job triggering.
//!
//! Provides [`Cadence`] (a parsed cron expression) and [`CronScheduler`],
//! which fires tasks on their cadences until a shutdown token is cancelled.

mod cadence;
mod cron_scheduler;

pub use cadence::{Cadence, CadenceError};
pub use cron_scheduler::{CronScheduler, DEFAULT_GRACE_PERIOD};
