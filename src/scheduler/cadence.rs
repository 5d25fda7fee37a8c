use chrono::{DateTime, TimeZone};
use croner::Cron;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A cron expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cron expression '{expression}': {reason}")]
pub struct CadenceError {
    pub expression: String,
    pub reason: String,
}

/// A recurring schedule in cron syntax.
///
/// Accepts the usual five fields (minute, hour, day-of-month, month,
/// day-of-week) with an optional leading seconds field.
#[derive(Clone)]
pub struct Cadence {
    expression: String,
    cron: Cron,
}

impl Cadence {
    pub fn parse(expression: &str) -> Result<Self, CadenceError> {
        let expression = expression.trim();
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| CadenceError {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`, if the schedule has one.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.cron.find_next_occurrence(after, false).ok()
    }

    /// Time from `now` until the next occurrence.
    pub fn duration_until_next<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Duration> {
        let next = self.next_after(now)?;
        Some((next - now.clone()).to_std().unwrap_or(Duration::ZERO))
    }
}

impl fmt::Debug for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cadence").field(&self.expression).finish()
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
