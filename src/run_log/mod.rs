//! Per-run log aggregation.
//!
//! Every job run owns a [`LogCollector`] that accumulates the lines produced
//! while the run is in flight. When the run finishes the collector is drained
//! with [`LogCollector::snapshot_and_clear`] and handed to the notifier.

mod collector;

pub use collector::{LogCollector, LogEntry, LogLevel, RunLog};
