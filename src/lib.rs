//! restic-runner library
//!
//! Runs scheduled restic maintenance jobs (backup + forget, check, prune),
//! streams their output into a per-run log and reports each run to Discord.

pub mod app;
pub mod config;
pub mod jobs;
pub mod notifications;
pub mod process;
pub mod run_log;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use app::RunMode;
pub use config::{AppConfig, EnvConfig, FileConfig};
pub use jobs::{JobKind, JobRunner, RunResult, UnknownJobError};
pub use notifications::{DiscordWebhook, Notifier, WebhookTransport};
pub use process::{ProcessExecutor, ShellExecutor};
pub use run_log::{LogCollector, LogEntry, LogLevel};
pub use scheduler::{Cadence, CronScheduler};
