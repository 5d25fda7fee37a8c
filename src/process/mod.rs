//! External command execution.
//!
//! Commands run through a shell; their stdout and stderr are streamed line by
//! line into the run log while the process is still running.

mod executor;

pub use executor::{ProcessExecutionError, ProcessExecutor, ShellExecutor};
