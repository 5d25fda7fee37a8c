use crate::run_log::{LogEntry, RunLog};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum ProcessExecutionError {
    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("command exited with {}", describe_exit(.exit_code))]
    Exited { exit_code: Option<i32> },

    #[error("IO error while reading command output: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessExecutionError {
    /// Exit code of the command, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessExecutionError::Exited { exit_code } => *exit_code,
            _ => None,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Runs one external command and reports whether it succeeded.
///
/// Output lines are recorded into `log` as they arrive, so a run that is
/// interrupted mid-command still keeps everything printed up to that point.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn execute(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        log: &RunLog,
    ) -> Result<(), ProcessExecutionError>;
}

/// Executes commands via `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    output_label: String,
}

impl ShellExecutor {
    /// Create an executor that runs commands with `shell -c`.
    ///
    /// `output_label` prefixes every collected output line, e.g. `restic: ...`
    /// for stdout and `restic err: ...` for stderr.
    pub fn new(shell: impl Into<String>, output_label: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            output_label: output_label.into(),
        }
    }

    async fn stream_lines<R>(
        mut reader: R,
        log: &RunLog,
        to_entry: impl Fn(String) -> LogEntry,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }
            // Paths in restic output need not be UTF-8
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            log.record(to_entry(line.to_string()));
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("sh", "restic")
    }
}

#[async_trait]
impl ProcessExecutor for ShellExecutor {
    async fn execute(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        log: &RunLog,
    ) -> Result<(), ProcessExecutionError> {
        log.info(format!("Running '{}'", command));

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProcessExecutionError::Spawn)?;

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(BufReader::new);

        let label = self.output_label.as_str();
        let stdout_task = async {
            match stdout {
                Some(reader) => {
                    Self::stream_lines(reader, log, |line| {
                        LogEntry::info(format!("{}: {}", label, line))
                    })
                    .await
                }
                None => Ok(()),
            }
        };
        let stderr_task = async {
            match stderr {
                Some(reader) => {
                    Self::stream_lines(reader, log, |line| {
                        LogEntry::warn(format!("{} err: {}", label, line))
                    })
                    .await
                }
                None => Ok(()),
            }
        };

        let (stdout_result, stderr_result) = tokio::join!(stdout_task, stderr_task);
        let status = child.wait().await?;
        stdout_result?;
        stderr_result?;

        debug!("Command '{}' finished with {}", command, status);

        if status.success() {
            Ok(())
        } else {
            Err(ProcessExecutionError::Exited {
                exit_code: status.code(),
            })
        }
    }
}
