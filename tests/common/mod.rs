//! Shared fixtures for the end-to-end tests.
//!
//! Jobs run through the real [`ShellExecutor`] against a fake `restic`
//! script written into a temp dir. The script echoes the subcommand it was
//! given and fails when the matching `FAIL_<SUBCOMMAND>` variable is set.

#![allow(dead_code)]

use async_trait::async_trait;
use restic_runner::config::{AppConfig, EnvConfig, FileConfig};
use restic_runner::jobs::JobRunner;
use restic_runner::notifications::{NotificationTransportError, Notifier, WebhookTransport};
use restic_runner::process::ShellExecutor;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const FAKE_RESTIC: &str = r#"#!/bin/sh
cmd="$1"
shift
echo "$cmd $*"
case "$cmd" in
  backup) [ -n "$FAIL_BACKUP" ] && { echo "Fatal: unable to create lock in backend" >&2; exit 1; } ;;
  forget) [ -n "$FAIL_FORGET" ] && { echo "forget failed" >&2; exit 1; } ;;
  check) [ -n "$FAIL_CHECK" ] && { echo "check failed" >&2; exit 1; } ;;
  prune) [ -n "$FAIL_PRUNE" ] && { echo "prune failed" >&2; exit 3; } ;;
esac
exit 0
"#;

/// Records every message instead of posting it.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    closed: Mutex<bool>,
}

impl RecordingTransport {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn send(&self, text: &str) -> Result<(), NotificationTransportError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// A temp dir holding an executable fake `restic`.
pub struct FakeRestic {
    pub dir: TempDir,
    pub binary: PathBuf,
}

impl FakeRestic {
    pub fn install() -> Self {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("restic");
        std::fs::write(&binary, FAKE_RESTIC).unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, binary }
    }
}

/// Builder for a runner wired to the fake restic.
pub struct TestHarness {
    pub restic: FakeRestic,
    env: Vec<(String, String)>,
    command_env: HashMap<String, String>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            restic: FakeRestic::install(),
            env: Vec::new(),
            command_env: HashMap::new(),
        }
    }

    /// Set a runner setting as if it came from the process environment.
    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Make the given restic subcommand exit non-zero.
    pub fn failing(mut self, subcommand: &str) -> Self {
        self.command_env
            .insert(format!("FAIL_{}", subcommand.to_uppercase()), "1".to_string());
        self
    }

    pub fn config(&self) -> AppConfig {
        let binary = self.restic.binary.to_string_lossy().into_owned();
        let mut env = self.env.clone();
        env.push(("RESTIC_BINARY".to_string(), binary));
        let env_config = EnvConfig::from_lookup(|key| {
            env.iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        });

        let file_config = FileConfig {
            env: self.command_env.clone(),
            ..Default::default()
        };
        AppConfig::resolve(&env_config, Some(file_config)).unwrap()
    }

    pub fn build_with_transport(
        &self,
        transport: Arc<dyn WebhookTransport>,
    ) -> JobRunner {
        let config = self.config();
        let notifier = Arc::new(Notifier::new(transport, config.character_limit));
        let executor = Arc::new(ShellExecutor::new(
            config.restic.shell.clone(),
            config.restic.output_label(),
        ));
        JobRunner::new(
            config.job_specs().unwrap(),
            executor,
            notifier,
            config.command_env.clone(),
        )
    }

    pub fn build(&self) -> (JobRunner, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let runner = self.build_with_transport(transport.clone());
        (runner, transport)
    }
}

/// Strip the code-block fence from a sent message.
pub fn unwrap_fence(message: &str) -> &str {
    message
        .strip_prefix("```")
        .and_then(|m| m.strip_suffix("```"))
        .unwrap_or_else(|| panic!("message is not fenced: {:?}", message))
}

/// Every line of every message, fences removed.
pub fn sent_lines(messages: &[String]) -> Vec<String> {
    messages
        .iter()
        .flat_map(|m| unwrap_fence(m).lines().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

/// A local HTTP endpoint that answers every request with `204` and keeps the
/// `content` field of each posted JSON body.
pub struct WebhookServer {
    pub base_url: String,
    received: Arc<Mutex<Vec<(String, String)>>>,
}

impl WebhookServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    let Some((path, body)) = read_request(&mut socket).await else {
                        return;
                    };
                    let content = serde_json::from_str::<serde_json::Value>(&body)
                        .ok()
                        .and_then(|v| v["content"].as_str().map(str::to_string))
                        .unwrap_or_default();
                    sink.lock().unwrap().push((path, content));
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        )
                        .await;
                });
            }
        });

        Self { base_url, received }
    }

    /// `(path, content)` pairs in arrival order.
    pub fn received(&self) -> Vec<(String, String)> {
        self.received.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        request.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&request).to_string();
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|l| {
                l.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .and_then(|v| v.trim().parse::<usize>().ok())
            })
            .unwrap_or(0);
        if request.len() >= header_end + 4 + content_length {
            let path = text
                .lines()
                .next()
                .and_then(|l| l.split_whitespace().nth(1))
                .unwrap_or_default()
                .to_string();
            let body = String::from_utf8_lossy(&request[header_end + 4..]).to_string();
            return Some((path, body));
        }
    }
}
