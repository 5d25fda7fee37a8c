use super::chunking::{pack_chunks, wrap_chunk, DEFAULT_CHARACTER_LIMIT};
use crate::run_log::LogEntry;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Errors returned by a webhook transport.
#[derive(Debug, Error)]
pub enum NotificationTransportError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("webhook transport is closed")]
    Closed,
}

/// A chat webhook that accepts a text message.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Post one message.
    async fn send(&self, text: &str) -> Result<(), NotificationTransportError>;

    /// Release any held connection resources. Later sends fail.
    async fn close(&self) {}
}

/// Sends collected run logs to the operator channel.
///
/// Delivery is best-effort: transport errors are logged and never returned.
pub struct Notifier {
    transport: Option<Arc<dyn WebhookTransport>>,
    character_limit: usize,
}

impl Notifier {
    pub fn new(transport: Arc<dyn WebhookTransport>, character_limit: usize) -> Self {
        Self {
            transport: Some(transport),
            character_limit,
        }
    }

    /// A notifier with no transport; flushes only log locally.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            character_limit: DEFAULT_CHARACTER_LIMIT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn character_limit(&self) -> usize {
        self.character_limit
    }

    /// Pack `entries` into chunks and send each one, in order.
    ///
    /// A failed chunk is logged and the remaining chunks are still attempted.
    pub async fn flush(&self, entries: Vec<LogEntry>) {
        let Some(transport) = &self.transport else {
            debug!(
                "Notifications disabled, dropping {} collected lines",
                entries.len()
            );
            return;
        };

        let lines: Vec<String> = entries.iter().map(ToString::to_string).collect();
        let chunks = pack_chunks(&lines, self.character_limit);
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(e) = transport.send(&wrap_chunk(chunk)).await {
                error!(
                    "Failed to send notification chunk {}/{}: {}",
                    index + 1,
                    total,
                    e
                );
            }
        }

        debug!("Sent {} notification chunk(s)", total);
    }

    /// Release the transport, if any.
    pub async fn close(&self) {
        if let Some(transport) = &self.transport {
            transport.close().await;
        }
    }
}
