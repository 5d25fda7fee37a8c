//! Run-report delivery to the operator channel.
//!
//! Log lines collected during a run are packed into size-bounded chunks and
//! posted one message per chunk through a [`WebhookTransport`].

mod chunking;
mod discord;
mod notifier;

pub use chunking::{pack_chunks, wrap_chunk, DEFAULT_CHARACTER_LIMIT, WRAPPER_OVERHEAD};
pub use discord::{DiscordWebhook, DISCORD_API_BASE};
pub use notifier::{NotificationTransportError, Notifier, WebhookTransport};
