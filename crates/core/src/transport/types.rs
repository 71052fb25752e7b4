//! Types for chat transport operations.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport closed")]
    Closed,
}

/// Who we are and where we connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Nick to register with.
    pub nick: String,
    /// Server address as `host:port`.
    pub server: String,
}

/// Kind of inbound chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Privmsg,
    Notice,
}

/// A chat line delivered to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    /// Nick of the sender.
    pub sender: String,
    /// Channel or nick the line was addressed to.
    pub recipient: String,
    /// Raw text, formatting included.
    pub text: String,
}

impl InboundMessage {
    pub fn privmsg(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Privmsg,
            sender: sender.into(),
            recipient: recipient.into(),
            text: text.into(),
        }
    }

    pub fn notice(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Notice,
            ..Self::privmsg(sender, recipient, text)
        }
    }
}

/// Lifecycle and message notifications, delivered in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Registration completed under `nick`; outbound commands may be sent.
    Ready { nick: String },
    /// A PRIVMSG or NOTICE arrived.
    Message(InboundMessage),
    /// The connection is gone.
    Disconnected { reason: Option<String> },
}

/// Outbound half of a connection.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Join a channel.
    async fn join(&self, channel: &str) -> Result<(), TransportError>;

    /// Send a line of text to a channel or nick.
    async fn privmsg(&self, target: &str, text: &str) -> Result<(), TransportError>;

    /// Leave the server. A `Disconnected` event follows.
    async fn quit(&self, message: &str) -> Result<(), TransportError>;
}

/// An open connection.
pub struct TransportLink {
    pub sender: Arc<dyn ChatSender>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLink")
            .field("sender", &"<sender>")
            .field("events", &self.events)
            .finish()
    }
}

/// Trait for chat transports.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// Open a connection and start delivering events.
    async fn connect(&self, identity: &Identity) -> Result<TransportLink, TransportError>;
}
