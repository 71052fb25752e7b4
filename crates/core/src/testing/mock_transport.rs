//! Mock chat transport for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::transport::{
    ChatSender, ChatTransport, Identity, InboundMessage, TransportError, TransportEvent,
    TransportLink,
};

/// An outbound command recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentCommand {
    Join(String),
    Privmsg { target: String, text: String },
    Quit(String),
}

#[derive(Debug, Default)]
struct MockState {
    sent: Vec<SentCommand>,
    identities: Vec<Identity>,
    events: Option<mpsc::Sender<TransportEvent>>,
}

/// Mock implementation of the ChatTransport trait.
///
/// Records every outbound command and lets the test inject inbound events
/// (`ready`, `message`, `disconnect`) on the last opened connection. `quit`
/// is answered with a `Disconnected` event like a real server would.
///
/// # Example
///
/// ```rust,ignore
/// use bookit_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// session.connect(&transport, completion_tx).await?;
///
/// transport.ready().await;
/// transport.message("SearchOok", "fuubar", "<<SearchBot>> ...").await;
///
/// assert_eq!(transport.sent_privmsgs().await, vec!["@search alias grace"]);
/// ```
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<RwLock<MockState>>,
    fail_connect: bool,
    fail_join: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            fail_connect: false,
            fail_join: false,
        }
    }

    /// Create a mock whose connect always fails.
    pub fn failing() -> Self {
        Self {
            fail_connect: true,
            ..Self::new()
        }
    }

    /// Create a mock that connects but refuses every JOIN.
    pub fn failing_join() -> Self {
        Self {
            fail_join: true,
            ..Self::new()
        }
    }

    /// Identities passed to `connect`, in order.
    pub async fn identities(&self) -> Vec<Identity> {
        self.state.read().await.identities.clone()
    }

    /// All recorded outbound commands.
    pub async fn sent(&self) -> Vec<SentCommand> {
        self.state.read().await.sent.clone()
    }

    /// Text of every recorded PRIVMSG.
    pub async fn sent_privmsgs(&self) -> Vec<String> {
        self.sent()
            .await
            .into_iter()
            .filter_map(|c| match c {
                SentCommand::Privmsg { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Wait until a command matching `predicate` has been sent.
    ///
    /// Returns false if nothing matched within `timeout`.
    pub async fn wait_for_sent<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&SentCommand) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.state.read().await.sent.iter().any(&predicate) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Inject an inbound event on the open connection.
    ///
    /// Does nothing before `connect` or after the receiver is dropped.
    pub async fn emit(&self, event: TransportEvent) {
        let events = self.state.read().await.events.clone();
        if let Some(events) = events {
            let _ = events.send(event).await;
        }
    }

    /// Report registration as complete under the nick passed to `connect`.
    pub async fn ready(&self) {
        let nick = self
            .state
            .read()
            .await
            .identities
            .last()
            .map(|identity| identity.nick.clone())
            .unwrap_or_default();
        self.ready_as(&nick).await;
    }

    /// Report registration as complete under a server-assigned nick.
    pub async fn ready_as(&self, nick: &str) {
        self.emit(TransportEvent::Ready {
            nick: nick.to_string(),
        })
        .await;
    }

    /// Deliver a PRIVMSG.
    pub async fn message(&self, sender: &str, recipient: &str, text: &str) {
        self.emit(TransportEvent::Message(InboundMessage::privmsg(
            sender, recipient, text,
        )))
        .await;
    }

    /// Deliver a NOTICE.
    pub async fn notice(&self, sender: &str, recipient: &str, text: &str) {
        self.emit(TransportEvent::Message(InboundMessage::notice(
            sender, recipient, text,
        )))
        .await;
    }

    /// Drop the connection.
    pub async fn disconnect(&self) {
        self.emit(TransportEvent::Disconnected {
            reason: Some("mock disconnect".to_string()),
        })
        .await;
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, identity: &Identity) -> Result<TransportLink, TransportError> {
        if self.fail_connect {
            return Err(TransportError::ConnectionFailed(
                "mock connection refused".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        {
            let mut state = self.state.write().await;
            state.identities.push(identity.clone());
            state.events = Some(tx);
        }

        Ok(TransportLink {
            sender: Arc::new(MockSender {
                state: Arc::clone(&self.state),
                fail_join: self.fail_join,
            }),
            events: rx,
        })
    }
}

struct MockSender {
    state: Arc<RwLock<MockState>>,
    fail_join: bool,
}

impl MockSender {
    async fn record(&self, command: SentCommand) {
        self.state.write().await.sent.push(command);
    }
}

#[async_trait]
impl ChatSender for MockSender {
    async fn join(&self, channel: &str) -> Result<(), TransportError> {
        if self.fail_join {
            return Err(TransportError::Closed);
        }
        self.record(SentCommand::Join(channel.to_string())).await;
        Ok(())
    }

    async fn privmsg(&self, target: &str, text: &str) -> Result<(), TransportError> {
        self.record(SentCommand::Privmsg {
            target: target.to_string(),
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn quit(&self, message: &str) -> Result<(), TransportError> {
        self.record(SentCommand::Quit(message.to_string())).await;

        let events = self.state.write().await.events.take();
        if let Some(events) = events {
            let _ = events
                .send(TransportEvent::Disconnected {
                    reason: Some(message.to_string()),
                })
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_commands_and_delivers_events() {
        let transport = MockTransport::new();
        let identity = Identity {
            nick: "fuubar".to_string(),
            server: "localhost:6667".to_string(),
        };
        let mut link = transport.connect(&identity).await.unwrap();

        link.sender.join("#ebooks").await.unwrap();
        link.sender.privmsg("#ebooks", "@search x").await.unwrap();
        transport.ready().await;

        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Ready {
                nick: "fuubar".to_string()
            })
        );
        assert_eq!(transport.sent_privmsgs().await, vec!["@search x"]);
        assert_eq!(transport.identities().await, vec![identity]);
    }

    #[tokio::test]
    async fn test_quit_disconnects() {
        let transport = MockTransport::new();
        let identity = Identity {
            nick: "fuubar".to_string(),
            server: "localhost:6667".to_string(),
        };
        let mut link = transport.connect(&identity).await.unwrap();

        link.sender.quit("bye").await.unwrap();
        assert_eq!(
            link.events.recv().await,
            Some(TransportEvent::Disconnected {
                reason: Some("bye".to_string())
            })
        );
        // The event sender was dropped with the quit
        assert_eq!(link.events.recv().await, None);
    }

    #[tokio::test]
    async fn test_failing_connect() {
        let transport = MockTransport::failing();
        let identity = Identity {
            nick: "fuubar".to_string(),
            server: "localhost:6667".to_string(),
        };
        assert!(transport.connect(&identity).await.is_err());
    }
}
