//! Plain-TCP IRC transport.
//!
//! One reader task turns protocol lines into [`TransportEvent`]s and answers
//! server pings; one writer task owns the write half and drains an unbounded
//! queue of outbound lines.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::message::{self, unwrap_ctcp, IrcMessage};
use super::{
    ChatSender, ChatTransport, Identity, InboundMessage, MessageKind, TransportError,
    TransportEvent, TransportLink,
};

/// Buffer size for the inbound event channel.
const EVENT_BUFFER: usize = 256;

/// Nick changes tried after a collision before giving up.
const MAX_NICK_RETRIES: u32 = 3;

/// RPL_WELCOME, sent once registration succeeds.
const RPL_WELCOME: &str = "001";
/// ERR_NICKNAMEINUSE.
const ERR_NICKNAMEINUSE: &str = "433";

/// IRC transport over a plain TCP connection.
#[derive(Debug, Clone, Default)]
pub struct IrcTransport;

impl IrcTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatTransport for IrcTransport {
    fn name(&self) -> &str {
        "irc"
    }

    async fn connect(&self, identity: &Identity) -> Result<TransportLink, TransportError> {
        info!("Connecting to {}", identity.server);
        let stream = TcpStream::connect(&identity.server)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", identity.server, e)))?;

        let (read_half, write_half) = stream.into_split();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(write_loop(write_half, line_rx));

        let sender = IrcSender { tx: line_tx };
        sender.send_line(message::nick(&identity.nick))?;
        sender.send_line(message::user(&identity.nick))?;

        let registration = Registration::new(&identity.nick);
        tokio::spawn(read_loop(read_half, sender.clone(), registration, event_tx));

        Ok(TransportLink {
            sender: Arc::new(sender),
            events: event_rx,
        })
    }
}

/// Outbound half of an IRC connection.
#[derive(Debug, Clone)]
struct IrcSender {
    tx: mpsc::UnboundedSender<String>,
}

impl IrcSender {
    fn send_line(&self, line: String) -> Result<(), TransportError> {
        debug!("[irc] >> {}", line);
        self.tx.send(line).map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl ChatSender for IrcSender {
    async fn join(&self, channel: &str) -> Result<(), TransportError> {
        self.send_line(message::join(channel))
    }

    async fn privmsg(&self, target: &str, text: &str) -> Result<(), TransportError> {
        for line in message::privmsg(target, text) {
            self.send_line(line)?;
        }
        Ok(())
    }

    async fn quit(&self, reason: &str) -> Result<(), TransportError> {
        self.send_line(message::quit(reason))
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(mut line) = rx.recv().await {
        line.push_str("\r\n");
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!("[irc] Write failed: {}", e);
            break;
        }
    }
    debug!("[irc] Writer shutting down");
}

/// Nick negotiation state while registering.
#[derive(Debug)]
struct Registration {
    nick: String,
    retries: u32,
}

impl Registration {
    fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            retries: 0,
        }
    }

    /// Pick the next nick after a collision, or `None` once out of retries.
    fn next_nick(&mut self) -> Option<&str> {
        if self.retries >= MAX_NICK_RETRIES {
            return None;
        }
        self.retries += 1;
        self.nick.push('_');
        Some(&self.nick)
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    sender: IrcSender,
    mut registration: Registration,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(512);

    let reason = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break None,
            Ok(_) => {}
            Err(e) => break Some(e.to_string()),
        }

        // Not every client sends UTF-8
        let line = String::from_utf8_lossy(&buf);
        let Some(msg) = IrcMessage::parse(&line) else {
            continue;
        };

        let event = match handle_message(&msg, &sender, &mut registration) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => break Some(e.to_string()),
        };

        if events.send(event).await.is_err() {
            debug!("[irc] Event receiver dropped");
            return;
        }
    };

    info!("[irc] Disconnected");
    let _ = events.send(TransportEvent::Disconnected { reason }).await;
}

fn handle_message(
    msg: &IrcMessage,
    sender: &IrcSender,
    registration: &mut Registration,
) -> Result<Option<TransportEvent>, TransportError> {
    match msg.command.as_str() {
        "PING" => {
            sender.send_line(message::pong(msg.param(0).unwrap_or_default()))?;
            Ok(None)
        }
        RPL_WELCOME => {
            // The first parameter is the nick the server registered
            let nick = msg.param(0).unwrap_or(registration.nick.as_str()).to_string();
            info!("[irc] Registered as {}", nick);
            Ok(Some(TransportEvent::Ready { nick }))
        }
        ERR_NICKNAMEINUSE => {
            let taken = msg.param(1).unwrap_or("?").to_string();
            let Some(nick) = registration.next_nick() else {
                return Err(TransportError::ConnectionFailed(format!(
                    "nick {taken} is already in use"
                )));
            };
            warn!("[irc] Nick {} is already in use, trying {}", taken, nick);
            sender.send_line(message::nick(nick))?;
            Ok(None)
        }
        "ERROR" => {
            warn!("[irc] Server error: {}", msg.param(0).unwrap_or_default());
            Ok(None)
        }
        "PRIVMSG" | "NOTICE" => {
            let kind = if msg.command == "PRIVMSG" {
                MessageKind::Privmsg
            } else {
                MessageKind::Notice
            };
            let (Some(recipient), Some(text)) = (msg.param(0), msg.param(1)) else {
                return Ok(None);
            };
            Ok(Some(TransportEvent::Message(InboundMessage {
                kind,
                sender: msg.nick().unwrap_or_default().to_string(),
                recipient: recipient.to_string(),
                text: unwrap_ctcp(text).to_string(),
            })))
        }
        _ => Ok(None),
    }
}
