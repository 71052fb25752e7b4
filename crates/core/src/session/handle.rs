use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::info;

use crate::config::Config;
use crate::negotiation::DownloadRequest;
use crate::transport::ChatTransport;

use super::coordinator::{Coordinator, Signals};
use super::types::{Command, PendingRequest, SessionError, SessionEvent};
use super::worker::SearchWorker;

/// Capacity of the session event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Caller-facing handle for one bot session.
///
/// Searches may be queued before [`connect`](Session::connect); they start in
/// FIFO order once the server has welcomed the bot.
pub struct Session {
    config: Config,
    requests_tx: mpsc::UnboundedSender<PendingRequest>,
    requests_rx: Option<mpsc::UnboundedReceiver<PendingRequest>>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: Option<mpsc::UnboundedReceiver<Command>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            config,
            requests_tx,
            requests_rx: Some(requests_rx),
            commands_tx,
            commands_rx: Some(commands_rx),
            events,
        }
    }

    /// Subscribe to session progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.commands_rx.is_none()
    }

    /// Connect through `transport` and start the background tasks.
    ///
    /// `completion` fires once the connection is gone. A session connects at
    /// most once; a failed connect may be retried.
    pub async fn connect<T>(
        &mut self,
        transport: &T,
        completion: oneshot::Sender<()>,
    ) -> Result<(), SessionError>
    where
        T: ChatTransport + ?Sized,
    {
        if self.is_connected() {
            return Err(SessionError::AlreadyConnected);
        }

        let identity = self.config.identity();
        info!(
            "Connecting to {} as {} via {}",
            identity.server,
            identity.nick,
            transport.name()
        );
        let link = transport
            .connect(&identity)
            .await
            .map_err(SessionError::Connection)?;

        let (Some(requests), Some(commands)) = (self.requests_rx.take(), self.commands_rx.take())
        else {
            return Err(SessionError::AlreadyConnected);
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let coordinator = Coordinator::new(
            &self.config,
            link.sender,
            link.events,
            commands,
            self.events.clone(),
            Signals {
                ready: ready_tx,
                completion,
            },
        );
        let worker = SearchWorker::new(
            ready_rx,
            requests,
            self.commands_tx.clone(),
            self.config.negotiation.timeout(),
        );

        tokio::spawn(coordinator.run());
        tokio::spawn(worker.run());
        Ok(())
    }

    /// Queue a search. It runs once the session is ready and every earlier
    /// search has finished.
    pub fn search_book(&self, query: impl Into<String>) {
        let request = PendingRequest::new(query);
        info!("Queued search request '{}'", request.query);
        // The receiver lives as long as the worker; a closed queue only
        // means the session is over.
        let _ = self.requests_tx.send(request);
    }

    /// Ask a file server for a file from the active negotiation's results.
    pub async fn request_file(&self, request: DownloadRequest) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands_tx
            .send(Command::RequestFile {
                request,
                reply: reply_tx,
            })
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Leave the server. The completion signal fires once the transport
    /// reports the disconnect.
    pub fn quit(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.commands_tx
            .send(Command::Quit {
                reason: reason.into(),
            })
            .map_err(|_| SessionError::Closed)
    }
}
