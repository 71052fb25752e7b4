//! Session coordinator.
//!
//! A single task owns the current-negotiation slot. Transport events and
//! commands from the worker and the caller are handled one at a time in
//! arrival order, so no locking is needed around the slot.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::classifier::{screen, Classification, LineClassifier, Screening, ScreeningRules};
use crate::config::Config;
use crate::negotiation::{
    transition, DownloadRequest, Negotiation, NegotiationError, NegotiationEvent,
    NegotiationOutcome, Outcome, Stage,
};
use crate::transport::{ChatSender, InboundMessage, MessageKind, TransportEvent};

use super::types::{Command, SessionError, SessionEvent};

/// Prefix of the outbound search command.
const SEARCH_COMMAND: &str = "@search";

/// The negotiation currently in flight.
struct ActiveNegotiation {
    negotiation: Negotiation,
    /// Nick of the file server a download was requested from.
    file_server: Option<String>,
    done: Option<oneshot::Sender<NegotiationOutcome>>,
}

/// One-shot signals fired by the coordinator.
pub(crate) struct Signals {
    pub(crate) ready: oneshot::Sender<()>,
    pub(crate) completion: oneshot::Sender<()>,
}

pub(crate) struct Coordinator {
    channel: String,
    rules: ScreeningRules,
    classifier: LineClassifier,
    sender: Arc<dyn ChatSender>,
    inbound: mpsc::Receiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<SessionEvent>,
    ready: Option<oneshot::Sender<()>>,
    completion: Option<oneshot::Sender<()>>,
    active: Option<ActiveNegotiation>,
}

impl Coordinator {
    pub(crate) fn new(
        config: &Config,
        sender: Arc<dyn ChatSender>,
        inbound: mpsc::Receiver<TransportEvent>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: broadcast::Sender<SessionEvent>,
        signals: Signals,
    ) -> Self {
        Self {
            channel: config.irc.channel.clone(),
            rules: config.screening_rules(),
            classifier: LineClassifier::new(config.bots.search.clone()),
            sender,
            inbound,
            commands,
            events,
            ready: Some(signals.ready),
            completion: Some(signals.completion),
            active: None,
        }
    }

    /// Run until the transport disconnects.
    ///
    /// This should be spawned as a background task.
    pub(crate) async fn run(mut self) {
        debug!("Session coordinator started");

        loop {
            tokio::select! {
                event = self.inbound.recv() => match event {
                    Some(TransportEvent::Ready { nick }) => {
                        if let Err(e) = self.on_ready(nick).await {
                            self.on_disconnect(Some(e.to_string()));
                            break;
                        }
                    }
                    Some(TransportEvent::Message(message)) => self.on_message(message),
                    Some(TransportEvent::Disconnected { reason }) => {
                        self.on_disconnect(reason);
                        break;
                    }
                    None => {
                        self.on_disconnect(Some("transport event stream ended".to_string()));
                        break;
                    }
                },
                Some(command) = self.commands.recv() => self.on_command(command).await,
            }
        }

        debug!("Session coordinator stopped");
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    /// Join the channel and open the readiness gate.
    ///
    /// A failed join ends the session; searches never go to a channel the
    /// bot is not in.
    async fn on_ready(&mut self, nick: String) -> Result<(), SessionError> {
        let Some(ready) = self.ready.take() else {
            warn!("Transport reported ready again; sessions are single-use, ignoring");
            return Ok(());
        };

        if !nick.eq_ignore_ascii_case(&self.rules.nick) {
            info!("Server registered us as {} instead of {}", nick, self.rules.nick);
            self.rules.nick = nick;
        }

        info!("Joining {}", self.channel);
        self.sender.join(&self.channel).await.map_err(|e| {
            error!("Failed to join {}: {}", self.channel, e);
            SessionError::Send(e)
        })?;

        let _ = ready.send(());
        self.emit(SessionEvent::Ready);
        Ok(())
    }

    fn on_message(&mut self, message: InboundMessage) {
        let file_server = self
            .active
            .as_ref()
            .and_then(|active| active.file_server.as_deref());

        let from = match message.kind {
            MessageKind::Privmsg => format!("[{}]", message.sender),
            MessageKind::Notice => format!("-{}-", message.sender),
        };

        match screen(&self.rules, file_server, &message.sender, &message.recipient) {
            Screening::Ignore => debug!("[irc] --"),
            Screening::LogOnly => info!("[irc] {} {}", from, message.text),
            Screening::Classify => {
                info!("[irc] {} {}", from, message.text);
                self.apply_line(&message.text);
            }
        }
    }

    fn on_disconnect(&mut self, reason: Option<String>) {
        info!("Disconnected: {}", reason.as_deref().unwrap_or("connection closed"));

        if self.active.is_some() {
            self.finish(Outcome::Failed(NegotiationError::Disconnected));
        }

        self.emit(SessionEvent::Disconnected { reason });
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(());
        }
    }

    /// Classify a screened line and apply it to the active negotiation.
    fn apply_line(&mut self, text: &str) {
        let Some(active) = self.active.as_mut() else {
            debug!("No active negotiation, ignoring line");
            return;
        };
        let Some(classification) = self.classifier.classify(&active.negotiation, text) else {
            return;
        };

        let negotiation = &mut active.negotiation;
        let negotiation_id = negotiation.id();
        let from = negotiation.stage();
        info!(
            negotiation_id = %negotiation_id,
            classification = classification.as_str(),
            "Classified line"
        );

        let result = match &classification {
            Classification::SearchAccepted => negotiation.accept(),
            Classification::ResultsFound { archive, .. } => {
                negotiation.found_results(archive.clone())
            }
            Classification::NoResults => negotiation.no_results(),
            Classification::ResultsListingOffered { archive } => {
                info!(negotiation_id = %negotiation_id, "Results listing offered: {}", archive);
                self.emit(SessionEvent::ResultsListingOffered {
                    negotiation_id,
                    archive: archive.clone(),
                });
                return;
            }
            Classification::FileRequestAccepted { .. } => negotiation.accept_download(),
            Classification::FileReceived { .. } => negotiation.sent_download(),
        };

        let to = match result {
            Ok(to) => to,
            Err(error) => {
                warn!(negotiation_id = %negotiation_id, "Ignoring out-of-order line: {}", error);
                self.emit(SessionEvent::TransitionRejected {
                    negotiation_id,
                    error,
                });
                return;
            }
        };

        info!(negotiation_id = %negotiation_id, "Stage {} -> {}", from, to);
        self.emit(SessionEvent::StageChanged {
            negotiation_id,
            from,
            to,
        });

        match classification {
            Classification::ResultsFound {
                archive, matches, ..
            } => self.emit(SessionEvent::ResultsFound {
                negotiation_id,
                archive,
                matches,
            }),
            Classification::NoResults => self.finish(Outcome::NoResults),
            Classification::FileReceived { file } => self.finish(Outcome::Delivered { file }),
            _ => {}
        }
    }

    /// Report the active negotiation's outcome and clear the slot.
    fn finish(&mut self, outcome: Outcome) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        let report = NegotiationOutcome::new(&active.negotiation, outcome);
        let elapsed = report.finished_at - active.negotiation.started_at();
        info!(
            negotiation_id = %report.negotiation_id,
            query = %report.query,
            stage = %active.negotiation.stage(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Negotiation finished: {:?}",
            report.outcome
        );

        if let Some(done) = active.done.take() {
            let _ = done.send(report.clone());
        }
        self.emit(SessionEvent::Finished(report));
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Begin { negotiation, done } => self.begin(negotiation, done).await,
            Command::Abandon { negotiation_id } => {
                let matches = self
                    .active
                    .as_ref()
                    .is_some_and(|active| active.negotiation.id() == negotiation_id);
                if matches {
                    self.finish(Outcome::Abandoned);
                }
            }
            Command::RequestFile { request, reply } => {
                let result = self.request_file(request).await;
                let _ = reply.send(result);
            }
            Command::Quit { reason } => {
                info!("Quitting: {}", reason);
                if let Err(e) = self.sender.quit(&reason).await {
                    error!("Failed to quit: {}", e);
                }
            }
        }
    }

    async fn begin(
        &mut self,
        mut negotiation: Negotiation,
        done: oneshot::Sender<NegotiationOutcome>,
    ) {
        if let Some(active) = self.active.as_ref().filter(|a| !a.negotiation.is_terminal()) {
            let error = NegotiationError::InProgress {
                query: active.negotiation.query().to_string(),
            };
            warn!("Refusing to start \"{}\": {}", negotiation.query(), error);
            let report = NegotiationOutcome::new(&negotiation, Outcome::Failed(error));
            let _ = done.send(report.clone());
            self.emit(SessionEvent::Finished(report));
            return;
        }

        let message = format!("{} {}", SEARCH_COMMAND, negotiation.query());
        info!("Sending message {}", message);
        if let Err(e) = self.sender.privmsg(&self.channel, &message).await {
            error!("Failed to send search: {}", e);
            let outcome = Outcome::Failed(NegotiationError::Transport(e.to_string()));
            let report = NegotiationOutcome::new(&negotiation, outcome);
            let _ = done.send(report.clone());
            self.emit(SessionEvent::Finished(report));
            return;
        }

        if let Err(e) = negotiation.submit() {
            error!("Fresh negotiation refused submit: {}", e);
        }

        self.emit(SessionEvent::SearchSubmitted {
            negotiation_id: negotiation.id(),
            query: negotiation.query().to_string(),
        });
        self.emit(SessionEvent::StageChanged {
            negotiation_id: negotiation.id(),
            from: Stage::Unstarted,
            to: negotiation.stage(),
        });

        self.active = Some(ActiveNegotiation {
            negotiation,
            file_server: None,
            done: Some(done),
        });
    }

    async fn request_file(&mut self, request: DownloadRequest) -> Result<(), SessionError> {
        let active = self
            .active
            .as_mut()
            .ok_or(SessionError::Negotiation(NegotiationError::NotActive))?;

        // Check before sending so a refused request never reaches the channel
        transition(active.negotiation.stage(), NegotiationEvent::RequestDownload)?;

        let message = request.command();
        info!("Sending message {}", message);
        self.sender
            .privmsg(&self.channel, &message)
            .await
            .map_err(SessionError::Send)?;

        let from = active.negotiation.stage();
        let to = active.negotiation.request_download(request.file())?;
        active.file_server = Some(request.server().to_string());

        let negotiation_id = active.negotiation.id();
        info!(negotiation_id = %negotiation_id, "Stage {} -> {}", from, to);
        self.emit(SessionEvent::StageChanged {
            negotiation_id,
            from,
            to,
        });
        Ok(())
    }
}
