//! Session types: errors, caller-visible events and internal commands.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::negotiation::{
    DownloadRequest, InvalidTransition, Negotiation, NegotiationError, NegotiationOutcome, Stage,
};
use crate::transport::TransportError;

/// Errors returned by [`Session`](super::Session) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    Connection(#[source] TransportError),

    #[error("Send failed: {0}")]
    Send(#[source] TransportError),

    #[error("Session is already connected")]
    AlreadyConnected,

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is closed")]
    Closed,

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
}

impl From<InvalidTransition> for SessionError {
    fn from(err: InvalidTransition) -> Self {
        SessionError::Negotiation(NegotiationError::InvalidTransition(err))
    }
}

/// A caller-issued search waiting for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub query: String,
    pub queued_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            queued_at: Utc::now(),
        }
    }
}

/// Progress notifications broadcast to session subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The channel was joined and queued searches may start.
    Ready,
    /// `@search` was sent for a negotiation.
    SearchSubmitted { negotiation_id: Uuid, query: String },
    /// A negotiation moved between stages.
    StageChanged {
        negotiation_id: Uuid,
        from: Stage,
        to: Stage,
    },
    /// The search bot found matches. A file can now be requested.
    ResultsFound {
        negotiation_id: Uuid,
        archive: String,
        matches: u32,
    },
    /// The results listing is being offered over DCC.
    ResultsListingOffered { negotiation_id: Uuid, archive: String },
    /// A recognised line arrived out of order and was not applied.
    TransitionRejected {
        negotiation_id: Uuid,
        error: InvalidTransition,
    },
    /// A negotiation ended.
    Finished(NegotiationOutcome),
    /// The transport went away; the session is over.
    Disconnected { reason: Option<String> },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::Ready => "ready",
            SessionEvent::SearchSubmitted { .. } => "search_submitted",
            SessionEvent::StageChanged { .. } => "stage_changed",
            SessionEvent::ResultsFound { .. } => "results_found",
            SessionEvent::ResultsListingOffered { .. } => "results_listing_offered",
            SessionEvent::TransitionRejected { .. } => "transition_rejected",
            SessionEvent::Finished(_) => "finished",
            SessionEvent::Disconnected { .. } => "disconnected",
        }
    }
}

/// Requests handled by the coordinator task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Start `negotiation`; its outcome is reported on `done`.
    Begin {
        negotiation: Negotiation,
        done: oneshot::Sender<NegotiationOutcome>,
    },
    /// Give up on a negotiation that has not finished in time.
    Abandon { negotiation_id: Uuid },
    /// Request a file from the active negotiation's results.
    RequestFile {
        request: DownloadRequest,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Leave the server.
    Quit { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::NegotiationEvent;

    #[test]
    fn test_invalid_transition_converts_to_session_error() {
        let err = crate::negotiation::transition(Stage::Accepted, NegotiationEvent::RequestDownload)
            .unwrap_err();
        let session_err = SessionError::from(err.clone());
        assert!(matches!(
            session_err,
            SessionError::Negotiation(NegotiationError::InvalidTransition(ref e)) if *e == err
        ));
        assert_eq!(session_err.to_string(), err.to_string());
    }

    #[test]
    fn test_event_type_strings() {
        assert_eq!(SessionEvent::Ready.event_type(), "ready");
        assert_eq!(
            SessionEvent::Disconnected { reason: None }.event_type(),
            "disconnected"
        );
    }
}
