//! Core negotiation types and the transition table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Stages and events
// ============================================================================

/// Position of a negotiation in its fixed progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing has been sent yet.
    Unstarted,
    /// `@search` was sent to the channel.
    Submitted,
    /// The search bot acknowledged the query.
    Accepted,
    /// The search bot found matches and is sending a results archive.
    ResultsFound,
    /// The search bot found nothing. Terminal.
    ResultsNotFound,
    /// A specific file was requested from a file server.
    DownloadRequestSubmitted,
    /// The file server queued the request.
    DownloadRequestAccepted,
    /// The file server offered the requested file. Terminal.
    DownloadSent,
}

impl Stage {
    /// Returns true if no further event can succeed from this stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::ResultsNotFound | Stage::DownloadSent)
    }

    /// Returns the string representation used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Unstarted => "unstarted",
            Stage::Submitted => "submitted",
            Stage::Accepted => "accepted",
            Stage::ResultsFound => "results_found",
            Stage::ResultsNotFound => "results_not_found",
            Stage::DownloadRequestSubmitted => "download_request_submitted",
            Stage::DownloadRequestAccepted => "download_request_accepted",
            Stage::DownloadSent => "download_sent",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move a negotiation between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationEvent {
    Submit,
    Accept,
    FoundResults,
    NoResults,
    RequestDownload,
    AcceptDownload,
    SentDownload,
}

impl NegotiationEvent {
    /// All events, in table order.
    pub const ALL: [NegotiationEvent; 7] = [
        NegotiationEvent::Submit,
        NegotiationEvent::Accept,
        NegotiationEvent::FoundResults,
        NegotiationEvent::NoResults,
        NegotiationEvent::RequestDownload,
        NegotiationEvent::AcceptDownload,
        NegotiationEvent::SentDownload,
    ];

    /// Stages this event may be fired from.
    pub fn allowed_sources(&self) -> &'static [Stage] {
        match self {
            NegotiationEvent::Submit => &[Stage::Unstarted],
            NegotiationEvent::Accept => &[Stage::Submitted],
            NegotiationEvent::FoundResults => &[Stage::Accepted],
            NegotiationEvent::NoResults => &[Stage::Accepted],
            NegotiationEvent::RequestDownload => &[Stage::ResultsFound],
            NegotiationEvent::AcceptDownload => &[Stage::DownloadRequestSubmitted],
            NegotiationEvent::SentDownload => &[Stage::DownloadRequestAccepted],
        }
    }

    /// Stage reached when the event succeeds.
    pub fn destination(&self) -> Stage {
        match self {
            NegotiationEvent::Submit => Stage::Submitted,
            NegotiationEvent::Accept => Stage::Accepted,
            NegotiationEvent::FoundResults => Stage::ResultsFound,
            NegotiationEvent::NoResults => Stage::ResultsNotFound,
            NegotiationEvent::RequestDownload => Stage::DownloadRequestSubmitted,
            NegotiationEvent::AcceptDownload => Stage::DownloadRequestAccepted,
            NegotiationEvent::SentDownload => Stage::DownloadSent,
        }
    }

    /// Returns the string representation used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationEvent::Submit => "submit",
            NegotiationEvent::Accept => "accept",
            NegotiationEvent::FoundResults => "found_results",
            NegotiationEvent::NoResults => "no_results",
            NegotiationEvent::RequestDownload => "request_download",
            NegotiationEvent::AcceptDownload => "accept_download",
            NegotiationEvent::SentDownload => "sent_download",
        }
    }
}

impl fmt::Display for NegotiationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event was fired from a stage that does not permit it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {event} in stage {stage} (allowed from: {sources})", sources = join_stages(.allowed_sources))]
pub struct InvalidTransition {
    pub stage: Stage,
    pub event: NegotiationEvent,
    pub allowed_sources: &'static [Stage],
}

fn join_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(Stage::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compute the stage reached by firing `event` from `stage`.
pub fn transition(stage: Stage, event: NegotiationEvent) -> Result<Stage, InvalidTransition> {
    let allowed_sources = event.allowed_sources();
    if allowed_sources.contains(&stage) {
        Ok(event.destination())
    } else {
        Err(InvalidTransition {
            stage,
            event,
            allowed_sources,
        })
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// One search-to-download exchange with the search bot.
#[derive(Debug, Clone)]
pub struct Negotiation {
    id: Uuid,
    query: String,
    requested_file: Option<String>,
    results_archive: Option<String>,
    stage: Stage,
    started_at: DateTime<Utc>,
}

impl Negotiation {
    /// Create an unstarted negotiation for `query`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            requested_file: None,
            results_archive: None,
            stage: Stage::Unstarted,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn requested_file(&self) -> Option<&str> {
        self.requested_file.as_deref()
    }

    pub fn results_archive(&self) -> Option<&str> {
        self.results_archive.as_deref()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Fire an event. On failure the stage is left unchanged.
    pub fn fire(&mut self, event: NegotiationEvent) -> Result<Stage, InvalidTransition> {
        let next = transition(self.stage, event)?;
        self.stage = next;
        Ok(next)
    }

    pub fn submit(&mut self) -> Result<Stage, InvalidTransition> {
        self.fire(NegotiationEvent::Submit)
    }

    pub fn accept(&mut self) -> Result<Stage, InvalidTransition> {
        self.fire(NegotiationEvent::Accept)
    }

    /// Record that results were found, remembering the archive they are sent as.
    pub fn found_results(
        &mut self,
        archive: impl Into<String>,
    ) -> Result<Stage, InvalidTransition> {
        let stage = self.fire(NegotiationEvent::FoundResults)?;
        self.results_archive = Some(archive.into());
        Ok(stage)
    }

    pub fn no_results(&mut self) -> Result<Stage, InvalidTransition> {
        self.fire(NegotiationEvent::NoResults)
    }

    /// Record that `file` was requested. The file is only stored on success.
    pub fn request_download(
        &mut self,
        file: impl Into<String>,
    ) -> Result<Stage, InvalidTransition> {
        let stage = self.fire(NegotiationEvent::RequestDownload)?;
        self.requested_file = Some(file.into());
        Ok(stage)
    }

    pub fn accept_download(&mut self) -> Result<Stage, InvalidTransition> {
        self.fire(NegotiationEvent::AcceptDownload)
    }

    pub fn sent_download(&mut self) -> Result<Stage, InvalidTransition> {
        self.fire(NegotiationEvent::SentDownload)
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Errors that end or block a negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("negotiation for \"{query}\" is still in progress")]
    InProgress { query: String },

    #[error("no negotiation is active")]
    NotActive,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport disconnected")]
    Disconnected,
}

/// How a negotiation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The requested file was offered over DCC.
    Delivered { file: String },
    /// The search bot found nothing for the query.
    NoResults,
    /// No terminal stage was reached before the negotiation timeout.
    Abandoned,
    /// The negotiation could not continue.
    Failed(NegotiationError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Delivered { .. })
    }
}

/// Final report for one negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationOutcome {
    pub negotiation_id: Uuid,
    pub query: String,
    pub outcome: Outcome,
    pub finished_at: DateTime<Utc>,
}

impl NegotiationOutcome {
    pub fn new(negotiation: &Negotiation, outcome: Outcome) -> Self {
        Self {
            negotiation_id: negotiation.id(),
            query: negotiation.query().to_string(),
            outcome,
            finished_at: Utc::now(),
        }
    }
}
