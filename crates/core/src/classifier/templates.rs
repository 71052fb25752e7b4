//! Search bot message templates.
//!
//! Each template is compiled once with capture groups for the parts that vary
//! per negotiation (query, archive, file name). Captures are compared with the
//! active negotiation's values after matching, so user-supplied queries never
//! end up inside a pattern.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use tracing::{debug, warn};

use crate::negotiation::{Negotiation, NegotiationEvent};

use super::format::strip_formatting;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("template pattern is valid")
}

static SEARCH_ACCEPTED: Lazy<Regex> = Lazy::new(|| {
    compile(r#"<<SearchBot>> Your search for "(?P<query>.*)" has been accepted\. Searching\.\.\."#)
});

static RESULTS_FOUND: Lazy<Regex> = Lazy::new(|| {
    compile(
        r#"<<SearchBot>> Your search for "(?P<query>.*)" returned (?P<matches>\d+) matches\. Sending results to you as (?P<archive>.+\.txt\.zip)\. Search took (?P<secs>\d+\.\d+) seconds\."#,
    )
});

static NO_RESULTS: Lazy<Regex> =
    Lazy::new(|| compile(r#"Sorry, your search for "(?P<query>.*)" returned no matches"#));

static DCC_SEND: Lazy<Regex> = Lazy::new(|| compile(r"(?i)DCC Send (?P<offer>.+)"));

static REQUEST_ACCEPTED: Lazy<Regex> =
    Lazy::new(|| compile(r"Request Accepted\W*File: (?P<file>.+)"));

/// Name of the archive the search bot sends results as.
pub fn results_archive_name(search_bot: &str, query: &str) -> String {
    format!("{search_bot}_results_for_ {query}.txt.zip")
}

/// A recognised search bot or file server message.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The search was accepted and is running.
    SearchAccepted,
    /// The search matched files; the listing is sent as `archive`.
    ResultsFound {
        archive: String,
        matches: u32,
        elapsed_secs: f64,
    },
    /// The search matched nothing.
    NoResults,
    /// The results listing archive is being offered over DCC.
    ResultsListingOffered { archive: String },
    /// The file server queued the requested file.
    FileRequestAccepted { file: String },
    /// The requested file is being offered over DCC.
    FileReceived { file: String },
}

impl Classification {
    /// State machine event fired by this classification, if any.
    ///
    /// The results listing offer does not move the negotiation; fetching the
    /// listing happens outside the negotiation.
    pub fn event(&self) -> Option<NegotiationEvent> {
        match self {
            Classification::SearchAccepted => Some(NegotiationEvent::Accept),
            Classification::ResultsFound { .. } => Some(NegotiationEvent::FoundResults),
            Classification::NoResults => Some(NegotiationEvent::NoResults),
            Classification::ResultsListingOffered { .. } => None,
            Classification::FileRequestAccepted { .. } => Some(NegotiationEvent::AcceptDownload),
            Classification::FileReceived { .. } => Some(NegotiationEvent::SentDownload),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::SearchAccepted => "search_accepted",
            Classification::ResultsFound { .. } => "results_found",
            Classification::NoResults => "no_results",
            Classification::ResultsListingOffered { .. } => "results_listing_offered",
            Classification::FileRequestAccepted { .. } => "file_request_accepted",
            Classification::FileReceived { .. } => "file_received",
        }
    }
}

/// Matches inbound text against the templates of an active negotiation.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    search_bot: String,
}

impl LineClassifier {
    /// Create a classifier for results sent by `search_bot`.
    pub fn new(search_bot: impl Into<String>) -> Self {
        Self {
            search_bot: search_bot.into(),
        }
    }

    /// Classify a raw line. Returns `None` for lines that match no template.
    pub fn classify(&self, negotiation: &Negotiation, line: &str) -> Option<Classification> {
        let text = strip_formatting(line);
        let classification = self.match_templates(negotiation, &text);
        if classification.is_none() {
            debug!(
                negotiation_id = %negotiation.id(),
                text = %text,
                "Line matched no template"
            );
        }
        classification
    }

    fn match_templates(&self, negotiation: &Negotiation, text: &str) -> Option<Classification> {
        let query = negotiation.query();

        if captures_query(&SEARCH_ACCEPTED, text, query).is_some() {
            return Some(Classification::SearchAccepted);
        }

        let archive = results_archive_name(&self.search_bot, query);

        if let Some(caps) = captures_query(&RESULTS_FOUND, text, query) {
            if caps.name("archive").map(|m| m.as_str()) == Some(archive.as_str()) {
                return Some(Classification::ResultsFound {
                    matches: match_count(&caps),
                    elapsed_secs: parse_capture(&caps, "secs").unwrap_or(0.0),
                    archive,
                });
            }
        }

        if captures_query(&NO_RESULTS, text, query).is_some() {
            return Some(Classification::NoResults);
        }

        if dcc_offer_names(text, &archive) {
            return Some(Classification::ResultsListingOffered { archive });
        }

        let file = negotiation.requested_file()?;

        let request_accepted = REQUEST_ACCEPTED
            .captures(text)
            .and_then(|caps| caps.name("file"))
            .is_some_and(|m| names_file(m.as_str(), file));
        if request_accepted {
            return Some(Classification::FileRequestAccepted {
                file: file.to_string(),
            });
        }

        if dcc_offer_names(text, file) {
            return Some(Classification::FileReceived {
                file: file.to_string(),
            });
        }

        None
    }
}

/// Match `regex` and require its `query` capture to equal `query`.
fn captures_query<'t>(regex: &Regex, text: &'t str, query: &str) -> Option<Captures<'t>> {
    regex
        .captures(text)
        .filter(|caps| caps.name("query").map(|m| m.as_str()) == Some(query))
}

fn parse_capture<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// The `matches` capture is all digits, so parsing only fails on overflow.
fn match_count(caps: &Captures<'_>) -> u32 {
    let raw = caps.name("matches").map_or("", |m| m.as_str());
    raw.parse().unwrap_or_else(|_| {
        warn!(matches = raw, "Match count out of range, saturating");
        u32::MAX
    })
}

fn dcc_offer_names(text: &str, file: &str) -> bool {
    DCC_SEND
        .captures(text)
        .and_then(|caps| caps.name("offer"))
        .is_some_and(|m| names_file(m.as_str(), file))
}

/// True if `text` starts with `file`, bare or quoted, followed by a word break.
fn names_file(text: &str, file: &str) -> bool {
    let text = text.trim_start();
    let rest = match text.strip_prefix('"') {
        Some(quoted) => quoted.strip_prefix(file).and_then(|r| r.strip_prefix('"')),
        None => text.strip_prefix(file),
    };
    rest.is_some_and(|r| r.is_empty() || r.starts_with(char::is_whitespace))
}
