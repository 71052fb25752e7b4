//! Download requests picked from a results listing.
//!
//! Results listings contain one line per file, in the form
//! `!Trigger Author - Title.epub  ::INFO:: 1.2MB`. Sending
//! `!Trigger Author - Title.epub` to the channel asks the file server named by
//! the trigger to queue that file.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const INFO_MARKER: &str = "::INFO::";

/// Errors that can occur when parsing a results listing line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadRequestError {
    #[error("download request must start with '!': {0}")]
    MissingTrigger(String),

    #[error("download request names no file: {0}")]
    MissingFile(String),
}

/// A file chosen from a results listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    trigger: String,
    file: String,
}

impl DownloadRequest {
    /// Parse a results listing line.
    pub fn parse(line: &str) -> Result<Self, DownloadRequestError> {
        let line = line.trim();
        if !line.starts_with('!') {
            return Err(DownloadRequestError::MissingTrigger(line.to_string()));
        }

        let (trigger, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| DownloadRequestError::MissingFile(line.to_string()))?;

        // Listing lines carry a size annotation that is not part of the name
        let file = match rest.find(INFO_MARKER) {
            Some(idx) => &rest[..idx],
            None => rest,
        }
        .trim();

        if trigger.len() < 2 || file.is_empty() {
            return Err(DownloadRequestError::MissingFile(line.to_string()));
        }

        Ok(Self {
            trigger: trigger.to_string(),
            file: file.to_string(),
        })
    }

    /// The file server trigger, including the leading `!`.
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Nick of the file server the trigger addresses.
    pub fn server(&self) -> &str {
        self.trigger.trim_start_matches('!')
    }

    /// The requested file name.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The line to send to the channel.
    pub fn command(&self) -> String {
        format!("{} {}", self.trigger, self.file)
    }
}

impl FromStr for DownloadRequest {
    type Err = DownloadRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.trigger, self.file)
    }
}
