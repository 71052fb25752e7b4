//! Testing utilities: a mock transport and canned bot lines.

mod mock_transport;

pub use mock_transport::{MockTransport, SentCommand};

/// Canned search bot and file server lines.
pub mod fixtures {
    use crate::classifier::results_archive_name;

    /// Default search bot nick.
    pub const SEARCH_BOT: &str = "SearchOok";

    pub fn search_accepted(query: &str) -> String {
        format!("<<SearchBot>> Your search for \"{query}\" has been accepted. Searching...")
    }

    /// Results line with mIRC color codes, as the bot sends it.
    pub fn results_found(query: &str, matches: u32) -> String {
        format!(
            "\x0304,99<<SearchBot>> Your search for \"{query}\" returned {matches} matches. Sending results to you as {}. Search took 0.67 seconds.",
            results_archive_name(SEARCH_BOT, query)
        )
    }

    pub fn no_results(query: &str) -> String {
        format!("Sorry, your search for \"{query}\" returned no matches. Try a different search.")
    }

    pub fn results_listing_offer(query: &str) -> String {
        format!(
            "DCC Send {} 3232235777 5000 1234",
            results_archive_name(SEARCH_BOT, query)
        )
    }

    pub fn request_accepted(file: &str) -> String {
        format!("** Request Accepted * File: {file} * Queue Position: 1")
    }

    pub fn file_offer(file: &str) -> String {
        format!("DCC SEND \"{file}\" 3232235777 5000 612300")
    }
}
