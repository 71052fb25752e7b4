//! Sender/recipient screening of inbound lines.

/// Identities that matter when screening a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningRules {
    /// This session's nick; lines addressed elsewhere are dropped.
    pub nick: String,
    /// The bot that answers `@search` requests and whose lines are classified.
    pub search_bot: String,
    /// Services bot whose notices are logged but never classified.
    pub registration_bot: String,
}

/// What to do with an inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    /// Hand the line to the classifier.
    Classify,
    /// Log the line, take no action.
    LogOnly,
    /// Drop the line without looking at its text.
    Ignore,
}

/// Screen a line by its sender and recipient.
///
/// `file_server` is the server named by the active download request, if any;
/// its replies are classified alongside the search bot's.
pub fn screen(
    rules: &ScreeningRules,
    file_server: Option<&str>,
    sender: &str,
    recipient: &str,
) -> Screening {
    if !recipient.eq_ignore_ascii_case(&rules.nick) {
        return Screening::Ignore;
    }

    let from_file_server = file_server.is_some_and(|server| sender.eq_ignore_ascii_case(server));
    if sender.eq_ignore_ascii_case(&rules.search_bot) || from_file_server {
        Screening::Classify
    } else if sender.eq_ignore_ascii_case(&rules.registration_bot)
        || sender.eq_ignore_ascii_case(&rules.nick)
    {
        Screening::LogOnly
    } else {
        Screening::Ignore
    }
}
