//! IRC protocol line parsing.

/// CTCP messages are wrapped in `\x01` delimiters.
const CTCP_DELIMITER: char = '\x01';

/// A single parsed IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// Source prefix without the leading `:` (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command or three-digit numeric reply.
    pub command: String,
    /// Parameters, with the trailing parameter last.
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a line. Returns `None` for empty lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, tail) = stripped.split_once(' ')?;
                rest = tail;
                Some(prefix.to_string())
            }
            None => None,
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(String::from).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of the prefix.
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split(['!', '@']).next().unwrap_or(p))
    }

    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }
}

/// Remove CTCP framing, leaving e.g. `DCC SEND file ...`.
pub fn unwrap_ctcp(text: &str) -> &str {
    match text.strip_prefix(CTCP_DELIMITER) {
        Some(inner) => inner.strip_suffix(CTCP_DELIMITER).unwrap_or(inner),
        None => text,
    }
}

pub fn pong(token: &str) -> String {
    format!("PONG :{token}")
}

pub fn nick(nick: &str) -> String {
    format!("NICK {nick}")
}

pub fn user(nick: &str) -> String {
    format!("USER {nick} 0 * :{nick}")
}

pub fn join(channel: &str) -> String {
    format!("JOIN {channel}")
}

/// Build PRIVMSG lines. Embedded newlines would end the protocol line early,
/// so each line of `text` becomes its own message.
pub fn privmsg(target: &str, text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| format!("PRIVMSG {target} :{line}"))
        .collect()
}

pub fn quit(message: &str) -> String {
    format!("QUIT :{message}")
}
