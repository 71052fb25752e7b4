//! Chat transport abstraction.
//!
//! The session only depends on the [`ChatTransport`] trait: connecting yields
//! an outbound [`ChatSender`] plus an ordered stream of [`TransportEvent`]s.
//! [`IrcTransport`] implements it over a plain TCP IRC connection.

mod irc;
mod message;
mod types;

pub use irc::IrcTransport;
pub use types::*;
