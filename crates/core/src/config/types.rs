use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::classifier::ScreeningRules;
use crate::transport::Identity;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub irc: IrcConfig,
    #[serde(default)]
    pub bots: BotsConfig,
    #[serde(default)]
    pub negotiation: NegotiationConfig,
}

impl Config {
    /// Identity used to register with the server.
    pub fn identity(&self) -> Identity {
        Identity {
            nick: self.irc.nick.clone(),
            server: self.irc.server.clone(),
        }
    }

    /// Rules for screening inbound lines by sender and recipient.
    pub fn screening_rules(&self) -> ScreeningRules {
        ScreeningRules {
            nick: self.irc.nick.clone(),
            search_bot: self.bots.search.clone(),
            registration_bot: self.bots.registration.clone(),
        }
    }
}

/// IRC connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IrcConfig {
    /// Nick to register with. Required.
    #[serde(default)]
    pub nick: String,
    /// Server address as `host:port`.
    #[serde(default = "default_server")]
    pub server: String,
    /// Channel the search bot listens in.
    #[serde(default = "default_channel")]
    pub channel: String,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            nick: String::new(),
            server: default_server(),
            channel: default_channel(),
        }
    }
}

fn default_server() -> String {
    "irc.irchighway.net:6667".to_string()
}

fn default_channel() -> String {
    "#ebooks".to_string()
}

/// Remote bot identities
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BotsConfig {
    /// Bot that answers `@search`.
    #[serde(default = "default_search_bot")]
    pub search: String,
    /// Services bot whose notices are logged only.
    #[serde(default = "default_registration_bot")]
    pub registration: String,
}

impl Default for BotsConfig {
    fn default() -> Self {
        Self {
            search: default_search_bot(),
            registration: default_registration_bot(),
        }
    }
}

fn default_search_bot() -> String {
    "SearchOok".to_string()
}

fn default_registration_bot() -> String {
    "ChanServ".to_string()
}

/// Negotiation configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NegotiationConfig {
    /// Abandon a negotiation that has not finished after this many seconds.
    /// Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl NegotiationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r##"
[irc]
nick = "fuubar"
server = "irc.example.net:6697"
channel = "#books"

[bots]
search = "Search"
registration = "NickServ"

[negotiation]
timeout_secs = 120
"##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.irc.nick, "fuubar");
        assert_eq!(config.irc.server, "irc.example.net:6697");
        assert_eq!(config.irc.channel, "#books");
        assert_eq!(config.bots.search, "Search");
        assert_eq!(config.bots.registration, "NickServ");
        assert_eq!(config.negotiation.timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let toml = r#"
[irc]
nick = "fuubar"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.irc.server, "irc.irchighway.net:6667");
        assert_eq!(config.irc.channel, "#ebooks");
        assert_eq!(config.bots.search, "SearchOok");
        assert_eq!(config.bots.registration, "ChanServ");
        assert_eq!(config.negotiation.timeout(), None);
    }

    #[test]
    fn test_identity_and_screening_rules() {
        let mut config = Config::default();
        config.irc.nick = "fuubar".to_string();

        let identity = config.identity();
        assert_eq!(identity.nick, "fuubar");
        assert_eq!(identity.server, "irc.irchighway.net:6667");

        let rules = config.screening_rules();
        assert_eq!(rules.nick, "fuubar");
        assert_eq!(rules.search_bot, "SearchOok");
        assert_eq!(rules.registration_bot, "ChanServ");
    }
}
