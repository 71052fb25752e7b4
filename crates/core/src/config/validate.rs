use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Nick is set and contains no whitespace
/// - Server address carries a port
/// - Channel name starts with `#` or `&`
/// - Bot names are set
/// - Negotiation timeout, if set, is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let irc = &config.irc;

    if irc.nick.is_empty() {
        return Err(invalid("irc.nick is required"));
    }
    if irc.nick.chars().any(char::is_whitespace) {
        return Err(invalid(format!(
            "irc.nick cannot contain whitespace: {:?}",
            irc.nick
        )));
    }

    match irc.server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p != 0) => {}
        _ => {
            return Err(invalid(format!(
                "irc.server must be host:port, got {:?}",
                irc.server
            )))
        }
    }

    if !(irc.channel.starts_with('#') || irc.channel.starts_with('&')) || irc.channel.len() < 2 {
        return Err(invalid(format!(
            "irc.channel must be a channel name, got {:?}",
            irc.channel
        )));
    }

    if config.bots.search.is_empty() || config.bots.registration.is_empty() {
        return Err(invalid("bots.search and bots.registration cannot be empty"));
    }

    if config.negotiation.timeout_secs == Some(0) {
        return Err(invalid("negotiation.timeout_secs cannot be 0"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.irc.nick = "fuubar".to_string();
        config
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_nick_fails() {
        let result = validate_config(&Config::default());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_nick_with_space_fails() {
        let mut config = valid_config();
        config.irc.nick = "fuu bar".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_server_without_port_fails() {
        for server in ["irc.irchighway.net", "irc.irchighway.net:", ":6667", "host:0"] {
            let mut config = valid_config();
            config.irc.server = server.to_string();
            assert!(validate_config(&config).is_err(), "{server}");
        }
    }

    #[test]
    fn test_validate_channel_name() {
        let mut config = valid_config();
        config.irc.channel = "ebooks".to_string();
        assert!(validate_config(&config).is_err());

        config.irc.channel = "#".to_string();
        assert!(validate_config(&config).is_err());

        config.irc.channel = "&local".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = valid_config();
        config.negotiation.timeout_secs = Some(0);
        assert!(validate_config(&config).is_err());

        config.negotiation.timeout_secs = Some(60);
        assert!(validate_config(&config).is_ok());
    }
}
