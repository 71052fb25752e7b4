use std::path::PathBuf;

use clap::Parser;

use bookit_core::Config;

/// Search IRC ebook channels and fetch files from the results.
#[derive(Debug, Parser)]
#[command(name = "bookit", version, about)]
pub struct Args {
    /// Nick to register with
    #[arg(long, env = "BOOKIT_NICK")]
    pub nick: Option<String>,

    /// Server address as host:port
    #[arg(long)]
    pub server: Option<String>,

    /// Channel to search in
    #[arg(long)]
    pub channel: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Results listing line to request once results are found,
    /// e.g. "!Oatmeal Margaret Atwood - Alias Grace.epub"
    #[arg(long)]
    pub request: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Search query
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
}

impl Args {
    pub fn query(&self) -> String {
        self.query.join(" ")
    }

    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(nick) = &self.nick {
            config.irc.nick = nick.clone();
        }
        if let Some(server) = &self.server {
            config.irc.server = server.clone();
        }
        if let Some(channel) = &self.channel {
            config.irc.channel = channel.clone();
        }
    }

    /// Default log filter when RUST_LOG is not set.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
