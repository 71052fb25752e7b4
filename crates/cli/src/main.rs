mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::signal;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookit_core::{
    load_config, validate_config, DownloadRequest, IrcTransport, Outcome, Session, SessionEvent,
};

use cli::Args;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the session ended successfully.
async fn run() -> Result<bool> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    validate_config(&config).context("Configuration validation failed")?;

    let request = args
        .request
        .as_deref()
        .map(DownloadRequest::parse)
        .transpose()
        .context("Invalid --request")?;

    println!("{} => Using nick: '{}'", "bookit".green(), config.irc.nick);

    let mut session = Session::new(config);
    let mut events = session.subscribe();
    let (completion_tx, mut completion) = oneshot::channel();

    session
        .connect(&IrcTransport::new(), completion_tx)
        .await
        .context("Failed to connect")?;
    session.search_book(args.query());

    // Only the first verdict counts
    let mut verdict: Option<bool> = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if verdict.is_some() => {
                    info!("Session event after finishing: {}", event.event_type());
                }
                Ok(event) => {
                    if let Some(done) = handle_event(&session, request.as_ref(), event).await {
                        verdict = Some(done);
                        if let Err(e) = session.quit("bookit done") {
                            warn!("Failed to quit cleanly: {}", e);
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} session events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut completion => break,
            _ = signal::ctrl_c() => {
                info!("Interrupted, quitting");
                if session.quit("interrupted").is_err() {
                    break;
                }
            }
        }
    }

    Ok(verdict.unwrap_or(false))
}

/// React to one session event.
///
/// Returns `Some(success)` once the run is over and the bot should quit.
async fn handle_event(
    session: &Session,
    request: Option<&DownloadRequest>,
    event: SessionEvent,
) -> Option<bool> {
    match event {
        SessionEvent::ResultsFound {
            archive, matches, ..
        } => {
            println!(
                "{} {} matches, listing sent as {}",
                "results:".green().bold(),
                matches,
                archive.bold()
            );

            let Some(request) = request else {
                println!("Pick a line from the listing and run again with --request");
                return Some(true);
            };

            println!("{} {}", "requesting:".cyan().bold(), request);
            match session.request_file(request.clone()).await {
                Ok(()) => None,
                Err(e) => {
                    eprintln!("{} {}", "request failed:".red().bold(), e);
                    Some(false)
                }
            }
        }
        SessionEvent::Finished(report) => {
            match &report.outcome {
                Outcome::Delivered { file } => {
                    println!("{} {}", "offered:".green().bold(), file)
                }
                Outcome::NoResults => println!(
                    "{} nothing found for \"{}\"",
                    "no results:".yellow().bold(),
                    report.query
                ),
                Outcome::Abandoned => println!(
                    "{} no reply for \"{}\"",
                    "timed out:".yellow().bold(),
                    report.query
                ),
                Outcome::Failed(e) => eprintln!("{} {}", "failed:".red().bold(), e),
            }
            Some(report.outcome.is_success())
        }
        SessionEvent::Disconnected { reason } => {
            if let Some(reason) = reason {
                info!("Server closed the connection: {}", reason);
            }
            None
        }
        _ => None,
    }
}
