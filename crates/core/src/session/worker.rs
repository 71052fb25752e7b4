//! Search request queue and worker.
//!
//! The worker waits for the one-shot readiness signal, then drains the queue
//! one request at a time. Each request becomes a fresh negotiation handed to
//! the coordinator; the next request is only dequeued once the previous
//! negotiation has an outcome, so at most one is ever active.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::negotiation::{Negotiation, NegotiationOutcome};

use super::types::{Command, PendingRequest};

/// Background task that feeds queued searches to the coordinator.
pub(crate) struct SearchWorker {
    ready: oneshot::Receiver<()>,
    requests: mpsc::UnboundedReceiver<PendingRequest>,
    commands: mpsc::UnboundedSender<Command>,
    timeout: Option<Duration>,
}

impl SearchWorker {
    pub(crate) fn new(
        ready: oneshot::Receiver<()>,
        requests: mpsc::UnboundedReceiver<PendingRequest>,
        commands: mpsc::UnboundedSender<Command>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            ready,
            requests,
            commands,
            timeout,
        }
    }

    /// Run the worker until the queue or the coordinator goes away.
    ///
    /// This should be spawned as a background task.
    pub(crate) async fn run(mut self) {
        info!("[worker] Waiting until connected...");
        if (&mut self.ready).await.is_err() {
            info!("[worker] Session ended before it was ready");
            return;
        }

        info!("[worker] Connected. Processing requests...");
        while let Some(request) = self.requests.recv().await {
            let Some(outcome) = self.process(request).await else {
                break;
            };
            info!(
                negotiation_id = %outcome.negotiation_id,
                query = %outcome.query,
                "[worker] Negotiation finished: {:?}",
                outcome.outcome
            );
        }

        info!("[worker] Shutting down");
    }

    /// Start one negotiation and wait for its outcome.
    ///
    /// Returns `None` once the coordinator has stopped.
    async fn process(&self, request: PendingRequest) -> Option<NegotiationOutcome> {
        let waited = Utc::now() - request.queued_at;
        let negotiation = Negotiation::new(request.query);
        let negotiation_id = negotiation.id();
        info!(
            negotiation_id = %negotiation_id,
            waited_ms = waited.num_milliseconds(),
            "[worker] Starting search \"{}\"",
            negotiation.query()
        );
        let (done_tx, mut done_rx) = oneshot::channel();

        self.commands
            .send(Command::Begin {
                negotiation,
                done: done_tx,
            })
            .ok()?;

        let Some(timeout) = self.timeout else {
            return done_rx.await.ok();
        };

        match tokio::time::timeout(timeout, &mut done_rx).await {
            Ok(outcome) => outcome.ok(),
            Err(_) => {
                warn!(
                    negotiation_id = %negotiation_id,
                    "[worker] No outcome after {:?}, abandoning",
                    timeout
                );
                self.commands
                    .send(Command::Abandon { negotiation_id })
                    .ok()?;
                done_rx.await.ok()
            }
        }
    }
}
