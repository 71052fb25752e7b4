//! Session lifecycle integration tests.
//!
//! These tests drive a session end to end over the mock transport:
//! connect -> ready -> search -> results -> file request -> delivery

use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio_test::{assert_err, assert_ok};

use bookit_core::{
    testing::{fixtures, MockTransport, SentCommand},
    Config, DownloadRequest, NegotiationError, NegotiationOutcome, Outcome, Session,
    SessionError, SessionEvent, Stage,
};

const NICK: &str = "fuubar";

/// Test helper holding a connected session and its mock transport.
struct TestHarness {
    session: Session,
    transport: MockTransport,
    events: broadcast::Receiver<SessionEvent>,
    completion: oneshot::Receiver<()>,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    async fn with_config(config: Config) -> Self {
        let mut session = Session::new(config);
        let events = session.subscribe();
        let transport = MockTransport::new();
        let (completion_tx, completion) = oneshot::channel();
        session
            .connect(&transport, completion_tx)
            .await
            .expect("Failed to connect");

        Self {
            session,
            transport,
            events,
            completion,
        }
    }

    async fn say(&self, sender: &str, text: &str) {
        self.transport.message(sender, NICK, text).await;
    }

    async fn next_event(&mut self) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("Timed out waiting for session event")
            .expect("Event channel closed")
    }

    /// Skip events until one of `event_type` arrives.
    async fn wait_for(&mut self, event_type: &str) -> SessionEvent {
        loop {
            let event = self.next_event().await;
            if event.event_type() == event_type {
                return event;
            }
        }
    }

    async fn wait_for_finished(&mut self) -> NegotiationOutcome {
        match self.wait_for("finished").await {
            SessionEvent::Finished(outcome) => outcome,
            other => panic!("Expected finished, got {other:?}"),
        }
    }

    async fn wait_for_stage(&mut self, stage: Stage) {
        loop {
            if let SessionEvent::StageChanged { to, .. } = self.wait_for("stage_changed").await {
                if to == stage {
                    return;
                }
            }
        }
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.irc.nick = NICK.to_string();
    config
}

#[tokio::test]
async fn test_searches_wait_for_ready_then_run_in_order() {
    let mut harness = TestHarness::new().await;
    let queries = ["alias grace", "japan at war", "the blind assassin"];
    for query in queries {
        harness.session.search_book(query);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.transport.sent_privmsgs().await.is_empty());

    harness.transport.ready().await;

    for query in queries {
        harness.wait_for("search_submitted").await;
        // Only the current search has been sent
        let sent = harness.transport.sent_privmsgs().await;
        assert_eq!(sent.last(), Some(&format!("@search {query}")));

        harness
            .say(fixtures::SEARCH_BOT, &fixtures::search_accepted(query))
            .await;
        harness
            .say(fixtures::SEARCH_BOT, &fixtures::no_results(query))
            .await;
        let outcome = harness.wait_for_finished().await;
        assert_eq!(outcome.query, query);
        assert_eq!(outcome.outcome, Outcome::NoResults);
    }

    let expected: Vec<String> = queries.iter().map(|q| format!("@search {q}")).collect();
    assert_eq!(harness.transport.sent_privmsgs().await, expected);
}

#[tokio::test]
async fn test_ready_joins_configured_channel() {
    let mut config = test_config();
    config.irc.channel = "#books".to_string();
    let mut harness = TestHarness::with_config(config).await;

    harness.transport.ready().await;
    harness.wait_for("ready").await;

    assert_eq!(
        harness.transport.sent().await,
        vec![SentCommand::Join("#books".to_string())]
    );
    let identities = harness.transport.identities().await;
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].nick, NICK);
    assert_eq!(identities[0].server, "irc.irchighway.net:6667");
}

#[tokio::test]
async fn test_full_download_flow() {
    let mut harness = TestHarness::new().await;
    let query = "alias grace";
    let file = "Margaret Atwood - Alias Grace.epub";

    harness.session.search_book(query);
    harness.transport.ready().await;
    harness.wait_for("search_submitted").await;

    harness
        .say(fixtures::SEARCH_BOT, &fixtures::search_accepted(query))
        .await;
    harness.wait_for_stage(Stage::Accepted).await;

    harness
        .say(fixtures::SEARCH_BOT, &fixtures::results_found(query, 8))
        .await;
    match harness.wait_for("results_found").await {
        SessionEvent::ResultsFound {
            archive, matches, ..
        } => {
            assert_eq!(archive, "SearchOok_results_for_ alias grace.txt.zip");
            assert_eq!(matches, 8);
        }
        other => panic!("Expected results_found, got {other:?}"),
    }

    harness
        .say(fixtures::SEARCH_BOT, &fixtures::results_listing_offer(query))
        .await;
    harness.wait_for("results_listing_offered").await;

    let request = DownloadRequest::parse(&format!("!Oatmeal {file}  ::INFO:: 612.3KB")).unwrap();
    assert_ok!(harness.session.request_file(request).await);
    assert!(
        harness
            .transport
            .wait_for_sent(Duration::from_secs(1), |c| matches!(
                c,
                SentCommand::Privmsg { text, .. } if text == &format!("!Oatmeal {file}")
            ))
            .await
    );
    harness
        .wait_for_stage(Stage::DownloadRequestSubmitted)
        .await;

    // Replies come from the file server, not the search bot
    harness.say("Oatmeal", &fixtures::request_accepted(file)).await;
    harness.wait_for_stage(Stage::DownloadRequestAccepted).await;

    harness.say("Oatmeal", &fixtures::file_offer(file)).await;
    let outcome = harness.wait_for_finished().await;
    assert_eq!(
        outcome.outcome,
        Outcome::Delivered {
            file: file.to_string()
        }
    );
    assert!(outcome.outcome.is_success());
}

#[tokio::test]
async fn test_lines_from_strangers_are_ignored() {
    let mut harness = TestHarness::new().await;
    let query = "alias grace";

    harness.session.search_book(query);
    harness.transport.ready().await;
    harness.wait_for("search_submitted").await;

    // Right text, wrong sender
    harness
        .say("Impostor", &fixtures::search_accepted(query))
        .await;
    // Right sender, addressed to someone else
    harness
        .transport
        .message(fixtures::SEARCH_BOT, "someoneelse", &fixtures::no_results(query))
        .await;
    // Registration bot chatter is logged only
    harness
        .say("ChanServ", &fixtures::no_results(query))
        .await;

    harness
        .say(fixtures::SEARCH_BOT, &fixtures::search_accepted(query))
        .await;
    loop {
        match harness.next_event().await {
            SessionEvent::StageChanged {
                to: Stage::Accepted,
                from,
                ..
            } => {
                assert_eq!(from, Stage::Submitted);
                break;
            }
            SessionEvent::Finished(outcome) => panic!("Finished early: {outcome:?}"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_request_file_in_wrong_stage() {
    let mut harness = TestHarness::new().await;
    harness.session.search_book("alias grace");
    harness.transport.ready().await;
    harness.wait_for("search_submitted").await;

    let request = DownloadRequest::parse("!Oatmeal book.epub").unwrap();
    let err = assert_err!(harness.session.request_file(request).await);
    assert!(matches!(
        err,
        SessionError::Negotiation(NegotiationError::InvalidTransition(ref e))
            if e.stage == Stage::Submitted
    ));
    // A refused request never reaches the channel
    assert_eq!(
        harness.transport.sent_privmsgs().await,
        vec!["@search alias grace".to_string()]
    );
}

#[tokio::test]
async fn test_timeout_abandons_and_moves_on() {
    let mut config = test_config();
    config.negotiation.timeout_secs = Some(1);
    let mut harness = TestHarness::with_config(config).await;

    harness.session.search_book("silent bot");
    harness.session.search_book("alias grace");
    harness.transport.ready().await;

    let outcome = harness.wait_for_finished().await;
    assert_eq!(outcome.query, "silent bot");
    assert_eq!(outcome.outcome, Outcome::Abandoned);

    match harness.wait_for("search_submitted").await {
        SessionEvent::SearchSubmitted { query, .. } => assert_eq!(query, "alias grace"),
        other => panic!("Expected search_submitted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_fails_active_negotiation_and_completes() {
    let mut harness = TestHarness::new().await;
    harness.session.search_book("alias grace");
    harness.transport.ready().await;
    harness.wait_for("search_submitted").await;

    harness.transport.disconnect().await;

    let outcome = harness.wait_for_finished().await;
    assert_eq!(outcome.outcome, Outcome::Failed(NegotiationError::Disconnected));
    harness.wait_for("disconnected").await;
    tokio::time::timeout(Duration::from_secs(1), &mut harness.completion)
        .await
        .expect("Completion should fire")
        .unwrap();
}

#[tokio::test]
async fn test_quit_sends_quit_and_completes() {
    let mut harness = TestHarness::new().await;
    harness.transport.ready().await;
    harness.wait_for("ready").await;

    assert_ok!(harness.session.quit("done"));
    harness.wait_for("disconnected").await;
    tokio::time::timeout(Duration::from_secs(1), &mut harness.completion)
        .await
        .expect("Completion should fire")
        .unwrap();
    assert!(harness
        .transport
        .sent()
        .await
        .contains(&SentCommand::Quit("done".to_string())));
}

#[tokio::test]
async fn test_connect_failure_and_double_connect() {
    let mut session = Session::new(test_config());

    let (tx, _rx) = oneshot::channel();
    let err = assert_err!(session.connect(&MockTransport::failing(), tx).await);
    assert!(matches!(err, SessionError::Connection(_)));

    let transport = MockTransport::new();
    let (tx, _rx) = oneshot::channel();
    assert_ok!(session.connect(&transport, tx).await);

    let (tx, _rx) = oneshot::channel();
    let err = assert_err!(session.connect(&transport, tx).await);
    assert!(matches!(err, SessionError::AlreadyConnected));
}

#[tokio::test]
async fn test_notices_drive_search_results() {
    let mut harness = TestHarness::new().await;
    let query = "alias grace";

    harness.session.search_book(query);
    harness.transport.ready().await;
    harness.wait_for("search_submitted").await;

    harness
        .transport
        .notice(fixtures::SEARCH_BOT, NICK, &fixtures::search_accepted(query))
        .await;
    harness.wait_for_stage(Stage::Accepted).await;

    harness
        .transport
        .notice(fixtures::SEARCH_BOT, NICK, &fixtures::results_found(query, 3))
        .await;
    match harness.wait_for("results_found").await {
        SessionEvent::ResultsFound { matches, .. } => assert_eq!(matches, 3),
        other => panic!("Expected results_found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_failure_sends_no_searches() {
    let mut session = Session::new(test_config());
    let mut events = session.subscribe();
    let transport = MockTransport::failing_join();
    let (completion_tx, completion) = oneshot::channel();
    assert_ok!(session.connect(&transport, completion_tx).await);

    session.search_book("alias grace");
    transport.ready().await;

    tokio::time::timeout(Duration::from_secs(1), completion)
        .await
        .expect("Completion should fire")
        .unwrap();
    let event = events.recv().await.unwrap();
    assert!(matches!(event, SessionEvent::Disconnected { .. }));
    assert!(transport.sent_privmsgs().await.is_empty());
}
