use std::time::Duration;

use stadtwache_harness::realtime::verifier::{
    CONNECTION_CASE, JOIN_CASE, MESSAGING_CASE, NO_MESSAGES_WARNING,
};
use stadtwache_harness::realtime::ConnectionState;
use stadtwache_harness::{EventVerifier, Outcome, RealtimeConfig};

use crate::socketio_server::{Behavior, FakeSocketIo, POLLING_SID};

fn fast_config(origin: &str) -> RealtimeConfig {
    RealtimeConfig {
        origin: origin.to_string(),
        settle_delay: Duration::from_millis(500),
        join_delay: Duration::from_millis(50),
        event_wait: Duration::from_millis(300),
        handshake_timeout: Duration::from_secs(2),
        ..RealtimeConfig::default()
    }
}

#[tokio::test]
async fn test_echoed_message_is_strict_pass() {
    let server = FakeSocketIo::start(Behavior {
        echo_messages: true,
        acknowledge: true,
    })
    .await;
    let mut verifier = EventVerifier::new(&fast_config(&server.origin)).unwrap();

    let report = verifier.run().await;

    assert_eq!(report.records.len(), 3);
    assert!(report.all_passed(), "{}", report);
    assert_eq!(report.record(CONNECTION_CASE).unwrap().message, "Connected via websocket");

    let messaging = report.record(MESSAGING_CASE).unwrap();
    assert_eq!(messaging.outcome, Outcome::Passed);
    let details = messaging.details.as_ref().unwrap();
    assert_eq!(details["messages"], 1);
    assert_eq!(details["other_events"], 1);
    assert_eq!(details["event_names"][0], "user_online");

    let frames = server.received();
    assert_eq!(frames.first().map(String::as_str), Some("40"));
    assert!(frames.contains(&r#"42["join_channel","general"]"#.to_string()));
    assert!(frames.contains(&r#"42["join_user_room","test-user-123"]"#.to_string()));
    // Server ping answered with a pong
    assert!(frames.contains(&"3".to_string()));

    assert_eq!(verifier.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_silent_server_is_soft_pass() {
    let server = FakeSocketIo::start(Behavior {
        echo_messages: false,
        acknowledge: true,
    })
    .await;
    let mut verifier = EventVerifier::new(&fast_config(&server.origin)).unwrap();

    let report = verifier.run().await;

    let messaging = report.record(MESSAGING_CASE).unwrap();
    assert_eq!(messaging.outcome, Outcome::SoftPass);
    assert_eq!(messaging.message, NO_MESSAGES_WARNING);

    let summary = report.summary();
    assert_eq!(summary.passed, 3);
    assert_eq!(summary.soft, 1);
    assert!(report.to_string().contains("WARNINGS"));
}

#[tokio::test]
async fn test_unacknowledged_connect_fails_and_skips() {
    let server = FakeSocketIo::start(Behavior {
        echo_messages: false,
        acknowledge: false,
    })
    .await;
    let mut verifier = EventVerifier::new(&fast_config(&server.origin)).unwrap();

    let report = verifier.run().await;

    assert_eq!(report.record(CONNECTION_CASE).unwrap().outcome, Outcome::Failed);
    assert_eq!(report.record(JOIN_CASE).unwrap().outcome, Outcome::Skipped);
    assert_eq!(report.record(MESSAGING_CASE).unwrap().outcome, Outcome::Skipped);
}

#[tokio::test]
async fn test_unreachable_origin_fails_every_transport() {
    let mut verifier = EventVerifier::new(&fast_config("http://127.0.0.1:9")).unwrap();

    let report = verifier.run().await;

    assert_eq!(report.records.len(), 3);
    let connection = report.record(CONNECTION_CASE).unwrap();
    assert_eq!(connection.outcome, Outcome::Failed);
    assert!(connection.message.starts_with("Failed to connect"));
    for name in [JOIN_CASE, MESSAGING_CASE] {
        let record = report.record(name).unwrap();
        assert_eq!(record.outcome, Outcome::Skipped);
        assert_eq!(record.message, "not connected");
    }
    assert_eq!(report.summary().success_rate(), 0.0);
}

#[tokio::test]
async fn test_polling_fallback_when_websocket_is_refused() {
    let server = FakeSocketIo::start_polling(Behavior {
        echo_messages: true,
        acknowledge: true,
    })
    .await;
    let config = RealtimeConfig {
        event_wait: Duration::from_millis(1500),
        ..fast_config(&server.origin)
    };
    let mut verifier = EventVerifier::new(&config).unwrap();

    let report = verifier.run().await;

    assert!(report.all_passed(), "{}", report);
    let connection = report.record(CONNECTION_CASE).unwrap();
    assert_eq!(connection.message, "Connected via polling");
    assert_eq!(connection.details.as_ref().unwrap()["sid"], POLLING_SID);

    let messaging = report.record(MESSAGING_CASE).unwrap();
    assert_eq!(messaging.outcome, Outcome::Passed);
    assert_eq!(messaging.details.as_ref().unwrap()["messages"], 1);

    // Everything the client sent arrived by POST on the polling session
    let frames = server.received();
    for expected in [
        "40",
        r#"42["join_channel","general"]"#,
        r#"42["join_user_room","test-user-123"]"#,
        "41",
        "1",
    ] {
        assert!(frames.iter().any(|f| f == expected), "missing {} in {:?}", expected, frames);
    }
    // Pongs for the ping replayed from the handshake and the one sent after the ack
    assert_eq!(frames.iter().filter(|f| *f == "3").count(), 2);
    assert!(frames.iter().any(|f| f.starts_with(r#"42["send_message","#)));

    assert_eq!(verifier.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_polling_without_ack_fails() {
    let server = FakeSocketIo::start_polling(Behavior {
        echo_messages: false,
        acknowledge: false,
    })
    .await;
    let mut verifier = EventVerifier::new(&fast_config(&server.origin)).unwrap();

    let report = verifier.run().await;

    let connection = report.record(CONNECTION_CASE).unwrap();
    assert_eq!(connection.outcome, Outcome::Failed);
    assert!(connection.message.contains("did not acknowledge"));
    assert_eq!(report.record(MESSAGING_CASE).unwrap().outcome, Outcome::Skipped);
}
