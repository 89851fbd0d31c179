//! Integration tests for the durable link retry policy.
//!
//! These run on a paused clock so retry spacing can be asserted exactly:
//! - infinite retries with a fixed delay
//! - `Offline` published before the delay starts
//! - immediate reconnect after a clean close
//! - decode failures treated like connection failures

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;

use craftlink_protocol::DecodeError;
use craftlink_stream::testing::{endpoint, names, players, wait_for, MockConnector};
use craftlink_stream::{DurableLink, LinkState, StreamError};

const RETRY_DELAY: Duration = Duration::from_secs(60);

async fn next_state(rx: &mut watch::Receiver<LinkState>) -> LinkState {
    rx.changed().await.expect("link stopped");
    let state = rx.borrow_and_update().clone();
    state
}

#[tokio::test(start_paused = true)]
async fn test_retries_forever_with_fixed_delay() {
    let connector = MockConnector::always_failing();
    let link = DurableLink::spawn(&Handle::current(), endpoint(), connector.clone(), RETRY_DELAY);
    let mut rx = link.receiver();

    let mut offline = 0;
    while offline < 6 {
        if let LinkState::Offline { .. } = next_state(&mut rx).await {
            offline += 1;
        }
    }

    let times = connector.attempt_times();
    assert_eq!(times.len(), 6);
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], RETRY_DELAY);
    }

    // the worker never gives up
    assert!(!link.is_finished());
    assert!(matches!(link.state(), LinkState::Offline { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_offline_is_published_before_the_delay() {
    let connector = MockConnector::always_failing();
    let link = DurableLink::spawn(&Handle::current(), endpoint(), connector.clone(), RETRY_DELAY);
    let mut rx = link.receiver();

    let state = next_state(&mut rx).await;
    let observed_at = Instant::now();

    match state {
        LinkState::Offline { reason } => assert!(reason.contains("10.0.0.5:10692")),
        other => panic!("expected offline, got {other:?}"),
    }

    let first_attempt = connector.attempt_times()[0];
    assert!(observed_at - first_attempt < RETRY_DELAY);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_failures() {
    let connector = MockConnector::failing_times(3);
    let link = DurableLink::spawn(&Handle::current(), endpoint(), connector.clone(), RETRY_DELAY);
    let mut rx = link.receiver();

    let mut observed = Vec::new();
    loop {
        let state = next_state(&mut rx).await;
        let online = state.is_online();
        observed.push(state);
        if online {
            break;
        }
    }

    assert_eq!(observed.len(), 4);
    assert!(observed[..3]
        .iter()
        .all(|state| matches!(state, LinkState::Offline { .. })));
    assert_eq!(connector.opens(), 1);

    let times = connector.attempt_times();
    assert_eq!(times[3] - times[0], RETRY_DELAY * 3);
}

#[tokio::test(start_paused = true)]
async fn test_clean_close_reconnects_immediately() {
    let connector = MockConnector::new();
    let link = DurableLink::spawn(&Handle::current(), endpoint(), connector.clone(), RETRY_DELAY);
    let mut rx = link.receiver();

    let first = match next_state(&mut rx).await {
        LinkState::Online(connection) => connection,
        other => panic!("expected online, got {other:?}"),
    };

    connector.close_latest();

    // no offline in between, and no delay
    let second = match next_state(&mut rx).await {
        LinkState::Online(connection) => connection,
        other => panic!("expected online, got {other:?}"),
    };

    assert_ne!(first.id(), second.id());
    assert_eq!(connector.opens(), 2);

    let times = connector.attempt_times();
    assert!(times[1] - times[0] < RETRY_DELAY);
}

#[tokio::test(start_paused = true)]
async fn test_decode_error_goes_offline_and_retries() {
    let connector = MockConnector::new();
    let link = DurableLink::spawn(&Handle::current(), endpoint(), connector.clone(), RETRY_DELAY);
    let mut rx = link.receiver();

    assert!(next_state(&mut rx).await.is_online());

    connector.fail_latest(StreamError::Decode {
        endpoint: endpoint(),
        source: DecodeError::Malformed("expected value at line 1 column 1".to_string()),
    });

    let state = next_state(&mut rx).await;
    assert!(matches!(state, LinkState::Offline { .. }));

    let failed_at = Instant::now();
    assert!(next_state(&mut rx).await.is_online());
    assert_eq!(Instant::now() - failed_at, RETRY_DELAY);
    assert_eq!(connector.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_records_follow_online() {
    let connector = MockConnector::new().with_initial_records(vec![players(&["Alice"])]);
    let link = DurableLink::spawn(&Handle::current(), endpoint(), connector.clone(), RETRY_DELAY);
    let mut rx = link.receiver();

    let connection = match next_state(&mut rx).await {
        LinkState::Online(connection) => connection,
        other => panic!("expected online, got {other:?}"),
    };

    let mut players = connection.players();
    let snapshot = players.recv().await.expect("players");
    assert_eq!(names(&snapshot), vec!["Alice"]);
}

#[tokio::test]
async fn test_dropping_link_closes_socket() {
    let connector = MockConnector::new();
    let link = DurableLink::spawn(
        &Handle::current(),
        endpoint(),
        connector.clone(),
        Duration::from_millis(10),
    );

    wait_for(|| connector.opens() == 1).await;
    assert_eq!(connector.closes(), 0);

    drop(link);

    wait_for(|| connector.closes() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.opens(), 1, "no reconnect after the link is dropped");
}
