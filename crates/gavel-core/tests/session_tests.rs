// Session task tests against an in-memory fake server.
//
// All tests run on paused time: the heartbeat and retry timers only fire
// when every task is idle, so sequencing is deterministic.

mod common;

use std::time::Duration;

use futures_util::FutureExt;
use serde_json::json;

use common::*;
use gavel_core::client::SessionError;
use gavel_core::session::{ConnectionState, RetryPolicy};
use gavel_core::transport::TransportError;
use gavel_core::wire::{EventKind, ServerEvent};

async fn wait_for_state(
    rx: &mut tokio::sync::watch::Receiver<ConnectionState>,
    pred: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(pred))
        .await
        .expect("state not reached in time")
        .expect("session task gone")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn join_waits_for_namespace_ack() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();

    handle.join_channel("e1");
    let mut server = servers.recv().await.unwrap();

    server.open();
    assert_eq!(server.recv().await.as_deref(), Some(AUTH_FRAME));
    // Nothing else goes out before the server accepts the namespace.
    assert_eq!(server.recv().await, None);

    server.accept();
    assert_eq!(server.recv().await, Some(join_frame("e1")));

    let mut status = handle.watch_status();
    wait_for_state(&mut status, ConnectionState::is_connected).await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn answers_server_pings() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    session.handle().connect();

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    server.send("2");
    assert_eq!(server.recv().await.as_deref(), Some("3"));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn bid_replies_resolve_in_request_order() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();
    handle.connect();

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;

    let first = handle.submit_bid("e1", "p1", 500);
    let second = handle.submit_bid("e1", "p1", 600);
    assert!(server.recv().await.unwrap().contains(r#""amount":500"#));
    assert!(server.recv().await.unwrap().contains(r#""amount":600"#));

    server.emit("bid:response", json!({"success": true}));
    server.emit("bid:response", json!({"success": false, "error": "Bid too low"}));

    let first = first.wait().await.unwrap();
    assert!(first.success);
    let second = second.wait().await.unwrap();
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some("Bid too low"));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn request_before_connect_is_flushed_on_ack() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();

    let reply = handle.start_player("e1", "p7");
    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    assert_eq!(
        server.recv().await.as_deref(),
        Some(r#"42["player:start",{"eventId":"e1","playerId":"p7"}]"#)
    );

    server.emit("player:start:response", json!({"success": true}));
    assert!(reply.wait().await.unwrap().success);
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn requests_without_token_fail_fast() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, None, RetryPolicy::default());
    let handle = session.handle();

    handle.connect();
    let reply = handle.submit_bid("e1", "p1", 100);
    assert_eq!(reply.wait().await, Err(SessionError::Disconnected));
    assert_eq!(handle.status(), ConnectionState::Disconnected);
    assert!(servers.try_recv().is_err());
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn push_events_reach_scoped_listeners() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();
    let mut bids = handle.listen(&[EventKind::BidReceived]);
    let mut sold = handle.listen(&[EventKind::PlayerSold]);
    handle.join_channel("e1");

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    assert_eq!(server.recv().await, Some(join_frame("e1")));

    server.emit("bid:received", json!({"playerId": "p1", "amount": 750, "teamName": "Kings"}));
    match bids.recv().await {
        Some(ServerEvent::BidReceived(bid)) => assert_eq!(bid.amount, 750),
        other => panic!("expected a bid, got {other:?}"),
    }
    assert!(sold.try_recv().is_none());

    // Malformed payloads are dropped without killing the connection.
    server.emit("bid:received", json!({"amount": "lots"}));
    server.send("2");
    assert_eq!(server.recv().await.as_deref(), Some("3"));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn reconnects_and_rejoins_after_drop() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), fast_retry(5));
    let handle = session.handle();
    handle.join_channel("e1");

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    assert_eq!(server.recv().await, Some(join_frame("e1")));
    let in_flight = handle.submit_bid("e1", "p1", 900);
    assert!(server.recv().await.is_some());

    server.hang_up();
    // Requests in flight on the dead connection are not replayed.
    assert_eq!(in_flight.wait().await, Err(SessionError::Disconnected));

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    assert_eq!(server.recv().await, Some(join_frame("e1")));
    assert_eq!(server.recv().await, None);

    let mut status = handle.watch_status();
    wait_for_state(&mut status, ConnectionState::is_connected).await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn missing_heartbeat_forces_reconnect() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), fast_retry(5));
    session.handle().connect();

    let mut first = servers.recv().await.unwrap();
    first.handshake().await;

    // No pings: the client gives up after ping interval + timeout and dials again.
    let started = tokio::time::Instant::now();
    let mut second = servers.recv().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(40));
    second.handshake().await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn pings_do_not_excuse_a_missing_namespace_ack() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), fast_retry(5));
    session.handle().connect();

    let mut first = servers.recv().await.unwrap();
    first.open();
    assert_eq!(first.recv().await.as_deref(), Some(AUTH_FRAME));

    // Keep the heartbeat alive but never acknowledge the namespace.
    let started = tokio::time::Instant::now();
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(3)).await;
        first.send("2");
        assert_eq!(first.recv().await.as_deref(), Some("3"));
    }

    let mut second = servers.recv().await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "redialed after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(40), "redialed after {elapsed:?}");
    second.handshake().await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn oversized_ping_window_is_capped() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), fast_retry(5));
    session.handle().connect();

    let mut first = servers.recv().await.unwrap();
    first.send(format!(
        r#"0{{"sid":"abc","upgrades":[],"pingInterval":{},"pingTimeout":{}}}"#,
        u64::MAX,
        u64::MAX
    ));
    assert_eq!(first.recv().await.as_deref(), Some(AUTH_FRAME));
    first.accept();

    // No pings: the connection still expires, after ten minutes at most.
    let started = tokio::time::Instant::now();
    let mut second = servers.recv().await.unwrap();
    assert!(started.elapsed() <= Duration::from_secs(601));
    second.handshake().await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_retry_budget() {
    let (connector, _servers) = MockConnector::new();
    connector.fail_next(10, TransportError::Connect("refused".into()));
    let session = open_session(connector, Some("jwt"), fast_retry(2));
    let handle = session.handle();
    let mut status = handle.watch_status();

    handle.connect();
    let state = wait_for_state(&mut status, |s| matches!(s, ConnectionState::Failed { .. })).await;
    assert!(matches!(state, ConnectionState::Failed { .. }));

    // A later explicit connect starts a fresh budget.
    handle.connect();
    wait_for_state(&mut status, |s| matches!(s, ConnectionState::Connecting { .. } | ConnectionState::Backoff { .. })).await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_handshake_is_retried() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), fast_retry(3));
    session.handle().connect();

    let mut server = servers.recv().await.unwrap();
    server.open();
    assert_eq!(server.recv().await.as_deref(), Some(AUTH_FRAME));
    server.send(r#"44{"message":"Authentication error"}"#);

    let mut retry = servers.recv().await.unwrap();
    retry.handshake().await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_fails_pending_and_sends_close() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();
    handle.connect();

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    let reply = handle.submit_bid("e1", "p1", 100);
    assert!(server.recv().await.is_some());

    handle.disconnect();
    assert_eq!(reply.wait().await, Err(SessionError::Disconnected));
    assert_eq!(server.recv().await.as_deref(), Some("41"));

    let mut status = handle.watch_status();
    wait_for_state(&mut status, |s| *s == ConnectionState::Disconnected).await;
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_releases_listeners_before_closing() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();
    let mut bids = handle.listen(&[EventKind::BidReceived]);
    handle.connect();

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    server.emit("bid:received", json!({"playerId": "p1", "amount": 500, "teamName": "Kings"}));
    assert!(matches!(bids.recv().await, Some(ServerEvent::BidReceived(_))));

    handle.disconnect();
    assert_eq!(server.recv().await.as_deref(), Some("41"));
    // By the time the close frame is on the wire the listener is already gone.
    assert!(matches!(bids.recv().now_or_never(), Some(None)));
    session.close().await;
}

#[tokio::test(start_paused = true)]
async fn leave_emits_only_while_connected() {
    let (connector, mut servers) = MockConnector::new();
    let session = open_session(connector, Some("jwt"), RetryPolicy::default());
    let handle = session.handle();
    handle.join_channel("e1");

    let mut server = servers.recv().await.unwrap();
    server.handshake().await;
    assert_eq!(server.recv().await, Some(join_frame("e1")));

    handle.leave_channel("e1");
    assert_eq!(
        server.recv().await.as_deref(),
        Some(r#"42["leave:auction",{"eventId":"e1"}]"#)
    );
    session.close().await;
}
