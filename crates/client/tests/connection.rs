//! Connection lifecycle tests against a real local WebSocket endpoint.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use agentline_client::{ClientError, Connection, ConnectionState, ReconnectPolicy};
use agentline_protocol::AgentFrame;

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base: Duration::from_millis(10),
        max: Duration::from_millis(40),
    }
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn wait_for_state(conn: &Connection, want: ConnectionState) {
    let mut rx = conn.watch_state();
    timeout(Duration::from_secs(2), rx.wait_for(|state| *state == want))
        .await
        .expect("timed out waiting for connection state")
        .expect("state channel closed");
}

async fn recv_frame(rx: &mut mpsc::UnboundedReceiver<AgentFrame>) -> AgentFrame {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("frame channel closed")
}

#[tokio::test]
async fn connects_and_sends_user_text() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        match ws.next().await {
            Some(Ok(Message::Text(payload))) => payload.as_str().to_string(),
            other => panic!("expected text message, got {:?}", other),
        }
    });

    let conn = Connection::new(url, fast_policy());
    conn.connect().await;
    wait_for_state(&conn, ConnectionState::Open).await;
    assert_eq!(conn.attempt().await, 0);

    conn.send("hello").await.unwrap();
    let received = server.await.unwrap();
    assert_eq!(received, r#"{"message":"hello"}"#);
}

#[tokio::test]
async fn decoded_frames_reach_the_handler_and_malformed_payloads_are_dropped() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"start"}"#)).await.unwrap();
        ws.send(Message::text("{broken json")).await.unwrap();
        ws.send(Message::text(r#"{"type":"unknown_kind"}"#))
            .await
            .unwrap();
        ws.send(Message::text(r#"{"type":"complete"}"#))
            .await
            .unwrap();
        sleep(Duration::from_secs(2)).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = Connection::new(url, fast_policy());
    conn.set_handler(move |frame| {
        let _ = tx.send(frame);
    })
    .await;
    conn.connect().await;

    assert_eq!(recv_frame(&mut rx).await, AgentFrame::Start);
    // The malformed and unknown payloads never reach the handler and the
    // connection stays open for the next valid frame.
    assert_eq!(recv_frame(&mut rx).await, AgentFrame::Complete);
    assert_eq!(conn.state(), ConnectionState::Open);
}

#[tokio::test]
async fn reconnects_after_unexpected_close_and_resets_attempt() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        // First connection: greet, then drop without a goodbye.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"start"}"#)).await.unwrap();
        drop(ws);

        // Second connection: the reconnect. Stay alive.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"complete"}"#))
            .await
            .unwrap();
        sleep(Duration::from_secs(2)).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = Connection::new(url, fast_policy());
    conn.set_handler(move |frame| {
        let _ = tx.send(frame);
    })
    .await;
    conn.connect().await;

    assert_eq!(recv_frame(&mut rx).await, AgentFrame::Start);
    // The Complete frame can only arrive over the re-dialed connection.
    assert_eq!(recv_frame(&mut rx).await, AgentFrame::Complete);

    wait_for_state(&conn, ConnectionState::Open).await;
    assert_eq!(conn.attempt().await, 0);
}

#[tokio::test]
async fn failed_dial_schedules_bounded_retries() {
    // Bind then drop so the port refuses connections.
    let (listener, url) = bind().await;
    drop(listener);

    let conn = Connection::new(url, fast_policy());
    conn.connect().await;
    sleep(Duration::from_millis(250)).await;
    assert!(
        conn.attempt().await >= 2,
        "expected several scheduled attempts, got {}",
        conn.attempt().await
    );

    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Closed);
    let frozen = conn.attempt().await;
    sleep(Duration::from_millis(150)).await;
    assert_eq!(conn.attempt().await, frozen, "retries must stop after disconnect");
}

#[tokio::test]
async fn disconnect_during_a_pending_reconnect_never_reopens() {
    let (listener, url) = bind().await;
    let (accepts_tx, mut accepts_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // Accept, handshake, drop. Every connection lands back in backoff.
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = accepts_tx.send(());
            let _ws = accept_async(stream).await;
        }
    });

    let conn = Connection::new(url, fast_policy());
    conn.connect().await;
    timeout(Duration::from_secs(2), accepts_rx.recv())
        .await
        .expect("timed out waiting for first dial")
        .expect("accept channel closed");

    // Land the disconnect while the close/redial cycle is in flight.
    sleep(Duration::from_millis(15)).await;
    conn.disconnect().await;

    // A dial already in flight at disconnect time may still complete its
    // handshake server-side before the epoch check discards it. Let those
    // drain, then require silence.
    sleep(Duration::from_millis(200)).await;
    while accepts_rx.try_recv().is_ok() {}
    sleep(Duration::from_millis(200)).await;

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(
        accepts_rx.try_recv().is_err(),
        "a timer must not redial after disconnect"
    );
}

#[tokio::test]
async fn disconnect_is_idempotent_and_permanent() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ws = accept_async(stream).await.unwrap();
        sleep(Duration::from_secs(2)).await;
    });

    let conn = Connection::new(url, fast_policy());
    conn.connect().await;
    wait_for_state(&conn, ConnectionState::Open).await;

    conn.disconnect().await;
    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Closed);

    // No reconnect after the backoff window, and sends are rejected.
    sleep(Duration::from_millis(150)).await;
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert_eq!(conn.attempt().await, 0);
    assert!(matches!(
        conn.send("hi").await.unwrap_err(),
        ClientError::NotConnected
    ));
}

#[tokio::test]
async fn frames_before_handler_registration_are_dropped() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // Sent while no handler is registered.
        ws.send(Message::text(r#"{"type":"start"}"#)).await.unwrap();
        // Wait for the client's sync message, then send the second frame.
        let _ = ws.next().await;
        ws.send(Message::text(r#"{"type":"complete"}"#))
            .await
            .unwrap();
        sleep(Duration::from_secs(2)).await;
    });

    let conn = Connection::new(url, fast_policy());
    conn.connect().await;
    wait_for_state(&conn, ConnectionState::Open).await;
    // Give the unhandled frame time to arrive and be dropped.
    sleep(Duration::from_millis(100)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    conn.set_handler(move |frame| {
        let _ = tx.send(frame);
    })
    .await;
    conn.send("sync").await.unwrap();

    assert_eq!(recv_frame(&mut rx).await, AgentFrame::Complete);
    assert!(rx.try_recv().is_err(), "dropped frame must not be replayed");
}

#[tokio::test]
async fn latest_registered_handler_wins() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"start"}"#)).await.unwrap();
        let _ = ws.next().await;
        ws.send(Message::text(r#"{"type":"complete"}"#))
            .await
            .unwrap();
        sleep(Duration::from_secs(2)).await;
    });

    let (first_tx, mut first_rx) = mpsc::unbounded_channel();
    let conn = Connection::new(url, fast_policy());
    conn.set_handler(move |frame| {
        let _ = first_tx.send(frame);
    })
    .await;
    conn.connect().await;
    assert_eq!(recv_frame(&mut first_rx).await, AgentFrame::Start);

    let (second_tx, mut second_rx) = mpsc::unbounded_channel();
    conn.set_handler(move |frame| {
        let _ = second_tx.send(frame);
    })
    .await;
    conn.send("swap").await.unwrap();

    assert_eq!(recv_frame(&mut second_rx).await, AgentFrame::Complete);
    assert!(
        first_rx.try_recv().is_err(),
        "replaced handler must stop receiving frames"
    );
}
