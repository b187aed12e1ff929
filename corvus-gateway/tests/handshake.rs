//! End-to-end shard handshake against a local mock gateway, covering the
//! scenarios: a clean identify-to-ready cycle, an `INVALID_SESSION` forcing
//! a fresh identify rather than a resume, and a dropped connection resuming
//! with the prior session id and sequence.

use corvus_gateway::{ImmediateGate, ShardConfigBuilder, ShardEvent, Stage};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};

async fn mock_server() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock gateway");
    let addr = listener.local_addr().expect("local addr");
    (format!("ws://{addr}"), listener)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("accept tcp");
    tokio_tungstenite::accept_async(stream).await.expect("websocket upgrade")
}

async fn recv_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match ws.next().await.expect("stream ended").expect("frame error") {
            Message::Text(text) => return serde_json::from_str(&text).expect("valid json"),
            Message::Binary(bytes) => return serde_json::from_slice(&bytes).expect("valid json"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string())).await.expect("send frame");
}

fn ready_payload_with_resume_url(session_id: &str, resume_gateway_url: &str) -> Value {
    json!({
        "op": 0,
        "s": 1,
        "t": "READY",
        "d": {
            "v": 10,
            "user": {
                "id": "1",
                "username": "corvus",
                "discriminator": "0001",
            },
            "session_id": session_id,
            "resume_gateway_url": resume_gateway_url,
            "guilds": [],
        }
    })
}

fn ready_payload(session_id: &str) -> Value {
    ready_payload_with_resume_url(session_id, "wss://resume.example")
}

fn resumed_payload(seq: u64) -> Value {
    json!({"op": 0, "s": seq, "t": "RESUMED", "d": {}})
}

#[tokio::test]
async fn identify_then_ready_reaches_running_stage() {
    let (url, listener) = mock_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45_000}})).await;

        let identify = recv_json(&mut ws).await;
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "mock-token");

        send_json(&mut ws, ready_payload("session-abc")).await;
        ws
    });

    let config = ShardConfigBuilder::new("mock-token", url).build();
    let (shard, mut events) = corvus_gateway::Shard::connect(config, Arc::new(ImmediateGate));

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
        .await
        .expect("event within timeout")
        .expect("shard event channel open");

    match event {
        ShardEvent::Dispatch(dispatch) => {
            assert!(matches!(dispatch, corvus_model::DispatchEvent::Ready(_)));
        }
        other => panic!("expected a Ready dispatch, got {other:?}"),
    }

    assert_eq!(shard.stage(), Stage::Running);

    server.await.expect("mock server task");
}

#[tokio::test]
async fn invalid_session_clears_session_id_before_next_identify() {
    let (url, listener) = mock_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45_000}})).await;

        let identify = recv_json(&mut ws).await;
        assert_eq!(identify["op"], 2, "first connect must IDENTIFY, not RESUME");

        send_json(&mut ws, ready_payload("session-abc")).await;

        // Force an INVALID_SESSION so the shard's supervisor reconnects.
        send_json(&mut ws, json!({"op": 9, "d": false})).await;

        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45_000}})).await;

        let second = recv_json(&mut ws).await;
        assert_eq!(
            second["op"], 2,
            "a cleared session must re-identify, not resume, on the next connect"
        );
    });

    let config = ShardConfigBuilder::new("mock-token", url).build();
    let (_shard, mut events) = corvus_gateway::Shard::connect(config, Arc::new(ImmediateGate));

    // Keep the event channel draining in the background so the shard's
    // supervisor loop isn't blocked on a full channel while it reconnects;
    // the mock server's own assertions above are the actual pass/fail
    // signal for this scenario.
    let drain = tokio::spawn(async move { while events.recv().await.is_some() {} });

    tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("mock server scenario completed in time")
        .expect("mock server task");

    drain.abort();
}

#[tokio::test]
async fn disconnect_resumes_with_session_id_and_last_seq() {
    let (url, listener) = mock_server().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45_000}})).await;

        let identify = recv_json(&mut ws).await;
        assert_eq!(identify["op"], 2, "first connect must IDENTIFY, not RESUME");

        // Point the resume url back at this same mock listener so the
        // reconnect below actually lands on the second `accept`.
        send_json(&mut ws, ready_payload_with_resume_url("session-abc", &url)).await;
        send_json(&mut ws, json!({"op": 0, "s": 7, "t": "MESSAGE_CREATE", "d": {
            "id": "1", "channel_id": "2", "content": "hi",
            "author": {"id": "3", "username": "a", "discriminator": "0001", "bot": false},
        }}))
        .await;

        // Drop the connection without a close frame or INVALID_SESSION;
        // the shard must treat this as resumable and come back with a
        // RESUME carrying the session id and last seen sequence.
        drop(ws);

        let mut ws = accept(&listener).await;
        send_json(&mut ws, json!({"op": 10, "d": {"heartbeat_interval": 45_000}})).await;

        let resume = recv_json(&mut ws).await;
        assert_eq!(resume["op"], 6, "reconnect with a known session id must RESUME");
        assert_eq!(resume["d"]["session_id"], "session-abc");
        assert_eq!(resume["d"]["seq"], 7, "RESUME must carry the last dispatch sequence seen");

        send_json(&mut ws, resumed_payload(8)).await;
    });

    let config = ShardConfigBuilder::new("mock-token", url).build();
    let (shard, mut events) = corvus_gateway::Shard::connect(config, Arc::new(ImmediateGate));

    let mut saw_resumed = false;
    for _ in 0..8 {
        let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .expect("event within timeout")
            .expect("shard event channel open");

        if let ShardEvent::Dispatch(corvus_model::DispatchEvent::Resumed) = event {
            saw_resumed = true;
            break;
        }
    }

    assert!(saw_resumed, "expected a Resumed dispatch after reconnect");
    assert_eq!(shard.stage(), Stage::Running);

    tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("mock server scenario completed in time")
        .expect("mock server task");
}
