use std::cell::RefCell;
use std::net::TcpListener;
use std::rc::Rc;
use std::time::{Duration, Instant};

use seaway::{
    ChatMessage, ClientConfig, ConnectionStatus, Envelope, MemoryHub, ReconnectPolicy, SyncClient,
};
use serde_json::json;

const URL: &str = "ws://localhost:8080/ws/game";

fn client_with(hub: &MemoryHub, reconnect: ReconnectPolicy) -> SyncClient {
    let mut config = ClientConfig::default();
    config.connection.reconnect = reconnect;
    SyncClient::new(config, Box::new(hub.connector()))
}

#[test]
fn test_alice_joins_moves_and_converges() {
    let hub = MemoryHub::new();
    let mut client = client_with(&hub, ReconnectPolicy::default());
    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);

    hub.push_frame(
        json!({"type": "PLAYER_JOINED", "payload": {"username": "alice", "x": 0, "z": 0, "angle": 0}})
            .to_string(),
    );
    client.update_at(start, 0.0);
    let alice = client.entity("alice").unwrap();
    assert_eq!(alice.current.x(), 0.0);

    hub.push_frame(
        json!({"type": "GAME_STATE_UPDATE", "payload": {"playerStates": {"alice": {"x": 10, "z": 0}}}})
            .to_string(),
    );

    let mut previous = 0.0;
    for _ in 0..240 {
        client.update_at(start, 1.0 / 60.0);
        let x = client.entity("alice").unwrap().current.x();
        assert!(x >= previous && x <= 10.0);
        previous = x;
    }
    assert!((previous - 10.0).abs() < 0.01);

    hub.push_frame(json!({"type": "PLAYER_LEFT", "payload": {"username": "alice"}}).to_string());
    client.update_at(start, 1.0 / 60.0);
    assert!(client.entity("alice").is_none());
}

#[test]
fn test_chat_round_trip_over_echo() {
    let hub = MemoryHub::echo();
    let mut client = client_with(&hub, ReconnectPolicy::default());
    let received = Rc::new(RefCell::new(Vec::new()));
    let _chat = {
        let received = Rc::clone(&received);
        client.subscribe::<ChatMessage>(move |chat| received.borrow_mut().push(chat.clone()))
    };

    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);

    assert!(client.send_chat("alice", "ahoy").unwrap());
    client.update_at(start, 0.0);

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sender, "alice");
    assert_eq!(received[0].message, "ahoy");
}

#[test]
fn test_send_while_disconnected_is_dropped() {
    let hub = MemoryHub::new();
    let mut client = client_with(&hub, ReconnectPolicy::default());

    assert!(!client.publish_raw("CUSTOM", json!({"a": 1})).unwrap());

    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);

    assert!(hub.sent().is_empty());
    assert_eq!(client.stats().frames_dropped, 1);
}

#[test]
fn test_malformed_frames_do_not_disturb_later_ones() {
    let hub = MemoryHub::new();
    let mut client = client_with(&hub, ReconnectPolicy::default());
    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();

    hub.push_frame("not json");
    hub.push_frame(r#"["CHAT_MESSAGE", {}]"#);
    hub.push_frame(r#"{"type": "UNKNOWN_THING", "payload": {}}"#);
    hub.push_frame(
        json!({"type": "GAME_STATE_INIT", "payload": {"playerStates": {"bob": {"x": 2, "z": 3}}}})
            .to_string(),
    );
    client.update_at(start, 0.0);

    let stats = client.dispatch_stats();
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.unrouted, 1);
    assert_eq!(stats.delivered, 1);

    let bob = client.entity("bob").unwrap();
    assert_eq!(bob.current.x(), 2.0);
    assert_eq!(bob.current.z(), 3.0);
    assert_eq!(client.status(), ConnectionStatus::Open);
}

#[test]
fn test_frames_from_a_closed_session_do_not_leak_into_the_next() {
    let hub = MemoryHub::new();
    let mut client = client_with(&hub, ReconnectPolicy::default());
    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);

    client.disconnect();
    hub.push_frame(
        json!({"type": "GAME_STATE_INIT", "payload": {"playerStates": {"ghost": {"x": 1, "z": 1}}}})
            .to_string(),
    );
    client.update_at(start, 0.0);

    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);

    assert!(client.is_connected());
    assert!(client.entity("ghost").is_none());
    assert_eq!(client.dispatch_stats().delivered, 0);
}

#[test]
fn test_reconnects_after_drop_until_disconnect() {
    let hub = MemoryHub::new();
    let mut client = client_with(&hub, ReconnectPolicy::fixed(3000));
    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);
    assert_eq!(hub.open_count(), 1);

    hub.drop_connection();
    client.update_at(start, 0.0);
    assert_eq!(client.status(), ConnectionStatus::Closed);
    assert!(client.connection().reconnect_timer().is_pending());

    client.update_at(start + Duration::from_millis(2999), 0.0);
    assert_eq!(hub.open_count(), 1);

    client.update_at(start + Duration::from_millis(3000), 0.0);
    assert_eq!(hub.open_count(), 2);
    assert!(client.is_connected());

    hub.drop_connection();
    client.update_at(start + Duration::from_millis(3000), 0.0);
    client.disconnect();
    client.update_at(start + Duration::from_secs(60), 0.0);
    assert_eq!(hub.open_count(), 2);
    assert!(!client.connection().reconnect_timer().is_pending());
}

#[test]
fn test_refused_connection_keeps_retrying() {
    let hub = MemoryHub::new();
    hub.refuse_connections(Some("server down"));
    let mut client = client_with(&hub, ReconnectPolicy::fixed(100));
    let start = Instant::now();

    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);
    assert!(!client.is_connected());
    assert_eq!(client.connection().retry_count(), 1);

    hub.refuse_connections(None);
    client.update_at(start + Duration::from_millis(100), 0.0);
    assert!(client.is_connected());
    assert_eq!(client.connection().retry_count(), 0);
}

#[test]
fn test_unanswered_websocket_upgrade_leaves_loop_running() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}/ws/game", listener.local_addr().unwrap());
    let mut client = SyncClient::with_websocket(ClientConfig::default());

    let started = Instant::now();
    client.connect(&url, "secret").unwrap();
    for _ in 0..10 {
        client.update(1.0 / 60.0);
    }

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(client.status(), ConnectionStatus::Connecting);
    assert!(!client.is_connected());
    assert!(!client.send_chat("alice", "anyone?").unwrap());
}

#[test]
fn test_outbound_envelope_shape() {
    let hub = MemoryHub::new();
    let mut client = client_with(&hub, ReconnectPolicy::default());
    let start = Instant::now();
    client.connect_at(URL, "secret", start).unwrap();
    client.update_at(start, 0.0);

    client.send_chat("alice", "hello").unwrap();

    let frames = hub.sent();
    let value: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(
        value,
        json!({"type": "CHAT_MESSAGE", "payload": {"sender": "alice", "message": "hello"}})
    );
    assert!(Envelope::decode(&frames[0]).unwrap().is::<ChatMessage>());
}
