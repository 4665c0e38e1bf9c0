//! Session lifecycle tests
//!
//! Each test plays the server side of a scripted connection and checks the
//! client's handshake, resume and teardown behavior.

use flate2::{Compress, Compression, FlushCompress};
use gateway_client::GatewayEvent;
use integration_tests::*;
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_fresh_connection_identifies() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));

    let identify = server.next_envelope().await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert!(identify["d"]["properties"].is_object());
    assert!(identify["d"]["intents"].is_u64());

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ready_then_drop_resumes_with_last_sequence() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    let identify = server.next_envelope().await;
    assert_eq!(identify["op"], 2);

    server.send_json(&ready(1));
    server.send_json(&dispatch("MESSAGE_CREATE", 2, json!({ "content": "hi" })));
    server.send_close(4000);

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));

    let resume = server.next_envelope().await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["token"], TEST_TOKEN);
    assert_eq!(resume["d"]["session_id"], TEST_SESSION_ID);
    assert_eq!(resume["d"]["seq"], 2);

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_not_resumable_reidentifies() {
    let (gateway, mut feed) = spawn_gateway();
    let mut events = gateway.subscribe();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;
    server.send_json(&ready(1));
    server.send_json(&invalid_session(false));
    server.expect_close().await;

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));

    // The session was discarded, so the client must not attempt a Resume
    let identify = server.next_envelope().await;
    assert_eq!(identify["op"], 2);

    // Connectivity up, then the invalidation, then connectivity down
    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::Connectivity { session_open: true, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::Dispatch { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::SessionInvalidated { resumable: false }
    ));

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_server_reconnect_request_resumes() {
    let (gateway, mut feed) = spawn_gateway();
    let mut events = gateway.subscribe();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;
    server.send_json(&ready(1));
    server.send_json(&reconnect());
    server.expect_close().await;

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));

    let resume = server.next_envelope().await;
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], TEST_SESSION_ID);

    // Accepting the resume reopens the session and events keep flowing
    server.send_json(&resumed(2));
    server.send_json(&dispatch("MESSAGE_CREATE", 3, json!({ "content": "back" })));

    let mut saw_message = false;
    for _ in 0..8 {
        match events.recv().await.unwrap() {
            GatewayEvent::Dispatch { event, data } if event == "MESSAGE_CREATE" => {
                assert_eq!(data["content"], "back");
                saw_message = true;
                break;
            }
            _ => {}
        }
    }
    assert!(saw_message, "dispatch after resume never arrived");

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_fatal_close_code_stops_reconnecting() {
    let (gateway, mut feed) = spawn_gateway();
    let mut events = gateway.subscribe();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;
    server.send_close(4004);

    match events.recv().await.unwrap() {
        GatewayEvent::AuthFailure { reason } => assert!(reason.contains("4004")),
        other => panic!("expected AuthFailure, got {other:?}"),
    }

    // No retry, no matter how long we wait
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(feed.try_next_connection().is_none());

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_then_reopen_identifies() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;
    server.send_json(&ready(1));

    gateway.close().unwrap();
    assert_eq!(server.expect_close().await, Some(1000));

    // Closing discards the session, so reopening starts from scratch
    gateway.open().unwrap();
    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    let identify = server.next_envelope().await;
    assert_eq!(identify["op"], 2);

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_events_are_forwarded() {
    let (gateway, mut feed) = spawn_gateway();
    let mut events = gateway.subscribe();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;
    server.send_json(&ready(1));
    server.send_json(&dispatch("MESSAGE_CREATE", 2, json!({ "content": "hello" })));

    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::Connectivity { session_open: true, .. }
    ));
    match events.recv().await.unwrap() {
        GatewayEvent::Dispatch { event, .. } => assert_eq!(event, "READY"),
        other => panic!("expected READY dispatch, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        GatewayEvent::Dispatch { event, data } => {
            assert_eq!(event, "MESSAGE_CREATE");
            assert_eq!(data["content"], "hello");
        }
        other => panic!("expected MESSAGE_CREATE dispatch, got {other:?}"),
    }

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_presence_update_flows_once_session_open() {
    let (gateway, mut feed) = spawn_gateway();
    let mut events = gateway.subscribe();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;

    // Before READY the payload is dropped, not queued
    gateway.update_presence("idle").unwrap();
    server.send_json(&ready(1));

    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::Connectivity { session_open: true, .. }
    ));
    gateway.update_presence("online").unwrap();

    let presence = server.next_envelope().await;
    assert_eq!(presence["op"], 3);
    assert_eq!(presence["d"]["status"], "online");

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_presence_update_rejects_unknown_status() {
    let (gateway, _feed) = spawn_gateway();
    assert!(gateway.update_presence("sleeping").is_err());
    gateway.shutdown().await;
}

fn zlib_chunk(compress: &mut Compress, payload: &serde_json::Value) -> Vec<u8> {
    let text = payload.to_string();
    let mut out = Vec::with_capacity(text.len() + 256);
    compress
        .compress_vec(text.as_bytes(), &mut out, FlushCompress::Sync)
        .unwrap();
    out
}

#[tokio::test(start_paused = true)]
async fn test_compressed_transport_end_to_end() {
    let mut config = test_config();
    config.url.push_str("&compress=zlib-stream");
    config.compress = true;

    let (gateway, mut feed) = spawn_gateway_with_config(config);
    let mut events = gateway.subscribe();
    gateway.open().unwrap();

    // One zlib context for the whole connection, sync-flushed per message
    let mut compress = Compress::new(Compression::default(), true);

    let mut server = feed.next_connection().await;
    server.send_binary(zlib_chunk(&mut compress, &hello(TEST_INTERVAL_MS)));

    let identify = server.next_envelope().await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["compress"], true);

    server.send_binary(zlib_chunk(&mut compress, &ready(1)));

    // A message split across two frames only completes on the second
    let chunk = zlib_chunk(
        &mut compress,
        &dispatch("MESSAGE_CREATE", 2, json!({ "content": "compressed" })),
    );
    let mid = chunk.len() / 2;
    server.send_binary(chunk[..mid].to_vec());
    server.send_binary(chunk[mid..].to_vec());

    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::Connectivity { session_open: true, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        GatewayEvent::Dispatch { .. }
    ));
    match events.recv().await.unwrap() {
        GatewayEvent::Dispatch { event, data } => {
            assert_eq!(event, "MESSAGE_CREATE");
            assert_eq!(data["content"], "compressed");
        }
        other => panic!("expected MESSAGE_CREATE dispatch, got {other:?}"),
    }

    gateway.shutdown().await;
}
