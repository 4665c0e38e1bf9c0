//! Heartbeat cadence tests
//!
//! Run on tokio's paused clock, so every deadline fires deterministically
//! and the full 41.25 s interval costs nothing.

use integration_tests::*;
use std::time::Duration;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_millis(TEST_INTERVAL_MS);

#[tokio::test(start_paused = true)]
async fn test_first_beat_lands_within_the_jitter_window() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    let hello_at = Instant::now();
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;

    let beat = server.next_envelope().await;
    assert_eq!(beat["op"], 1);
    // No dispatch seen yet, so the beat carries a null sequence
    assert!(beat["d"].is_null());
    assert!(hello_at.elapsed() <= INTERVAL);

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_acked_beats_keep_a_steady_cadence() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;

    let first = server.next_envelope().await;
    assert_eq!(first["op"], 1);
    let first_at = Instant::now();
    server.send_json(&heartbeat_ack());

    let second = server.next_envelope().await;
    assert_eq!(second["op"], 1);
    assert_eq!(first_at.elapsed(), INTERVAL);

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_missed_ack_drops_and_reconnects() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;

    let beat = server.next_envelope().await;
    assert_eq!(beat["op"], 1);
    let beat_at = Instant::now();

    // Never ack: the client must give up once the ack window lapses
    server.expect_close().await;
    assert_eq!(beat_at.elapsed(), INTERVAL.mul_f64(0.25));

    // And the drop is treated as transient
    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    assert_eq!(server.next_envelope().await["op"], 2);

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_server_heartbeat_request_is_answered_immediately() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;

    let asked_at = Instant::now();
    server.send_json(&heartbeat_request());

    let reply = server.next_envelope().await;
    assert_eq!(reply["op"], 1);
    // Out of cycle: the reply must not wait for the scheduled beat
    assert!(asked_at.elapsed() < Duration::from_millis(1));

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_ack_is_ignored() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    let hello_at = Instant::now();
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;

    // An ack with nothing pending must not disturb the schedule
    server.send_json(&heartbeat_ack());

    let beat = server.next_envelope().await;
    assert_eq!(beat["op"], 1);
    assert!(hello_at.elapsed() <= INTERVAL);

    gateway.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_beat_carries_last_seen_sequence() {
    let (gateway, mut feed) = spawn_gateway();
    gateway.open().unwrap();

    let mut server = feed.next_connection().await;
    server.send_json(&hello(TEST_INTERVAL_MS));
    server.next_envelope().await;
    server.send_json(&ready(7));

    let beat = server.next_envelope().await;
    assert_eq!(beat["op"], 1);
    assert_eq!(beat["d"], 7);

    gateway.shutdown().await;
}
