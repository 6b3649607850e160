//! OSC bridge client against an in-process fake bridge: correlation,
//! chunk reassembly, busy retries, ping caching, and timeout cleanup.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::free_udp_port;
use livewire::chunk;
use livewire::error::BridgeError;
use rosc::{OscMessage, OscPacket, OscType};
use serde_json::{json, Value};
use stagehand::oscbridge::OscBridgeClient;
use tokio::net::UdpSocket;

/// What the fake bridge answers, per request in receipt order; the
/// last entry repeats.
#[derive(Clone)]
enum Reply {
    Success(Value),
    Busy,
    Error(&'static str),
    /// Chunked success with the given piece size; `drop_index` skips
    /// one chunk to simulate datagram loss.
    Chunked {
        result: Value,
        piece_size: usize,
        drop_index: Option<u32>,
    },
}

fn request_id_of(packet: &OscPacket) -> String {
    let OscPacket::Message(msg) = packet else {
        panic!("expected an OSC message")
    };
    msg.args
        .iter()
        .rev()
        .find_map(|a| match a {
            OscType::String(s) => Some(s.clone()),
            _ => None,
        })
        .expect("request carries an id")
}

/// Spawn the fake bridge. Returns (send_port, recv_port, request count):
/// the client sends to `send_port` and listens on `recv_port`.
async fn spawn_fake_bridge(replies: Vec<Reply>) -> (u16, u16, Arc<AtomicUsize>) {
    let sock = UdpSocket::bind(("127.0.0.1", 0)).await.expect("bridge bind");
    let send_port = sock.local_addr().unwrap().port();
    let recv_port = free_udp_port();

    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    tokio::spawn(async move {
        let target = ("127.0.0.1", recv_port);
        let mut buf = vec![0u8; 65536];
        let mut step = 0usize;

        loop {
            let n = match sock.recv(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };
            let Ok((_, packet)) = rosc::decoder::decode_udp(&buf[..n]) else {
                continue;
            };
            let id = request_id_of(&packet);
            counter.fetch_add(1, Ordering::SeqCst);

            let reply = replies
                .get(step.min(replies.len().saturating_sub(1)))
                .cloned()
                .expect("at least one scripted reply");
            step += 1;

            let payloads: Vec<String> = match reply {
                Reply::Success(result) => vec![chunk::encode_whole(&json!({
                    "id": id, "status": "success", "result": result,
                }))],
                Reply::Busy => vec![chunk::encode_whole(&json!({
                    "id": id, "status": "busy",
                }))],
                Reply::Error(message) => vec![chunk::encode_whole(&json!({
                    "id": id, "status": "error", "message": message,
                }))],
                Reply::Chunked {
                    result,
                    piece_size,
                    drop_index,
                } => {
                    let body = serde_json::to_vec(&json!({
                        "id": id, "status": "success", "result": result,
                    }))
                    .unwrap();
                    chunk::split_into_chunks(&body, piece_size)
                        .into_iter()
                        .enumerate()
                        .filter(|(i, _)| Some(*i as u32) != drop_index)
                        .map(|(_, p)| p)
                        .collect()
                }
            };

            for payload in payloads {
                let packet = OscPacket::Message(OscMessage {
                    addr: "/reply".to_string(),
                    args: vec![OscType::String(payload)],
                });
                let bytes = rosc::encoder::encode(&packet).unwrap();
                let _ = sock.send_to(&bytes, target).await;
            }
        }
    });

    (send_port, recv_port, requests)
}

fn big_parameter_result(count: usize) -> Value {
    json!({
        "parameters": (0..count)
            .map(|i| json!({ "name": format!("param {}", i), "value": i as f64 / count as f64 }))
            .collect::<Vec<_>>()
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn ping_roundtrips_and_caches() {
    let (send_port, recv_port, requests) =
        spawn_fake_bridge(vec![Reply::Success(json!({ "version": "1.2.0" }))]).await;
    let client = OscBridgeClient::bind(send_port, recv_port).await.unwrap();

    assert_eq!(client.ping().await.unwrap(), "1.2.0");
    // Within the TTL the cached result answers without a round-trip.
    assert_eq!(client.ping().await.unwrap(), "1.2.0");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn large_discovery_reassembles_from_chunks() {
    let (send_port, recv_port, _requests) = spawn_fake_bridge(vec![Reply::Chunked {
        result: big_parameter_result(93),
        piece_size: 600,
        drop_index: None,
    }])
    .await;
    let client = OscBridgeClient::bind(send_port, recv_port).await.unwrap();

    let result = client
        .request(
            "/discover_params",
            vec![OscType::Int(0), OscType::Int(0)],
            OscBridgeClient::dynamic_timeout(93),
            "/discover_params",
        )
        .await
        .unwrap();
    assert_eq!(result["parameters"].as_array().unwrap().len(), 93);
}

#[tokio::test(flavor = "multi_thread")]
async fn dynamic_timeout_scales_with_declared_size() {
    assert_eq!(OscBridgeClient::dynamic_timeout(10), Duration::from_secs(10));
    // 93 params -> 13.95s, above the 10s floor.
    assert_eq!(
        OscBridgeClient::dynamic_timeout(93),
        Duration::from_millis(93 * 150)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn busy_then_success_is_retried_transparently() {
    let (send_port, recv_port, requests) = spawn_fake_bridge(vec![
        Reply::Busy,
        Reply::Busy,
        Reply::Success(json!({ "applied": 3 })),
    ])
    .await;
    let client = OscBridgeClient::bind(send_port, recv_port).await.unwrap();

    let result = client
        .request_queueable(
            "/set_params",
            vec![OscType::Int(0), OscType::Int(0)],
            Duration::from_secs(5),
            "/set_params",
        )
        .await
        .unwrap();
    assert_eq!(result["applied"], 3);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn persistent_busy_surfaces_with_attempt_count() {
    let (send_port, recv_port, _requests) = spawn_fake_bridge(vec![Reply::Busy]).await;
    let client = OscBridgeClient::bind(send_port, recv_port).await.unwrap();

    let err = client
        .request_queueable(
            "/discover_params",
            vec![OscType::Int(0), OscType::Int(0)],
            Duration::from_secs(2),
            "/discover_params",
        )
        .await
        .unwrap_err();
    match err {
        BridgeError::BridgeBusy { attempts } => assert_eq!(attempts, 4),
        other => panic!("expected BridgeBusy, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_chunk_reports_indices_and_next_call_works() {
    let (send_port, recv_port, _requests) = spawn_fake_bridge(vec![
        Reply::Chunked {
            result: big_parameter_result(40),
            piece_size: 300,
            drop_index: Some(1),
        },
        Reply::Success(json!({ "version": "1.2.0" })),
    ])
    .await;
    let client = OscBridgeClient::bind(send_port, recv_port).await.unwrap();

    let err = client
        .request(
            "/discover_params",
            vec![OscType::Int(0), OscType::Int(0)],
            Duration::from_millis(500),
            "/discover_params",
        )
        .await
        .unwrap_err();
    match err {
        BridgeError::Reassembly { missing, .. } => assert_eq!(missing, vec![1]),
        other => panic!("expected Reassembly, got {:?}", other),
    }

    // The failed assembly was discarded; the channel is usable again.
    let result = client
        .request("/ping", vec![], Duration::from_secs(2), "/ping")
        .await
        .unwrap();
    assert_eq!(result["version"], "1.2.0");
}

#[tokio::test(flavor = "multi_thread")]
async fn bridge_error_maps_to_bridge_reported() {
    let (send_port, recv_port, _requests) =
        spawn_fake_bridge(vec![Reply::Error("no such device")]).await;
    let client = OscBridgeClient::bind(send_port, recv_port).await.unwrap();

    let err = client
        .request(
            "/discover_params",
            vec![OscType::Int(9)],
            Duration::from_secs(2),
            "/discover_params",
        )
        .await
        .unwrap_err();
    match err {
        BridgeError::BridgeReported(message) => assert_eq!(message, "no such device"),
        other => panic!("expected BridgeReported, got {:?}", other),
    }
}
