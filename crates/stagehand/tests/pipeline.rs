//! Pipeline behavior against an in-process fake DAW: correlation,
//! retry policy, pacing, and error mapping.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{free_udp_port, spawn_fake_daw, Script};
use livewire::command::DawCommand;
use livewire::error::BridgeError;
use stagehand::oscbridge::OscBridgeClient;
use stagehand::pipeline::Pipeline;
use stagehand::readiness::ReadyFlag;
use stagehand::tcp::TcpCommandClient;

async fn test_pipeline(tcp_port: u16) -> Pipeline {
    let tcp = Arc::new(TcpCommandClient::new(
        format!("127.0.0.1:{}", tcp_port),
        ReadyFlag::new(),
    ));
    // No bridge peer needed for TCP-side tests; the ports just have to bind.
    let bridge = Arc::new(
        OscBridgeClient::bind(free_udp_port(), free_udp_port())
            .await
            .expect("bridge bind"),
    );
    Pipeline::new(tcp, bridge)
}

#[tokio::test(flavor = "multi_thread")]
async fn command_gets_exactly_its_own_response() {
    let (port, receipts) = spawn_fake_daw(vec![]).await;
    let pipeline = test_pipeline(port).await;

    let result = pipeline
        .run_daw(DawCommand::new("set_tempo").with("bpm", 128), None)
        .await
        .unwrap();
    assert_eq!(result["command"], "set_tempo");

    let info = pipeline
        .run_daw(DawCommand::new("get_session_info"), None)
        .await
        .unwrap();
    assert_eq!(info["tempo"], 120.0);

    assert_eq!(receipts.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn idempotent_command_retries_once_after_disconnect() {
    // First receipt: connection dropped without a reply. Second: success.
    let (port, receipts) = spawn_fake_daw(vec![Script::CloseWithoutReply]).await;
    let pipeline = test_pipeline(port).await;

    let result = pipeline
        .run_daw(DawCommand::new("get_session_info"), None)
        .await
        .unwrap();
    assert_eq!(result["tempo"], 120.0);

    // Attempted exactly twice: the failed send plus one retry.
    assert_eq!(receipts.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_idempotent_command_is_never_retried() {
    let (port, receipts) = spawn_fake_daw(vec![Script::CloseWithoutReply]).await;
    let pipeline = test_pipeline(port).await;

    let err = pipeline
        .run_daw(DawCommand::new("create_midi_track"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Disconnected(_)), "{:?}", err);

    // Attempted exactly once despite the transport failure.
    assert_eq!(receipts.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn structural_command_settles_before_the_next_one() {
    let (port, _receipts) = spawn_fake_daw(vec![]).await;
    let pipeline = test_pipeline(port).await;

    let started = Instant::now();
    pipeline
        .run_daw(
            DawCommand::new("create_clip")
                .with("track_index", 0)
                .with("slot_index", 0)
                .with("length", 4.0),
            None,
        )
        .await
        .unwrap();
    pipeline
        .run_daw(DawCommand::new("set_tempo").with("bpm", 120), None)
        .await
        .unwrap();

    // create_clip is tier 2: the second command cannot have started
    // before the 100 ms post-delay elapsed.
    assert!(
        started.elapsed() >= Duration::from_millis(100),
        "elapsed {:?}",
        started.elapsed()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn daw_error_maps_to_daw_reported() {
    let (port, _receipts) = spawn_fake_daw(vec![Script::Fail("unknown device")]).await;
    let pipeline = test_pipeline(port).await;

    let err = pipeline
        .run_daw(
            DawCommand::new("load_instrument_or_effect")
                .with("track_index", 0)
                .with("uri", "Wavetable"),
            None,
        )
        .await
        .unwrap_err();
    match err {
        BridgeError::DawReported(message) => assert_eq!(message, "unknown device"),
        other => panic!("expected DawReported, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn oversize_frame_fails_cleanly_and_session_survives() {
    let (port, receipts) = spawn_fake_daw(vec![]).await;
    let pipeline = test_pipeline(port).await;

    let huge = "x".repeat(16 * 1024 * 1024);
    let err = pipeline
        .run_daw(DawCommand::new("set_clip_name").with("name", huge), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Protocol(_)), "{:?}", err);
    // Nothing reached the wire.
    assert_eq!(receipts.load(Ordering::SeqCst), 0);

    // The channel is still usable afterwards.
    let result = pipeline
        .run_daw(DawCommand::new("get_session_info"), None)
        .await
        .unwrap();
    assert_eq!(result["tracks"], 2);
}
