//! Shared fixtures: port allocation and an in-process fake DAW.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use livewire::command::DawCommand;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Reserve a loopback UDP port. The socket is dropped immediately, so
/// the caller should bind it soon after.
pub fn free_udp_port() -> u16 {
    std::net::UdpSocket::bind(("127.0.0.1", 0))
        .expect("udp port probe")
        .local_addr()
        .expect("udp local addr")
        .port()
}

/// How the fake DAW treats each incoming command, in receipt order.
/// After the script is exhausted every command succeeds.
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply `{"status":"success","result":{...}}` built from the command.
    Succeed,
    /// Reply `{"status":"error","message":...}`.
    Fail(&'static str),
    /// Read the command, then close the connection without replying.
    CloseWithoutReply,
}

/// Counts every command line the fake DAW receives.
pub type Receipts = Arc<AtomicUsize>;

/// Spawn a fake DAW on an OS-assigned port. Accepts any number of
/// consecutive connections (reconnects land on the next accept).
pub async fn spawn_fake_daw(script: Vec<Script>) -> (u16, Receipts) {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("fake DAW bind");
    let port = listener.local_addr().expect("fake DAW addr").port();
    let receipts: Receipts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&receipts);

    tokio::spawn(async move {
        let mut step = 0usize;

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let mut reader = BufReader::new(stream);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break, // client went away, await next accept
                    Ok(_) => {}
                }
                if line.trim().is_empty() {
                    continue;
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let cmd: DawCommand = match serde_json::from_str(line.trim()) {
                    Ok(cmd) => cmd,
                    Err(_) => continue,
                };

                let action = script.get(step).cloned().unwrap_or(Script::Succeed);
                step += 1;

                let reply = match action {
                    Script::Succeed => success_reply(&cmd),
                    Script::Fail(message) => {
                        json!({ "status": "error", "message": message })
                    }
                    Script::CloseWithoutReply => break, // drop the connection
                };

                let mut bytes = serde_json::to_vec(&reply).unwrap();
                bytes.push(b'\n');
                if reader.get_mut().write_all(&bytes).await.is_err() {
                    break;
                }
            }
        }
    });

    (port, receipts)
}

fn success_reply(cmd: &DawCommand) -> Value {
    let result = match cmd.name.as_str() {
        "create_midi_track" | "create_audio_track" => json!({ "track_index": 0 }),
        "load_instrument_or_effect" => json!({ "device_index": 0 }),
        "get_session_info" => json!({ "tempo": 120.0, "tracks": 2, "scenes": 8 }),
        "get_tracks" => json!({ "tracks": [] }),
        _ => json!({ "command": cmd.name }),
    };
    json!({ "status": "success", "result": result })
}
