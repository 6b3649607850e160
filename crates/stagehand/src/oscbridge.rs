//! OSC bridge client.
//!
//! Request/response over two UDP ports to the in-DAW scripting device.
//! A dedicated reader task owns the receive socket and routes decoded
//! responses to callers by `request_id`; callers register a oneshot in
//! the pending map, send, and wait with a deadline. Chunked responses
//! are reassembled before routing. The bridge device serializes its own
//! long operations and answers `busy` to overlap; this client forwards
//! requests as issued and surfaces that.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use livewire::chunk::{ChunkAssembly, DecodedMessage};
use livewire::error::BridgeError;
use rosc::{OscMessage, OscPacket, OscType};
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// TTL for the cached ping result.
const PING_TTL: Duration = Duration::from_secs(5);
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Floor for discovery/batch deadlines.
const DYNAMIC_TIMEOUT_FLOOR: Duration = Duration::from_secs(10);
/// Per-parameter allowance on top of the floor.
const PER_PARAM_ALLOWANCE: Duration = Duration::from_millis(150);

/// Backoffs between retries when the bridge reports busy on a
/// queueable command.
const BUSY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(1000),
    Duration::from_millis(1500),
];

type PendingMap = Arc<DashMap<String, oneshot::Sender<Value>>>;
type AssemblySlot = Arc<Mutex<Option<ChunkAssembly>>>;

#[derive(Debug)]
pub struct OscBridgeClient {
    send_sock: UdpSocket,
    pending: PendingMap,
    assembly: AssemblySlot,
    ping_cache: Mutex<Option<(Instant, String)>>,
    reader: JoinHandle<()>,
}

impl OscBridgeClient {
    /// Bind both UDP ports and start the reader task.
    pub async fn bind(send_port: u16, recv_port: u16) -> Result<Self, std::io::Error> {
        let recv_sock = UdpSocket::bind(("127.0.0.1", recv_port)).await?;
        let send_sock = UdpSocket::bind(("127.0.0.1", 0)).await?;
        send_sock.connect(("127.0.0.1", send_port)).await?;

        let pending: PendingMap = Arc::new(DashMap::new());
        let assembly: AssemblySlot = Arc::new(Mutex::new(None));

        let reader = tokio::spawn(reader_loop(
            recv_sock,
            Arc::clone(&pending),
            Arc::clone(&assembly),
        ));

        Ok(Self {
            send_sock,
            pending,
            assembly,
            ping_cache: Mutex::new(None),
            reader,
        })
    }

    /// Deadline for a batch/discovery command, scaled by declared size.
    pub fn dynamic_timeout(declared_size: usize) -> Duration {
        DYNAMIC_TIMEOUT_FLOOR.max(PER_PARAM_ALLOWANCE * declared_size as u32)
    }

    /// One OSC round-trip. The request id is appended as the final
    /// argument; the response (chunked or not) is matched on it.
    pub async fn request(
        &self,
        addr: &str,
        mut args: Vec<OscType>,
        timeout: Duration,
        operation: &str,
    ) -> Result<Value, BridgeError> {
        let request_id = new_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        args.push(OscType::String(request_id.clone()));

        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let bytes = rosc::encoder::encode(&packet)
            .map_err(|e| BridgeError::Protocol(format!("OSC encode failed: {}", e)))?;

        if let Err(e) = self.send_sock.send(&bytes).await {
            self.pending.remove(&request_id);
            return Err(BridgeError::Disconnected(format!(
                "bridge send failed: {}",
                e
            )));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => interpret_response(response),
            Ok(Err(_)) => Err(BridgeError::internal("bridge response channel closed")),
            Err(_) => {
                self.pending.remove(&request_id);
                // A partial assembly at our deadline means chunks went
                // missing; report which ones so the gap is diagnosable.
                let partial = self.assembly.lock().await.take();
                match partial {
                    Some(a) if a.received() > 0 => Err(a.into_failure()),
                    _ => Err(BridgeError::timeout(operation, timeout.as_millis() as u64)),
                }
            }
        }
    }

    /// Like [`request`](Self::request), but retries on `busy` for
    /// commands the bridge queues (discovery, batches).
    pub async fn request_queueable(
        &self,
        addr: &str,
        args: Vec<OscType>,
        timeout: Duration,
        operation: &str,
    ) -> Result<Value, BridgeError> {
        let mut attempts: u32 = 0;
        for backoff in BUSY_BACKOFF {
            attempts += 1;
            match self.request(addr, args.clone(), timeout, operation).await {
                Err(BridgeError::BridgeBusy { .. }) => {
                    debug!(
                        "bridge busy on {} (attempt {}), backing off {:?}",
                        operation, attempts, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
        attempts += 1;
        match self.request(addr, args, timeout, operation).await {
            Err(BridgeError::BridgeBusy { .. }) => Err(BridgeError::BridgeBusy { attempts }),
            other => other,
        }
    }

    /// Bridge health with a short-TTL cache; lookups within the TTL
    /// skip the round-trip.
    pub async fn ping(&self) -> Result<String, BridgeError> {
        {
            let cache = self.ping_cache.lock().await;
            if let Some((at, version)) = cache.as_ref() {
                if at.elapsed() < PING_TTL {
                    return Ok(version.clone());
                }
            }
        }

        let response = self.request("/ping", Vec::new(), PING_TIMEOUT, "ping").await?;
        let version = response
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        *self.ping_cache.lock().await = Some((Instant::now(), version.clone()));
        Ok(version)
    }

    pub async fn is_connected(&self) -> bool {
        self.ping().await.is_ok()
    }

    pub async fn version(&self) -> Option<String> {
        self.ping().await.ok()
    }
}

impl Drop for OscBridgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn new_request_id() -> String {
    let full = uuid::Uuid::new_v4().simple().to_string();
    full[..12].to_string()
}

/// Map the bridge's JSON reply to the error taxonomy.
fn interpret_response(value: Value) -> Result<Value, BridgeError> {
    match value.get("status").and_then(Value::as_str) {
        Some("success") => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        Some("busy") => Err(BridgeError::BridgeBusy { attempts: 1 }),
        Some("error") => Err(BridgeError::BridgeReported(
            value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified bridge error")
                .to_string(),
        )),
        _ => Err(BridgeError::Protocol(
            "bridge response missing status".to_string(),
        )),
    }
}

async fn reader_loop(sock: UdpSocket, pending: PendingMap, assembly: AssemblySlot) {
    let mut buf = vec![0u8; 65536];
    loop {
        let n = match sock.recv(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("bridge receive socket failed: {}", e);
                break;
            }
        };

        let packet = match rosc::decoder::decode_udp(&buf[..n]) {
            Ok((_, packet)) => packet,
            Err(e) => {
                warn!("undecodable OSC datagram ({} bytes): {}", n, e);
                continue;
            }
        };

        let msg = match packet {
            OscPacket::Message(msg) => msg,
            OscPacket::Bundle(_) => {
                warn!("ignoring OSC bundle from bridge");
                continue;
            }
        };

        let payload = match msg.args.iter().find_map(|a| match a {
            OscType::String(s) => Some(s.as_str()),
            _ => None,
        }) {
            Some(s) => s,
            None => {
                warn!("bridge message {} carries no string payload", msg.addr);
                continue;
            }
        };

        match livewire::chunk::decode_message(payload) {
            Ok(DecodedMessage::Whole(value)) => deliver(&pending, value),
            Ok(DecodedMessage::Chunk(env)) => {
                let complete = {
                    let mut slot = assembly.lock().await;
                    let mut current = match slot.take() {
                        Some(a) if a.expected() == env.total => a,
                        Some(a) => {
                            warn!(
                                "chunk total changed mid-assembly ({} -> {}), restarting",
                                a.expected(),
                                env.total
                            );
                            ChunkAssembly::new(env.total)
                        }
                        None => ChunkAssembly::new(env.total),
                    };

                    match current.insert(&env) {
                        Ok(true) => {}
                        Ok(false) => debug!("duplicate chunk {} ignored", env.index),
                        Err(e) => warn!("dropping bad chunk: {}", e),
                    }

                    if current.is_complete() {
                        Some(current)
                    } else {
                        *slot = Some(current);
                        None
                    }
                };

                if let Some(done) = complete {
                    match done.assemble() {
                        Ok(value) => deliver(&pending, value),
                        Err(e) => warn!("chunk reassembly failed: {}", e),
                    }
                }
            }
            Err(e) => warn!("undecodable bridge payload: {}", e),
        }
    }
}

/// Route a decoded response to its caller. Late arrivals from
/// timed-out calls have no pending entry and are discarded.
fn deliver(pending: &PendingMap, value: Value) {
    let id = match value.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            warn!("bridge response without an id, discarding");
            return;
        }
    };
    match pending.remove(&id) {
        Some((_, tx)) => {
            let _ = tx.send(value);
        }
        None => debug!("late bridge response for {}, discarding", id),
    }
}
