//! TCP command client.
//!
//! One long-lived connection to the DAW scripting endpoint. The socket
//! is owned here and only touched while holding the writer mutex, so
//! commands go out strictly one at a time and responses are read in the
//! same order. Reconnection uses capped exponential backoff; the first
//! successful session latches the DAW-connected readiness event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use livewire::command::{DawCommand, DawResponse};
use livewire::error::BridgeError;
use livewire::frame::{self, LineBuffer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::readiness::ReadyFlag;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const BACKOFF_START: Duration = Duration::from_millis(250);
const BACKOFF_CAP: Duration = Duration::from_secs(5);
const CONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Default)]
struct Connection {
    stream: Option<TcpStream>,
    rx: LineBuffer,
}

#[derive(Debug)]
pub struct TcpCommandClient {
    addr: String,
    conn: Mutex<Connection>,
    link_up: AtomicBool,
    daw_connected: ReadyFlag,
}

impl TcpCommandClient {
    pub fn new(addr: String, daw_connected: ReadyFlag) -> Self {
        Self {
            addr,
            conn: Mutex::new(Connection::default()),
            link_up: AtomicBool::new(false),
            daw_connected,
        }
    }

    /// Whether a session is currently open. Reconnection is lazy, so
    /// `false` only means no command has succeeded since the last drop.
    pub fn is_connected(&self) -> bool {
        self.link_up.load(Ordering::Relaxed)
    }

    /// Cheap reachability check that does not disturb the command
    /// session: a throwaway connect, immediately dropped.
    pub async fn probe(&self) -> bool {
        if self.is_connected() {
            return true;
        }
        matches!(
            tokio::time::timeout(Duration::from_secs(1), TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }

    /// Take exclusive ownership of the wire. Callers (the pipeline)
    /// hold the guard across send, read, retry, and post-delay.
    pub async fn acquire(&self) -> TcpGuard<'_> {
        TcpGuard {
            client: self,
            conn: self.conn.lock().await,
        }
    }
}

/// Exclusive access to the DAW connection.
pub struct TcpGuard<'a> {
    client: &'a TcpCommandClient,
    conn: MutexGuard<'a, Connection>,
}

impl TcpGuard<'_> {
    /// Send one command and read its response within `deadline`.
    ///
    /// Any failure past the framing check drops the socket so the next
    /// caller starts with a fresh session and a drained buffer; whether
    /// to retry is the pipeline's decision.
    pub async fn request(
        &mut self,
        cmd: &DawCommand,
        deadline: Duration,
    ) -> Result<DawResponse, BridgeError> {
        // Oversize frames fail before any I/O; the connection stays usable.
        let outgoing = frame::encode_line(cmd)?;

        self.ensure_connected().await?;

        let result = {
            let Connection { stream, rx } = &mut *self.conn;
            match stream.as_mut() {
                Some(stream) => exchange(stream, rx, &outgoing, &cmd.name, deadline).await,
                None => Err(BridgeError::Disconnected("no session".to_string())),
            }
        };

        if result.is_err() {
            self.drop_connection();
        }
        result
    }

    /// Drop the current session and open a fresh one.
    pub async fn reconnect(&mut self) -> Result<(), BridgeError> {
        self.drop_connection();
        self.ensure_connected().await
    }

    async fn ensure_connected(&mut self) -> Result<(), BridgeError> {
        if self.conn.stream.is_some() {
            return Ok(());
        }

        let mut backoff = BACKOFF_START;
        let mut last_error = String::new();
        for attempt in 1..=CONNECT_ATTEMPTS {
            match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.client.addr)).await
            {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("set_nodelay failed: {}", e);
                    }
                    self.conn.stream = Some(stream);
                    self.conn.rx.clear();
                    self.client.link_up.store(true, Ordering::Relaxed);
                    if !self.client.daw_connected.is_set() {
                        info!("DAW connected at {}", self.client.addr);
                        self.client.daw_connected.set();
                    } else {
                        debug!("DAW session re-established at {}", self.client.addr);
                    }
                    return Ok(());
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = "connect timed out".to_string(),
            }

            if attempt < CONNECT_ATTEMPTS {
                warn!(
                    "connect to DAW failed (attempt {}/{}): {}; retrying in {:?}",
                    attempt, CONNECT_ATTEMPTS, last_error, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }
        }

        Err(BridgeError::Disconnected(format!(
            "DAW unreachable at {}: {}",
            self.client.addr, last_error
        )))
    }

    fn drop_connection(&mut self) {
        self.conn.stream = None;
        self.conn.rx.clear();
        self.client.link_up.store(false, Ordering::Relaxed);
    }
}

/// One write + framed read on an open stream.
async fn exchange(
    stream: &mut TcpStream,
    rx: &mut LineBuffer,
    outgoing: &[u8],
    command_name: &str,
    deadline: Duration,
) -> Result<DawResponse, BridgeError> {
    let started = Instant::now();

    stream
        .write_all(outgoing)
        .await
        .map_err(|e| BridgeError::Disconnected(format!("write failed: {}", e)))?;

    loop {
        if let Some(line) = rx.next_line()? {
            return frame::decode_response(&line);
        }

        let remaining = match deadline.checked_sub(started.elapsed()) {
            Some(d) if !d.is_zero() => d,
            _ => {
                return Err(BridgeError::timeout(
                    command_name,
                    deadline.as_millis() as u64,
                ))
            }
        };

        let mut buf = [0u8; 8192];
        match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                return Err(BridgeError::Disconnected(
                    "connection closed by DAW".to_string(),
                ))
            }
            Ok(Ok(n)) => rx.extend(&buf[..n]),
            Ok(Err(e)) => return Err(BridgeError::Disconnected(format!("read failed: {}", e))),
            Err(_) => {
                return Err(BridgeError::timeout(
                    command_name,
                    deadline.as_millis() as u64,
                ))
            }
        }
    }
}
