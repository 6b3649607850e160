//! The command pipeline.
//!
//! The single waypoint between tool handlers and the DAW transports.
//! Tier pacing, idempotency policy, timeouts, and the retry-once rule
//! live here and nowhere else. Two entry points: one for the TCP
//! command channel, one for the OSC bridge.

use std::sync::Arc;
use std::time::Duration;

use livewire::command::DawCommand;
use livewire::error::BridgeError;
use livewire::tier;
use rosc::OscType;
use serde_json::Value;
use tracing::{debug, warn};

use crate::oscbridge::OscBridgeClient;
use crate::tcp::TcpCommandClient;

#[derive(Debug)]
pub struct Pipeline {
    tcp: Arc<TcpCommandClient>,
    bridge: Arc<OscBridgeClient>,
}

impl Pipeline {
    pub fn new(tcp: Arc<TcpCommandClient>, bridge: Arc<OscBridgeClient>) -> Self {
        Self { tcp, bridge }
    }

    /// Run one command on the TCP channel.
    ///
    /// Holds the transport's writer mutex across send, read, an
    /// optional reconnect-and-retry, and the tier's post-delay, so the
    /// next command cannot start before the DAW has settled.
    pub async fn run_daw(
        &self,
        cmd: DawCommand,
        timeout: Option<Duration>,
    ) -> Result<Value, BridgeError> {
        if !tier::is_known_command(&cmd.name) {
            debug!("forwarding unclassified command '{}'", cmd.name);
        }
        let deadline = tier::command_timeout(&cmd.name, timeout);
        let command_tier = tier::command_tier(&cmd.name);
        let idempotent = tier::is_idempotent(&cmd.name);

        let mut guard = self.tcp.acquire().await;

        let response = match guard.request(&cmd, deadline).await {
            Ok(response) => response,
            Err(e) if idempotent && e.is_connection_failure() => {
                warn!("'{}' failed ({}), reconnecting for one retry", cmd.name, e);
                guard.reconnect().await?;
                guard.request(&cmd, deadline).await?
            }
            Err(e) => {
                if !idempotent && e.is_connection_failure() {
                    warn!("'{}' is not idempotent, failing without retry", cmd.name);
                }
                return Err(e);
            }
        };

        let result = response.into_result()?;

        let settle = command_tier.post_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(result)
    }

    /// Run one request on the OSC bridge channel.
    ///
    /// `declared_size` scales the deadline; `queueable` enables the
    /// busy-retry helper for commands the bridge queues.
    pub async fn run_bridge(
        &self,
        addr: &str,
        args: Vec<OscType>,
        declared_size: usize,
        queueable: bool,
    ) -> Result<Value, BridgeError> {
        let timeout = OscBridgeClient::dynamic_timeout(declared_size);
        if queueable {
            self.bridge
                .request_queueable(addr, args, timeout, addr)
                .await
        } else {
            self.bridge.request(addr, args, timeout, addr).await
        }
    }
}
