//! UDP real-time sender.
//!
//! Fire-and-forget parameter updates at ≥50 Hz. No reads, no retries,
//! no acknowledgment; callers accept loss and reordering. Rate limiting
//! is the caller's problem, payload size is ours.

use livewire::command::DawCommand;
use livewire::error::BridgeError;
use tokio::net::UdpSocket;

/// Largest payload we will put in a single datagram. Everything the
/// real-time channel carries is far below this.
pub const MAX_DATAGRAM_BYTES: usize = 1400;

#[derive(Debug)]
pub struct RealtimeSender {
    socket: UdpSocket,
}

impl RealtimeSender {
    pub async fn bind(target_port: u16) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).await?;
        socket.connect(("127.0.0.1", target_port)).await?;
        Ok(Self { socket })
    }

    /// Send one `{type, params}` datagram and return immediately.
    pub async fn send(&self, cmd: &DawCommand) -> Result<(), BridgeError> {
        let bytes = serde_json::to_vec(cmd)?;
        if bytes.len() > MAX_DATAGRAM_BYTES {
            return Err(BridgeError::invalid_input(
                "params",
                format!(
                    "real-time payload of {} bytes exceeds the {} byte datagram cap",
                    bytes.len(),
                    MAX_DATAGRAM_BYTES
                ),
            ));
        }
        self.socket
            .send(&bytes)
            .await
            .map_err(|e| BridgeError::Disconnected(format!("real-time send failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn sends_one_datagram() {
        let receiver = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let sender = RealtimeSender::bind(port).await.unwrap();

        let cmd = DawCommand::new("set_param_rt")
            .with("track_index", 0)
            .with("param", "cutoff")
            .with("value", 0.42);
        sender.send(&cmd).await.unwrap();

        let mut buf = [0u8; 2048];
        let n = receiver.recv(&mut buf).await.unwrap();
        let value: Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(value["type"], "set_param_rt");
        assert_eq!(value["params"]["param"], "cutoff");
    }

    #[tokio::test]
    async fn oversize_payload_rejected_before_send() {
        let receiver = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let sender = RealtimeSender::bind(receiver.local_addr().unwrap().port())
            .await
            .unwrap();

        let cmd = DawCommand::new("set_param_rt").with("blob", "x".repeat(MAX_DATAGRAM_BYTES));
        match sender.send(&cmd).await {
            Err(BridgeError::InvalidInput { field, .. }) => assert_eq!(field, "params"),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }
}
