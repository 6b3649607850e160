//! Line-delimited JSON framing for the TCP command channel.
//!
//! Wire format: one JSON object per line, UTF-8, `\n` terminated.
//! Framing is kept free of I/O so the codec can be tested without
//! sockets; the TCP client feeds raw reads into a [`LineBuffer`].

use serde::Serialize;

use crate::command::{DawCommand, DawResponse};
use crate::error::BridgeError;

/// Reject any single line larger than this. A response this size means
/// the peer is broken, not chatty.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Encode a value as one newline-terminated JSON line.
///
/// Oversize payloads fail with a protocol error before anything is
/// written, leaving the connection usable.
pub fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>, BridgeError> {
    let mut bytes = serde_json::to_vec(value)?;
    if bytes.len() >= MAX_LINE_BYTES {
        return Err(BridgeError::Protocol(format!(
            "outgoing frame of {} bytes exceeds the {} byte line limit",
            bytes.len(),
            MAX_LINE_BYTES
        )));
    }
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode_response(line: &[u8]) -> Result<DawResponse, BridgeError> {
    serde_json::from_slice(line)
        .map_err(|e| BridgeError::Protocol(format!("malformed response line: {}", e)))
}

pub fn decode_command(line: &[u8]) -> Result<DawCommand, BridgeError> {
    serde_json::from_slice(line)
        .map_err(|e| BridgeError::Protocol(format!("malformed command line: {}", e)))
}

/// Accumulates raw bytes and yields complete lines.
///
/// Trailing bytes after a newline are kept for the next read. Exceeding
/// [`MAX_LINE_BYTES`] without a newline is a protocol error; the caller
/// is expected to drop the connection at that point.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pop the next complete line (without the terminator), if any.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, BridgeError> {
        if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // the \n
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(Some(line));
        }
        if self.buf.len() >= MAX_LINE_BYTES {
            return Err(BridgeError::Protocol(format!(
                "incoming line exceeds the {} byte limit",
                MAX_LINE_BYTES
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DawCommand;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_decode_roundtrip() {
        let cmd = DawCommand::new("set_tempo").with("bpm", 128);
        let line = encode_line(&cmd).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let back = decode_command(&line[..line.len() - 1]).unwrap();
        assert_eq!(cmd, back);
    }

    #[test]
    fn buffer_keeps_trailing_bytes() {
        let mut buf = LineBuffer::new();
        buf.extend(b"{\"status\":\"success\"}\n{\"sta");
        let first = buf.next_line().unwrap().unwrap();
        assert_eq!(first, b"{\"status\":\"success\"}");
        assert_eq!(buf.next_line().unwrap(), None);
        buf.extend(b"tus\":\"error\",\"message\":\"x\"}\n");
        let second = buf.next_line().unwrap().unwrap();
        let resp = decode_response(&second).unwrap();
        assert!(!resp.is_success());
    }

    #[test]
    fn buffer_splits_multiple_lines() {
        let mut buf = LineBuffer::new();
        buf.extend(b"{\"status\":\"success\"}\r\n{\"status\":\"success\"}\n");
        assert!(buf.next_line().unwrap().is_some());
        assert!(buf.next_line().unwrap().is_some());
        assert!(buf.next_line().unwrap().is_none());
    }

    #[test]
    fn oversize_line_is_protocol_error() {
        let mut buf = LineBuffer::new();
        buf.extend(&vec![b'x'; MAX_LINE_BYTES]);
        match buf.next_line() {
            Err(BridgeError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn oversize_outgoing_frame_rejected() {
        let big = serde_json::json!({ "blob": "y".repeat(MAX_LINE_BYTES) });
        match encode_line(&big) {
            Err(BridgeError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other),
        }
    }
}
