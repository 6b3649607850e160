//! The closed error taxonomy for the bridge.
//!
//! Every failure a handler or transport can produce is one of these
//! kinds. The dispatcher maps them onto the JSON error envelope; nothing
//! else in the system invents error shapes.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Validation failed before any I/O happened.
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// A precondition resource is unavailable.
    #[error("{0} is not ready")]
    NotReady(String),

    /// A bounded wait expired without resolution.
    #[error("timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A transport was lost and could not be re-established.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// The DAW answered with `status=error`.
    #[error("DAW reported: {0}")]
    DawReported(String),

    /// The OSC bridge rejected an operation because another is in flight.
    #[error("bridge busy after {attempts} attempt(s)")]
    BridgeBusy { attempts: u32 },

    /// The OSC bridge answered with an error of its own.
    #[error("bridge reported: {0}")]
    BridgeReported(String),

    /// Unparseable framing, wrong field types, malformed packets.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Chunked response never completed.
    #[error("reassembly incomplete: got {received} of {expected} chunks, missing {missing:?}")]
    Reassembly {
        missing: Vec<u32>,
        received: u32,
        expected: u32,
    },

    /// Everything else. The detail is logged; callers see a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    /// Stable snake_case label for the envelope `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotReady(_) => "not_ready",
            Self::Timeout { .. } => "timeout",
            Self::Disconnected(_) => "disconnected",
            Self::DawReported(_) => "daw_reported",
            Self::BridgeBusy { .. } => "bridge_busy",
            Self::BridgeReported(_) => "bridge_reported",
            Self::Protocol(_) => "protocol_error",
            Self::Reassembly { .. } => "protocol_error",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the command pipeline may retry after this failure.
    ///
    /// Only connection-level failures qualify; a DAW- or bridge-reported
    /// error means the command arrived and must not be repeated.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Timeout { .. })
    }

    /// Message safe to show the caller. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Structured details for the envelope, where the kind has any.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::InvalidInput { field, .. } => Some(json!({ "field": field })),
            Self::Timeout {
                operation,
                timeout_ms,
            } => Some(json!({ "operation": operation, "timeout_ms": timeout_ms })),
            Self::BridgeBusy { attempts } => Some(json!({ "attempts": attempts })),
            Self::Reassembly {
                missing,
                received,
                expected,
            } => Some(json!({
                "missing_indices": missing,
                "received": received,
                "expected": expected,
            })),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Disconnected(e.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(BridgeError::invalid_input("bpm", "not a number").kind(), "invalid_input");
        assert_eq!(BridgeError::timeout("read", 10_000).kind(), "timeout");
        assert_eq!(BridgeError::BridgeBusy { attempts: 3 }.kind(), "bridge_busy");
        assert_eq!(
            BridgeError::Reassembly {
                missing: vec![2],
                received: 3,
                expected: 4
            }
            .kind(),
            "protocol_error"
        );
    }

    #[test]
    fn only_connection_failures_are_retryable() {
        assert!(BridgeError::Disconnected("reset".into()).is_connection_failure());
        assert!(BridgeError::timeout("read", 1).is_connection_failure());
        assert!(!BridgeError::DawReported("nope".into()).is_connection_failure());
        assert!(!BridgeError::Protocol("bad frame".into()).is_connection_failure());
    }

    #[test]
    fn internal_detail_is_not_public() {
        let e = BridgeError::internal("stack trace gore");
        assert_eq!(e.public_message(), "internal error");
        assert!(e.to_string().contains("stack trace gore"));
    }

    #[test]
    fn reassembly_details_enumerate_missing() {
        let e = BridgeError::Reassembly {
            missing: vec![1, 3],
            received: 2,
            expected: 4,
        };
        let d = e.details().unwrap();
        assert_eq!(d["missing_indices"], serde_json::json!([1, 3]));
    }
}
