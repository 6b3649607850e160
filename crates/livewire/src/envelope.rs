//! The uniform result envelope returned to the agent.
//!
//! Handlers never format errors themselves; they return a [`ToolOutput`]
//! or a [`BridgeError`] and the dispatcher wraps either into this shape:
//!
//! - success: `{"status":"ok","message":...,"data"?:...}`
//! - error:   `{"status":"error","kind":...,"message":...,"details"?:...}`

use serde_json::{json, Value};

use crate::error::BridgeError;

/// What a tool handler hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// One-line human summary.
    pub message: String,
    /// Optional structured payload.
    pub data: Option<Value>,
}

impl ToolOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Success envelope.
pub fn ok_envelope(output: &ToolOutput) -> Value {
    match &output.data {
        Some(data) => json!({
            "status": "ok",
            "message": output.message,
            "data": data,
        }),
        None => json!({
            "status": "ok",
            "message": output.message,
        }),
    }
}

/// Error envelope. `prefix` is the tool's registered error label, so the
/// agent sees which operation failed without parsing internals.
pub fn error_envelope(err: &BridgeError, prefix: &str) -> Value {
    let message = if prefix.is_empty() {
        err.public_message()
    } else {
        format!("{}: {}", prefix, err.public_message())
    };
    match err.details() {
        Some(details) => json!({
            "status": "error",
            "kind": err.kind(),
            "message": message,
            "details": details,
        }),
        None => json!({
            "status": "error",
            "kind": err.kind(),
            "message": message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ok_envelope_shape() {
        let env = ok_envelope(&ToolOutput::with_data("tempo set to 128", json!({"bpm": 128})));
        assert_eq!(env["status"], "ok");
        assert_eq!(env["message"], "tempo set to 128");
        assert_eq!(env["data"]["bpm"], 128);
    }

    #[test]
    fn ok_envelope_omits_absent_data() {
        let env = ok_envelope(&ToolOutput::message("done"));
        assert!(env.get("data").is_none());
    }

    #[test]
    fn error_envelope_carries_kind_and_prefix() {
        let err = BridgeError::DawReported("unknown device".into());
        let env = error_envelope(&err, "load device failed");
        assert_eq!(env["status"], "error");
        assert_eq!(env["kind"], "daw_reported");
        assert_eq!(env["message"], "load device failed: DAW reported: unknown device");
    }

    #[test]
    fn internal_error_is_generic_to_caller() {
        let err = BridgeError::internal("lock poisoned at foo.rs:42");
        let env = error_envelope(&err, "");
        assert_eq!(env["message"], "internal error");
    }
}
