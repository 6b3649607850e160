//! DAW command and response types.
//!
//! A command is one JSON object per line on the TCP channel. The bridge
//! treats `params` as opaque; only the command name participates in
//! tier and idempotency classification.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// A single command for the DAW scripting endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DawCommand {
    /// Handler name on the DAW side, e.g. `set_tempo`.
    #[serde(rename = "type")]
    pub name: String,

    /// Named arguments, passed through verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl DawCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Response status as reported by the DAW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DawStatus {
    Success,
    Error,
}

/// One JSON line back from the DAW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DawResponse {
    pub status: DawStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Human-readable explanation, present on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DawResponse {
    pub fn is_success(&self) -> bool {
        self.status == DawStatus::Success
    }

    /// Collapse into the result payload, mapping DAW-side errors to
    /// [`BridgeError::DawReported`].
    pub fn into_result(self) -> Result<Value, BridgeError> {
        match self.status {
            DawStatus::Success => Ok(self.result.unwrap_or(Value::Null)),
            DawStatus::Error => Err(BridgeError::DawReported(
                self.message
                    .unwrap_or_else(|| "unspecified DAW error".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_serializes_with_type_field() {
        let cmd = DawCommand::new("set_tempo").with("bpm", 128);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "set_tempo");
        assert_eq!(json["params"]["bpm"], 128);
    }

    #[test]
    fn command_roundtrip() {
        let cmd = DawCommand::new("create_clip")
            .with("track_index", 2)
            .with("length", 4.0);
        let json = serde_json::to_string(&cmd).unwrap();
        let back: DawCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, back);
    }

    #[test]
    fn empty_params_omitted() {
        let cmd = DawCommand::new("get_session_info");
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn error_response_becomes_daw_reported() {
        let resp: DawResponse =
            serde_json::from_str(r#"{"status":"error","message":"unknown device"}"#).unwrap();
        match resp.into_result() {
            Err(BridgeError::DawReported(msg)) => assert_eq!(msg, "unknown device"),
            other => panic!("expected DawReported, got {:?}", other),
        }
    }

    #[test]
    fn success_without_result_is_null() {
        let resp: DawResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }
}
