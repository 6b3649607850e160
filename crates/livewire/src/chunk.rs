//! Chunk envelope codec for the OSC bridge channel.
//!
//! Large bridge responses do not fit one UDP datagram, so the in-DAW
//! script splits them: each datagram carries a single OSC string that
//! is URL-safe base64 of either the whole JSON response or of a chunk
//! envelope `{_c: index, _t: total, _d: base64-payload}`. Chunk
//! payloads decode independently and concatenate in index order.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

/// One piece of a split response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    #[serde(rename = "_c")]
    pub index: u32,
    #[serde(rename = "_t")]
    pub total: u32,
    /// URL-safe base64 of this slice of the response bytes.
    #[serde(rename = "_d")]
    pub data: String,
}

/// A decoded bridge datagram: either a complete JSON response or one
/// chunk of a split response.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Whole(Value),
    Chunk(ChunkEnvelope),
}

/// Decode one OSC string payload from the bridge.
pub fn decode_message(payload: &str) -> Result<DecodedMessage, BridgeError> {
    let bytes = URL_SAFE
        .decode(payload.trim())
        .map_err(|e| BridgeError::Protocol(format!("bad base64 in bridge datagram: {}", e)))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| BridgeError::Protocol(format!("bad JSON in bridge datagram: {}", e)))?;

    let is_chunk = value.get("_c").is_some() && value.get("_t").is_some();
    if is_chunk {
        let env: ChunkEnvelope = serde_json::from_value(value)
            .map_err(|e| BridgeError::Protocol(format!("malformed chunk envelope: {}", e)))?;
        Ok(DecodedMessage::Chunk(env))
    } else {
        Ok(DecodedMessage::Whole(value))
    }
}

/// Encode a complete response the way the bridge does, for tests and
/// for the wire contract documentation.
pub fn encode_whole(value: &Value) -> String {
    URL_SAFE.encode(serde_json::to_vec(value).unwrap_or_default())
}

/// Split response bytes into chunk datagram payloads of at most
/// `piece_size` source bytes each.
pub fn split_into_chunks(payload: &[u8], piece_size: usize) -> Vec<String> {
    assert!(piece_size > 0, "piece_size must be positive");
    let pieces: Vec<&[u8]> = payload.chunks(piece_size).collect();
    let total = pieces.len() as u32;
    pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let env = ChunkEnvelope {
                index: i as u32,
                total,
                data: URL_SAFE.encode(piece),
            };
            URL_SAFE.encode(serde_json::to_vec(&env).unwrap_or_default())
        })
        .collect()
}

/// Reassembly state for one in-flight chunked response.
#[derive(Debug)]
pub struct ChunkAssembly {
    expected: u32,
    parts: BTreeMap<u32, Vec<u8>>,
}

impl ChunkAssembly {
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            parts: BTreeMap::new(),
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn received(&self) -> u32 {
        self.parts.len() as u32
    }

    /// Insert one chunk. Returns `false` for duplicates, which callers
    /// log and ignore.
    pub fn insert(&mut self, env: &ChunkEnvelope) -> Result<bool, BridgeError> {
        if env.index >= self.expected {
            return Err(BridgeError::Protocol(format!(
                "chunk index {} out of range (total {})",
                env.index, self.expected
            )));
        }
        if self.parts.contains_key(&env.index) {
            return Ok(false);
        }
        let bytes = URL_SAFE
            .decode(&env.data)
            .map_err(|e| BridgeError::Protocol(format!("bad base64 in chunk {}: {}", env.index, e)))?;
        self.parts.insert(env.index, bytes);
        Ok(true)
    }

    pub fn is_complete(&self) -> bool {
        self.received() == self.expected
    }

    pub fn missing_indices(&self) -> Vec<u32> {
        (0..self.expected)
            .filter(|i| !self.parts.contains_key(i))
            .collect()
    }

    /// Concatenate in index order and parse the JSON response.
    pub fn assemble(self) -> Result<Value, BridgeError> {
        if !self.is_complete() {
            return Err(BridgeError::Reassembly {
                missing: self.missing_indices(),
                received: self.received(),
                expected: self.expected,
            });
        }
        let mut bytes = Vec::new();
        for part in self.parts.values() {
            bytes.extend_from_slice(part);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::Protocol(format!("reassembled JSON unparseable: {}", e)))
    }

    /// Consume into the error describing what never arrived.
    pub fn into_failure(self) -> BridgeError {
        BridgeError::Reassembly {
            missing: self.missing_indices(),
            received: self.received(),
            expected: self.expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn base64_identity() {
        let data = b"0123456789 with spaces and ~!@# punctuation";
        let encoded = URL_SAFE.encode(data);
        assert_eq!(URL_SAFE.decode(encoded).unwrap(), data);
    }

    #[test]
    fn whole_message_roundtrip() {
        let value = json!({ "id": "ab12", "status": "success", "result": { "n": 3 } });
        let wire = encode_whole(&value);
        match decode_message(&wire).unwrap() {
            DecodedMessage::Whole(v) => assert_eq!(v, value),
            other => panic!("expected whole message, got {:?}", other),
        }
    }

    #[test]
    fn split_then_reassemble_is_identity() {
        let value = json!({
            "id": "req1",
            "status": "success",
            "result": { "parameters": (0..93).map(|i| json!({
                "name": format!("p{}", i), "value": i as f64 / 93.0
            })).collect::<Vec<_>>() }
        });
        let bytes = serde_json::to_vec(&value).unwrap();
        let datagrams = split_into_chunks(&bytes, 600);
        assert!(datagrams.len() >= 2);

        let mut assembly: Option<ChunkAssembly> = None;
        for wire in &datagrams {
            match decode_message(wire).unwrap() {
                DecodedMessage::Chunk(env) => {
                    let a = assembly.get_or_insert_with(|| ChunkAssembly::new(env.total));
                    assert!(a.insert(&env).unwrap());
                }
                other => panic!("expected chunk, got {:?}", other),
            }
        }
        let reassembled = assembly.unwrap().assemble().unwrap();
        assert_eq!(reassembled, value);
    }

    #[test]
    fn duplicate_chunks_are_ignored() {
        let datagrams = split_into_chunks(b"{\"ok\":true}", 4);
        let mut assembly: Option<ChunkAssembly> = None;
        for wire in datagrams.iter().chain(datagrams.iter()) {
            if let DecodedMessage::Chunk(env) = decode_message(wire).unwrap() {
                let a = assembly.get_or_insert_with(|| ChunkAssembly::new(env.total));
                a.insert(&env).unwrap();
            }
        }
        assert!(assembly.unwrap().assemble().is_ok());
    }

    #[test]
    fn missing_chunk_enumerated() {
        let bytes = serde_json::to_vec(&json!({ "blob": "z".repeat(50) })).unwrap();
        let datagrams = split_into_chunks(&bytes, 16);
        assert!(datagrams.len() > 2);

        let mut assembly: Option<ChunkAssembly> = None;
        for (i, wire) in datagrams.iter().enumerate() {
            if i == 1 {
                continue; // drop the second chunk
            }
            if let DecodedMessage::Chunk(env) = decode_message(wire).unwrap() {
                let a = assembly.get_or_insert_with(|| ChunkAssembly::new(env.total));
                a.insert(&env).unwrap();
            }
        }
        let a = assembly.unwrap();
        assert!(!a.is_complete());
        assert_eq!(a.missing_indices(), vec![1]);
        match a.into_failure() {
            BridgeError::Reassembly { missing, .. } => assert_eq!(missing, vec![1]),
            other => panic!("expected reassembly error, got {:?}", other),
        }
    }

    #[test]
    fn out_of_range_index_is_protocol_error() {
        let mut a = ChunkAssembly::new(2);
        let env = ChunkEnvelope {
            index: 5,
            total: 2,
            data: URL_SAFE.encode(b"x"),
        };
        assert!(matches!(a.insert(&env), Err(BridgeError::Protocol(_))));
    }
}
