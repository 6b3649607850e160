//! MCP resources - curated read-only views of bridge state.
//!
//! `catalog-status` and `capabilities` are answered from memory;
//! `session` and `tracks` are live reads through the pipeline.

use std::sync::Arc;

use livewire::command::DawCommand;
use livewire::error::BridgeError;
use serde_json::{json, Value};

use crate::state::App;

pub const SESSION_URI: &str = "stagehand://session";
pub const TRACKS_URI: &str = "stagehand://tracks";
pub const CATALOG_STATUS_URI: &str = "stagehand://catalog-status";
pub const CAPABILITIES_URI: &str = "stagehand://capabilities";

/// List all available resources in MCP shape.
pub fn list() -> Vec<Value> {
    vec![
        json!({
            "uri": SESSION_URI,
            "name": "Session",
            "description": "Current session overview: tempo, time signature, counts",
            "mimeType": "application/json",
        }),
        json!({
            "uri": TRACKS_URI,
            "name": "Tracks",
            "description": "Track list with names, colors, and mixer state",
            "mimeType": "application/json",
        }),
        json!({
            "uri": CATALOG_STATUS_URI,
            "name": "Catalog Status",
            "description": "Browser catalog cache state, served from memory",
            "mimeType": "application/json",
        }),
        json!({
            "uri": CAPABILITIES_URI,
            "name": "Capabilities",
            "description": "Connectivity, readiness, and version report, served from memory",
            "mimeType": "application/json",
        }),
    ]
}

/// Read a resource by URI.
pub async fn read(app: &Arc<App>, uri: &str) -> Result<String, BridgeError> {
    let value = match uri {
        SESSION_URI => {
            app.pipeline
                .run_daw(DawCommand::new("get_session_info"), None)
                .await?
        }
        TRACKS_URI => {
            app.pipeline
                .run_daw(DawCommand::new("get_tracks"), None)
                .await?
        }
        CATALOG_STATUS_URI => app.catalog.status(),
        CAPABILITIES_URI => app.capabilities().await,
        _ => {
            return Err(BridgeError::invalid_input(
                "uri",
                format!("unknown resource '{}'", uri),
            ))
        }
    };
    serde_json::to_string_pretty(&value)
        .map_err(|e| BridgeError::internal(format!("resource serialization: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_covers_the_documented_uris() {
        let uris: Vec<String> = list()
            .iter()
            .map(|r| r["uri"].as_str().unwrap().to_string())
            .collect();
        assert!(uris.contains(&SESSION_URI.to_string()));
        assert!(uris.contains(&TRACKS_URI.to_string()));
        assert!(uris.contains(&CATALOG_STATUS_URI.to_string()));
        assert!(uris.contains(&CAPABILITIES_URI.to_string()));
    }
}
