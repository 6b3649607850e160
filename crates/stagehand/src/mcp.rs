//! MCP JSON-RPC server over stdio.
//!
//! One JSON-RPC 2.0 object per line on stdin/stdout; logs go to stderr
//! so stdout stays clean for the protocol. Each request is handled on
//! its own task and responses funnel through a single writer, so a
//! slow tool call never blocks the read loop.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatch;
use crate::prompts;
use crate::resources;
use crate::state::App;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC request wrapper
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response wrapper
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Serve MCP over stdin/stdout until EOF.
pub async fn run(app: Arc<App>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    // Single writer task keeps interleaved responses line-atomic.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    info!("MCP server running on stdio");

    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        if line.trim().is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!("unparseable JSON-RPC line: {}", e);
                let response = JsonRpcResponse::error(None, -32700, format!("parse error: {}", e));
                send_response(&out_tx, &response).await;
                continue;
            }
        };

        // Notifications get no response.
        if request.id.is_none() {
            debug!("notification: {}", request.method);
            continue;
        }

        let app = Arc::clone(&app);
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let response = handle_request(&app, request).await;
            send_response(&out_tx, &response).await;
        });
    }

    drop(out_tx);
    let _ = writer.await;
    info!("MCP server shutdown (stdin closed)");
    Ok(())
}

async fn send_response(out_tx: &mpsc::Sender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            let _ = out_tx.send(line).await;
        }
        Err(e) => warn!("response serialization failed: {}", e),
    }
}

pub async fn handle_request(app: &Arc<App>, request: JsonRpcRequest) -> JsonRpcResponse {
    debug!("MCP request: {}", request.method);
    match request.method.as_str() {
        "initialize" => handle_initialize(request.id),
        "ping" => JsonRpcResponse::success(request.id, json!({})),
        "tools/list" => handle_tools_list(app, request.id),
        "tools/call" => handle_tools_call(app, request.id, request.params).await,
        "resources/list" => {
            JsonRpcResponse::success(request.id, json!({ "resources": resources::list() }))
        }
        "resources/read" => handle_resources_read(app, request.id, request.params).await,
        "prompts/list" => {
            JsonRpcResponse::success(request.id, json!({ "prompts": prompts::list() }))
        }
        "prompts/get" => handle_prompts_get(request.id, request.params),
        other => JsonRpcResponse::error(
            request.id,
            -32601,
            format!("Method not found: {}", other),
        ),
    }
}

fn handle_initialize(id: Option<Value>) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {},
                "prompts": {},
            },
            "serverInfo": {
                "name": "stagehand",
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}

fn handle_tools_list(app: &Arc<App>, id: Option<Value>) -> JsonRpcResponse {
    let tools: Vec<Value> = app
        .tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "inputSchema": t.input_schema,
            })
        })
        .collect();
    JsonRpcResponse::success(id, json!({ "tools": tools }))
}

async fn handle_tools_call(app: &Arc<App>, id: Option<Value>, params: Value) -> JsonRpcResponse {
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    let envelope = dispatch::dispatch(app, name, arguments).await;
    let is_error = envelope.get("status").and_then(Value::as_str) == Some("error");
    let text = serde_json::to_string_pretty(&envelope).unwrap_or_default();

    JsonRpcResponse::success(
        id,
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        }),
    )
}

async fn handle_resources_read(
    app: &Arc<App>,
    id: Option<Value>,
    params: Value,
) -> JsonRpcResponse {
    let uri = params.get("uri").and_then(Value::as_str).unwrap_or("");
    match resources::read(app, uri).await {
        Ok(text) => JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": uri,
                    "mimeType": "application/json",
                    "text": text,
                }]
            }),
        ),
        Err(e) => JsonRpcResponse::error(id, -32602, e.public_message()),
    }
}

fn handle_prompts_get(id: Option<Value>, params: Value) -> JsonRpcResponse {
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let arguments: HashMap<String, String> = params
        .get("arguments")
        .and_then(Value::as_object)
        .map(|o| {
            o.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    match prompts::get(name, &arguments) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::error(id, -32602, e.public_message()),
    }
}
