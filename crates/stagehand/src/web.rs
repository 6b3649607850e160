//! Dashboard HTTP server.
//!
//! Read-only JSON telemetry plus one embedded HTML page, bound to
//! loopback and served only when enabled in configuration.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::state::App;

const RECENT_CALLS: usize = 50;
const TOP_TOOLS: usize = 10;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/calls", get(calls))
        .route("/api/tools", get(tools))
        .with_state(app)
}

/// Bind and serve until the process exits. Bind failure is logged and
/// swallowed: the dashboard is optional telemetry, never load-bearing.
pub async fn serve(app: Arc<App>, port: u16) {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("dashboard bind on {} failed: {}", addr, e);
            return;
        }
    };
    info!("dashboard listening on http://{}", addr);
    if let Err(e) = axum::serve(listener, router(app)).await {
        warn!("dashboard server stopped: {}", e);
    }
}

async fn status(State(app): State<Arc<App>>) -> Json<Value> {
    Json(json!({
        "server_version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": app.started_at.elapsed().as_secs(),
        "daw_connected": app.tcp.is_connected(),
        "daw_seen": app.daw_connected.is_set(),
        "bridge_version": app.bridge.version().await,
        "catalog": app.catalog.status(),
        "total_calls": app.call_log.total_calls(),
    }))
}

async fn calls(State(app): State<Arc<App>>) -> Json<Value> {
    Json(json!({ "calls": app.call_log.recent(RECENT_CALLS) }))
}

async fn tools(State(app): State<Arc<App>>) -> Json<Value> {
    let top: Vec<Value> = app
        .call_log
        .top_tools(TOP_TOOLS)
        .into_iter()
        .map(|(name, count)| json!({ "tool": name, "count": count }))
        .collect();
    Json(json!({ "tool_count": app.tools.len(), "top": top }))
}

async fn index() -> impl IntoResponse {
    (StatusCode::OK, Html(INDEX_HTML))
}

/// Minimal page that polls the JSON endpoints every 3 seconds.
const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>stagehand</title>
<style>
  body { font-family: monospace; margin: 2em; background: #111; color: #ddd; }
  h1 { font-size: 1.2em; }
  table { border-collapse: collapse; margin-top: 1em; }
  td, th { border: 1px solid #444; padding: 4px 10px; text-align: left; }
  .ok { color: #7c6; }
  .bad { color: #c67; }
</style>
</head>
<body>
<h1>stagehand</h1>
<div id="status">loading…</div>
<table id="calls"></table>
<script>
async function refresh() {
  const status = await (await fetch('/api/status')).json();
  const calls = await (await fetch('/api/calls')).json();
  const daw = status.daw_connected ? '<span class="ok">connected</span>' : '<span class="bad">down</span>';
  const bridge = status.bridge_version ? '<span class="ok">' + status.bridge_version + '</span>' : '<span class="bad">down</span>';
  document.getElementById('status').innerHTML =
    'v' + status.server_version + ' · uptime ' + status.uptime_secs + 's' +
    ' · DAW ' + daw + ' · bridge ' + bridge +
    ' · catalog ' + status.catalog.items + ' items (' + status.catalog.state + ')' +
    ' · ' + status.total_calls + ' calls';
  const rows = calls.calls.map(c =>
    '<tr><td>' + c.timestamp + '</td><td>' + c.tool + '</td><td>' + c.duration_ms +
    'ms</td><td>' + c.outcome + '</td></tr>').join('');
  document.getElementById('calls').innerHTML =
    '<tr><th>time</th><th>tool</th><th>duration</th><th>outcome</th></tr>' + rows;
}
refresh();
setInterval(refresh, 3000);
</script>
</body>
</html>
"#;
