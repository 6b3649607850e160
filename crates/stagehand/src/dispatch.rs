//! Tool dispatcher.
//!
//! The per-call spine: log, validate sizes, check declared needs, run
//! the handler on the worker pool, and wrap whatever comes back in the
//! uniform envelope. Handlers never format errors and never run on the
//! protocol loop's task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use livewire::envelope::{error_envelope, ok_envelope};
use livewire::error::BridgeError;
use serde_json::Value;
use tracing::{error, info};

use crate::calllog::summarize_args;
use crate::state::App;
use crate::tools;
use crate::tools_registry::ToolSpec;

/// Input size caps, applied before any handler runs.
const MAX_NOTES: usize = 10_000;
const MAX_AUTOMATION_POINTS: usize = 500;
const MAX_BATCH_PARAMS: usize = 200;
const MAX_QUERY_CHARS: usize = 500;

const ARG_SUMMARY_CHARS: usize = 160;

/// How long a handler's catalog need may wait before proceeding
/// anyway; the resolver falls back to pass-through.
const CATALOG_NEED_WAIT: Duration = Duration::from_secs(5);

/// Run one tool call end to end and return the envelope.
pub async fn dispatch(app: &Arc<App>, name: &str, args: Value) -> Value {
    let started = Instant::now();
    let summary = summarize_args(&args, ARG_SUMMARY_CHARS);
    info!(tool = %name, "tool call");

    let spec = app.find_tool(name);
    let result = match spec {
        None => Err(BridgeError::invalid_input(
            "tool",
            format!("unknown tool '{}'", name),
        )),
        Some(spec) => run_checked(app, spec, args).await,
    };

    let prefix = spec.map(|s| s.error_prefix).unwrap_or("");
    let envelope = match &result {
        Ok(output) => ok_envelope(output),
        Err(e) => {
            if let BridgeError::Internal(detail) = e {
                error!(tool = %name, "internal error: {}", detail);
            }
            error_envelope(e, prefix)
        }
    };

    let outcome = match &result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.kind().to_string(),
    };
    app.call_log
        .record(name, summary, started.elapsed(), outcome);
    envelope
}

async fn run_checked(
    app: &Arc<App>,
    spec: &ToolSpec,
    args: Value,
) -> Result<livewire::envelope::ToolOutput, BridgeError> {
    validate_sizes(&args)?;
    check_needs(app, spec).await?;

    // Handlers run in their own task so a panic is contained and the
    // protocol loop stays responsive.
    let app = Arc::clone(app);
    let name = spec.name;
    match tokio::spawn(async move { tools::call_tool(&app, name, args).await }).await {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            error!(tool = %name, "handler panicked");
            Err(BridgeError::internal(format!("handler for '{}' panicked", name)))
        }
        Err(_) => Err(BridgeError::internal("handler cancelled")),
    }
}

/// Size caps on well-known argument fields, independent of tool.
fn validate_sizes(args: &Value) -> Result<(), BridgeError> {
    if let Some(notes) = args.get("notes").and_then(Value::as_array) {
        if notes.len() > MAX_NOTES {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("{} notes exceeds the cap of {}", notes.len(), MAX_NOTES),
            ));
        }
    }
    if let Some(points) = args.get("points").and_then(Value::as_array) {
        if points.len() > MAX_AUTOMATION_POINTS {
            return Err(BridgeError::invalid_input(
                "points",
                format!(
                    "{} points exceeds the cap of {}",
                    points.len(),
                    MAX_AUTOMATION_POINTS
                ),
            ));
        }
    }
    if let Some(params) = args.get("params").and_then(Value::as_array) {
        if params.len() > MAX_BATCH_PARAMS {
            return Err(BridgeError::invalid_input(
                "params",
                format!(
                    "{} params exceeds the cap of {}",
                    params.len(),
                    MAX_BATCH_PARAMS
                ),
            ));
        }
    }
    if let Some(query) = args.get("query").and_then(Value::as_str) {
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(BridgeError::invalid_input(
                "query",
                format!("query exceeds {} characters", MAX_QUERY_CHARS),
            ));
        }
    }
    Ok(())
}

/// Enforce a tool's declared preconditions.
///
/// DAW and bridge needs are hard: unreachable means `NotReady` before
/// the handler runs. The catalog need is only a bounded wait; a cold
/// catalog falls back to pass-through resolution inside the handler.
async fn check_needs(app: &Arc<App>, spec: &ToolSpec) -> Result<(), BridgeError> {
    if spec.needs.daw && !app.tcp.probe().await {
        return Err(BridgeError::NotReady("DAW connection".to_string()));
    }
    if spec.needs.bridge && !app.bridge.is_connected().await {
        return Err(BridgeError::NotReady("OSC bridge".to_string()));
    }
    if spec.needs.catalog {
        let _ = app.catalog_populated.wait_timeout(CATALOG_NEED_WAIT).await;
    }
    Ok(())
}
