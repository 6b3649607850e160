//! Device tools: loading, deep parameter discovery, batch sets, and
//! real-time streaming.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use livewire::command::DawCommand;
use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use rosc::OscType;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::App;

const RESOLVE_WAIT: Duration = Duration::from_secs(5);

/// Declared size used for timeout scaling when the caller does not
/// know a device's parameter count.
const DEFAULT_DECLARED_PARAMS: usize = 64;

#[derive(Debug, Deserialize)]
pub struct LoadDeviceArgs {
    pub track_index: i64,
    pub name: String,
}

pub async fn load_instrument_or_effect(
    app: &Arc<App>,
    args: LoadDeviceArgs,
) -> Result<ToolOutput, BridgeError> {
    let uri = app.catalog.resolve(&args.name, RESOLVE_WAIT).await;
    let resolved = uri != args.name;
    let result = app
        .pipeline
        .run_daw(
            DawCommand::new("load_instrument_or_effect")
                .with("track_index", args.track_index)
                .with("uri", uri.clone()),
            None,
        )
        .await?;
    let message = if resolved {
        format!("loaded '{}' (resolved to {})", args.name, uri)
    } else {
        format!("loaded '{}'", args.name)
    };
    Ok(ToolOutput::with_data(message, result))
}

#[derive(Debug, Deserialize)]
pub struct DiscoverParamsArgs {
    pub track_index: i64,
    pub device_index: i64,
    pub expected_params: Option<usize>,
}

pub async fn discover_device_parameters(
    app: &Arc<App>,
    args: DiscoverParamsArgs,
) -> Result<ToolOutput, BridgeError> {
    let declared = args.expected_params.unwrap_or(DEFAULT_DECLARED_PARAMS);
    let result = app
        .pipeline
        .run_bridge(
            "/discover_params",
            vec![
                OscType::Int(args.track_index as i32),
                OscType::Int(args.device_index as i32),
            ],
            declared,
            true,
        )
        .await?;

    let count = result
        .get("parameters")
        .and_then(Value::as_array)
        .map(|a| a.len())
        .unwrap_or(0);
    Ok(ToolOutput::with_data(
        format!(
            "discovered {} parameters on track {} device {}",
            count, args.track_index, args.device_index
        ),
        result,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ParamSetting {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct SetDeviceParamsArgs {
    pub track_index: i64,
    pub device_index: i64,
    pub params: Vec<ParamSetting>,
}

pub async fn set_device_parameters(
    app: &Arc<App>,
    args: SetDeviceParamsArgs,
) -> Result<ToolOutput, BridgeError> {
    if args.params.is_empty() {
        return Err(BridgeError::invalid_input("params", "no parameters given"));
    }

    // The batch rides as one URL-safe base64 JSON argument.
    let payload: Vec<Value> = args
        .params
        .iter()
        .map(|p| json!({ "name": p.name, "value": p.value }))
        .collect();
    let encoded = URL_SAFE.encode(serde_json::to_vec(&Value::Array(payload))?);

    let result = app
        .pipeline
        .run_bridge(
            "/set_params",
            vec![
                OscType::Int(args.track_index as i32),
                OscType::Int(args.device_index as i32),
                OscType::String(encoded),
            ],
            args.params.len(),
            true,
        )
        .await?;

    Ok(ToolOutput::with_data(
        format!(
            "set {} parameters on track {} device {}",
            args.params.len(),
            args.track_index,
            args.device_index
        ),
        result,
    ))
}

#[derive(Debug, Deserialize)]
pub struct StreamParameterArgs {
    pub track_index: i64,
    pub device_index: i64,
    pub param: String,
    pub value: f64,
}

pub async fn stream_parameter(
    app: &Arc<App>,
    args: StreamParameterArgs,
) -> Result<ToolOutput, BridgeError> {
    app.realtime
        .send(
            &DawCommand::new("set_param_rt")
                .with("track_index", args.track_index)
                .with("device_index", args.device_index)
                .with("param", args.param.clone())
                .with("value", args.value),
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "real-time update sent for '{}'",
        args.param
    )))
}
