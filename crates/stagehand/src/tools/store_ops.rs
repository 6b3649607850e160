//! Tools over the shared stores: snapshots, macros, parameter maps,
//! and effect-chain templates.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use livewire::command::DawCommand;
use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use rosc::OscType;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::App;
use crate::stores::{
    ChainDevice, Curve, DeviceRef, EffectChainTemplate, MacroBinding, MacroController, ParamValue,
    Snapshot,
};

const DEFAULT_DECLARED_PARAMS: usize = 64;

// ==========================================================================
// Snapshots
// ==========================================================================

#[derive(Debug, Deserialize)]
pub struct CaptureSnapshotArgs {
    pub snapshot_id: String,
    pub track_index: i64,
    pub device_index: i64,
    pub expected_params: Option<usize>,
}

pub async fn capture_snapshot(
    app: &Arc<App>,
    args: CaptureSnapshotArgs,
) -> Result<ToolOutput, BridgeError> {
    if args.snapshot_id.trim().is_empty() {
        return Err(BridgeError::invalid_input("snapshot_id", "must not be empty"));
    }
    // Snapshots are immutable once created.
    if app.snapshots.contains(&args.snapshot_id) {
        return Err(BridgeError::invalid_input(
            "snapshot_id",
            format!("snapshot '{}' already exists", args.snapshot_id),
        ));
    }

    let declared = args.expected_params.unwrap_or(DEFAULT_DECLARED_PARAMS);
    let discovered = app
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

    let parameters: Vec<ParamValue> = serde_json::from_value(
        discovered
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| json!([])),
    )
    .map_err(|e| BridgeError::Protocol(format!("malformed discovery result: {}", e)))?;

    if parameters.is_empty() {
        return Err(BridgeError::BridgeReported(
            "device reported no parameters to snapshot".to_string(),
        ));
    }

    let count = parameters.len();
    app.snapshots.insert(
        args.snapshot_id.clone(),
        Snapshot {
            id: args.snapshot_id.clone(),
            created_at: Utc::now(),
            device_ref: DeviceRef {
                track_index: args.track_index as u32,
                device_index: args.device_index as u32,
            },
            parameters,
        },
    );

    Ok(ToolOutput::with_data(
        format!("snapshot '{}' captured ({} parameters)", args.snapshot_id, count),
        json!({ "snapshot_id": args.snapshot_id, "parameter_count": count }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RestoreSnapshotArgs {
    pub snapshot_id: String,
}

pub async fn restore_snapshot(
    app: &Arc<App>,
    args: RestoreSnapshotArgs,
) -> Result<ToolOutput, BridgeError> {
    let snapshot = app.snapshots.get(&args.snapshot_id).ok_or_else(|| {
        BridgeError::invalid_input(
            "snapshot_id",
            format!("no snapshot named '{}'", args.snapshot_id),
        )
    })?;

    let params = serde_json::to_value(&snapshot.parameters)?;
    app.pipeline
        .run_daw(
            DawCommand::new("set_device_parameters")
                .with("track_index", snapshot.device_ref.track_index)
                .with("device_index", snapshot.device_ref.device_index)
                .with("params", params),
            None,
        )
        .await?;

    Ok(ToolOutput::message(format!(
        "snapshot '{}' restored ({} parameters)",
        snapshot.id,
        snapshot.parameters.len()
    )))
}

pub async fn list_snapshots(app: &Arc<App>) -> Result<ToolOutput, BridgeError> {
    let snapshots: Vec<Value> = app
        .snapshots
        .values()
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "created_at": s.created_at,
                "track_index": s.device_ref.track_index,
                "device_index": s.device_ref.device_index,
                "parameter_count": s.parameters.len(),
            })
        })
        .collect();
    Ok(ToolOutput::with_data(
        format!("{} snapshot(s)", snapshots.len()),
        json!({ "snapshots": snapshots }),
    ))
}

// ==========================================================================
// Macros
// ==========================================================================

#[derive(Debug, Deserialize)]
pub struct BindingSpec {
    pub track_index: i64,
    pub device_index: i64,
    pub parameter_name: String,
    pub min_out: f64,
    pub max_out: f64,
    pub curve: Option<Curve>,
}

impl BindingSpec {
    fn into_binding(self) -> MacroBinding {
        MacroBinding {
            device_ref: DeviceRef {
                track_index: self.track_index as u32,
                device_index: self.device_index as u32,
            },
            parameter_name: self.parameter_name,
            min_out: self.min_out,
            max_out: self.max_out,
            curve: self.curve.unwrap_or(Curve::Linear),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MacroArgs {
    pub macro_id: String,
    pub bindings: Vec<BindingSpec>,
}

pub async fn create_macro(app: &Arc<App>, args: MacroArgs) -> Result<ToolOutput, BridgeError> {
    if args.bindings.is_empty() {
        return Err(BridgeError::invalid_input("bindings", "no bindings given"));
    }
    if app.macros.contains(&args.macro_id) {
        return Err(BridgeError::invalid_input(
            "macro_id",
            format!("macro '{}' already exists (use update_macro)", args.macro_id),
        ));
    }
    let count = args.bindings.len();
    app.macros.insert(
        args.macro_id.clone(),
        MacroController {
            id: args.macro_id.clone(),
            bindings: args.bindings.into_iter().map(BindingSpec::into_binding).collect(),
        },
    );
    Ok(ToolOutput::message(format!(
        "macro '{}' created with {} binding(s)",
        args.macro_id, count
    )))
}

pub async fn update_macro(app: &Arc<App>, args: MacroArgs) -> Result<ToolOutput, BridgeError> {
    if args.bindings.is_empty() {
        return Err(BridgeError::invalid_input("bindings", "no bindings given"));
    }
    if !app.macros.contains(&args.macro_id) {
        return Err(BridgeError::invalid_input(
            "macro_id",
            format!("no macro named '{}'", args.macro_id),
        ));
    }
    let count = args.bindings.len();
    app.macros.insert(
        args.macro_id.clone(),
        MacroController {
            id: args.macro_id.clone(),
            bindings: args.bindings.into_iter().map(BindingSpec::into_binding).collect(),
        },
    );
    Ok(ToolOutput::message(format!(
        "macro '{}' now has {} binding(s)",
        args.macro_id, count
    )))
}

#[derive(Debug, Deserialize)]
pub struct ApplyMacroArgs {
    pub macro_id: String,
    pub position: f64,
}

pub async fn apply_macro(app: &Arc<App>, args: ApplyMacroArgs) -> Result<ToolOutput, BridgeError> {
    if !(0.0..=1.0).contains(&args.position) {
        return Err(BridgeError::invalid_input(
            "position",
            format!("{} is outside 0.0-1.0", args.position),
        ));
    }
    let controller = app.macros.get(&args.macro_id).ok_or_else(|| {
        BridgeError::invalid_input("macro_id", format!("no macro named '{}'", args.macro_id))
    })?;

    // One batched command per device keeps tier-1 pacing proportional
    // to devices touched, not bindings.
    let mut per_device: HashMap<DeviceRef, Vec<Value>> = HashMap::new();
    for binding in &controller.bindings {
        per_device.entry(binding.device_ref).or_default().push(json!({
            "name": binding.parameter_name,
            "value": binding.output_for(args.position),
        }));
    }

    let mut applied = Vec::new();
    for (device, params) in per_device {
        app.pipeline
            .run_daw(
                DawCommand::new("set_device_parameters")
                    .with("track_index", device.track_index)
                    .with("device_index", device.device_index)
                    .with("params", Value::Array(params.clone())),
                None,
            )
            .await?;
        applied.push(json!({
            "track_index": device.track_index,
            "device_index": device.device_index,
            "params": params,
        }));
    }

    Ok(ToolOutput::with_data(
        format!(
            "macro '{}' applied at {:.2} across {} device(s)",
            args.macro_id,
            args.position,
            applied.len()
        ),
        json!({ "applied": applied }),
    ))
}

// ==========================================================================
// Parameter maps
// ==========================================================================

#[derive(Debug, Deserialize)]
pub struct GetParameterMapArgs {
    pub device_kind: String,
}

pub async fn get_parameter_map(
    app: &Arc<App>,
    args: GetParameterMapArgs,
) -> Result<ToolOutput, BridgeError> {
    let map = app
        .param_maps
        .values()
        .into_iter()
        .find(|m| m.device_kind == args.device_kind)
        .ok_or_else(|| {
            BridgeError::invalid_input(
                "device_kind",
                format!("no parameter map registered for '{}'", args.device_kind),
            )
        })?;
    Ok(ToolOutput::with_data(
        format!("parameter map for '{}'", args.device_kind),
        serde_json::to_value(map)?,
    ))
}

// ==========================================================================
// Effect chains
// ==========================================================================

#[derive(Debug, Deserialize)]
pub struct SaveChainArgs {
    pub name: String,
    pub devices: Vec<ChainDevice>,
}

pub async fn save_effect_chain(
    app: &Arc<App>,
    args: SaveChainArgs,
) -> Result<ToolOutput, BridgeError> {
    if args.name.trim().is_empty() {
        return Err(BridgeError::invalid_input("name", "must not be empty"));
    }
    if args.devices.is_empty() {
        return Err(BridgeError::invalid_input("devices", "no devices given"));
    }
    let count = args.devices.len();
    app.chains.save(EffectChainTemplate {
        name: args.name.clone(),
        devices: args.devices,
    })?;
    Ok(ToolOutput::message(format!(
        "effect chain '{}' saved ({} device(s))",
        args.name, count
    )))
}

#[derive(Debug, Deserialize)]
pub struct ChainNameArgs {
    pub name: String,
}

pub async fn load_effect_chain(
    app: &Arc<App>,
    args: ChainNameArgs,
) -> Result<ToolOutput, BridgeError> {
    let template = app.chains.get(&args.name).ok_or_else(|| {
        BridgeError::invalid_input("name", format!("no effect chain named '{}'", args.name))
    })?;
    Ok(ToolOutput::with_data(
        format!("effect chain '{}'", args.name),
        serde_json::to_value(template)?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ApplyChainArgs {
    pub name: String,
    pub track_index: i64,
}

pub async fn apply_effect_chain(
    app: &Arc<App>,
    args: ApplyChainArgs,
) -> Result<ToolOutput, BridgeError> {
    let template = app.chains.get(&args.name).ok_or_else(|| {
        BridgeError::invalid_input("name", format!("no effect chain named '{}'", args.name))
    })?;

    let mut steps = Vec::new();
    for (position, device) in template.devices.iter().enumerate() {
        let loaded = app
            .pipeline
            .run_daw(
                DawCommand::new("load_instrument_or_effect")
                    .with("track_index", args.track_index)
                    .with("uri", device.uri.clone()),
                None,
            )
            .await?;
        // The load result carries the landing index; fall back to the
        // chain position if the DAW omits it.
        let device_index = loaded
            .get("device_index")
            .and_then(Value::as_i64)
            .unwrap_or(position as i64);

        if !device.parameter_overrides.is_empty() {
            let params: Vec<Value> = device
                .parameter_overrides
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            app.pipeline
                .run_daw(
                    DawCommand::new("set_device_parameters")
                        .with("track_index", args.track_index)
                        .with("device_index", device_index)
                        .with("params", Value::Array(params)),
                    None,
                )
                .await?;
        }
        steps.push(json!({
            "uri": device.uri,
            "device_index": device_index,
            "overrides": device.parameter_overrides.len(),
        }));
    }

    Ok(ToolOutput::with_data(
        format!(
            "effect chain '{}' applied to track {} ({} device(s))",
            args.name,
            args.track_index,
            steps.len()
        ),
        json!({ "steps": steps }),
    ))
}

pub async fn list_effect_chains(app: &Arc<App>) -> Result<ToolOutput, BridgeError> {
    let names = app.chains.names();
    Ok(ToolOutput::with_data(
        format!("{} effect chain(s)", names.len()),
        json!({ "names": names }),
    ))
}
