//! Track tools, including the compound instrument-track builder.

use std::sync::Arc;
use std::time::Duration;

use livewire::command::DawCommand;
use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::App;

/// How long compound tools wait for the catalog before passing the
/// device name through unresolved.
const RESOLVE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Deserialize)]
pub struct CreateTrackArgs {
    pub index: Option<i64>,
}

pub async fn create_midi_track(
    app: &Arc<App>,
    args: CreateTrackArgs,
) -> Result<ToolOutput, BridgeError> {
    let mut cmd = DawCommand::new("create_midi_track");
    if let Some(index) = args.index {
        cmd = cmd.with("index", index);
    }
    let result = app.pipeline.run_daw(cmd, None).await?;
    Ok(ToolOutput::with_data("MIDI track created", result))
}

pub async fn create_audio_track(
    app: &Arc<App>,
    args: CreateTrackArgs,
) -> Result<ToolOutput, BridgeError> {
    let mut cmd = DawCommand::new("create_audio_track");
    if let Some(index) = args.index {
        cmd = cmd.with("index", index);
    }
    let result = app.pipeline.run_daw(cmd, None).await?;
    Ok(ToolOutput::with_data("audio track created", result))
}

#[derive(Debug, Deserialize)]
pub struct DeleteTrackArgs {
    pub track_index: i64,
}

pub async fn delete_track(
    app: &Arc<App>,
    args: DeleteTrackArgs,
) -> Result<ToolOutput, BridgeError> {
    app.pipeline
        .run_daw(
            DawCommand::new("delete_track").with("track_index", args.track_index),
            None,
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "track {} deleted",
        args.track_index
    )))
}

#[derive(Debug, Deserialize)]
pub struct SetTrackNameArgs {
    pub track_index: i64,
    pub name: String,
}

pub async fn set_track_name(
    app: &Arc<App>,
    args: SetTrackNameArgs,
) -> Result<ToolOutput, BridgeError> {
    app.pipeline
        .run_daw(
            DawCommand::new("set_track_name")
                .with("track_index", args.track_index)
                .with("name", args.name.clone()),
            None,
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "track {} renamed to '{}'",
        args.track_index, args.name
    )))
}

#[derive(Debug, Deserialize)]
pub struct SetTrackColorArgs {
    pub track_index: i64,
    pub color: i64,
}

pub async fn set_track_color(
    app: &Arc<App>,
    args: SetTrackColorArgs,
) -> Result<ToolOutput, BridgeError> {
    app.pipeline
        .run_daw(
            DawCommand::new("set_track_color")
                .with("track_index", args.track_index)
                .with("color", args.color),
            None,
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "track {} color set to {}",
        args.track_index, args.color
    )))
}

#[derive(Debug, Deserialize)]
pub struct SetTrackMixerArgs {
    pub track_index: i64,
    pub volume: Option<f64>,
    pub pan: Option<f64>,
    pub mute: Option<bool>,
    pub solo: Option<bool>,
    pub arm: Option<bool>,
}

pub async fn set_track_mixer(
    app: &Arc<App>,
    args: SetTrackMixerArgs,
) -> Result<ToolOutput, BridgeError> {
    if let Some(volume) = args.volume {
        if !(0.0..=1.0).contains(&volume) {
            return Err(BridgeError::invalid_input(
                "volume",
                format!("{} is outside 0.0-1.0", volume),
            ));
        }
    }
    if let Some(pan) = args.pan {
        if !(-1.0..=1.0).contains(&pan) {
            return Err(BridgeError::invalid_input(
                "pan",
                format!("{} is outside -1.0-1.0", pan),
            ));
        }
    }

    let mut applied = Vec::new();
    let fields: [(&str, &str, Option<Value>); 5] = [
        ("set_track_volume", "volume", args.volume.map(Value::from)),
        ("set_track_pan", "pan", args.pan.map(Value::from)),
        ("set_track_mute", "mute", args.mute.map(Value::from)),
        ("set_track_solo", "solo", args.solo.map(Value::from)),
        ("set_track_arm", "arm", args.arm.map(Value::from)),
    ];

    for (command, field, value) in fields {
        let Some(value) = value else { continue };
        app.pipeline
            .run_daw(
                DawCommand::new(command)
                    .with("track_index", args.track_index)
                    .with(field, value),
                None,
            )
            .await?;
        applied.push(field);
    }

    if applied.is_empty() {
        return Err(BridgeError::invalid_input(
            "arguments",
            "no mixer field supplied",
        ));
    }
    Ok(ToolOutput::message(format!(
        "mixer updated on track {}: {}",
        args.track_index,
        applied.join(", ")
    )))
}

#[derive(Debug, Deserialize)]
pub struct FreezeTrackArgs {
    pub track_index: i64,
    #[serde(default)]
    pub unfreeze: bool,
}

pub async fn freeze_track(
    app: &Arc<App>,
    args: FreezeTrackArgs,
) -> Result<ToolOutput, BridgeError> {
    let command = if args.unfreeze {
        "unfreeze_track"
    } else {
        "freeze_track"
    };
    app.pipeline
        .run_daw(
            DawCommand::new(command).with("track_index", args.track_index),
            None,
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "track {} {}",
        args.track_index,
        if args.unfreeze { "unfrozen" } else { "frozen" }
    )))
}

#[derive(Debug, Deserialize)]
pub struct CreateInstrumentTrackArgs {
    pub instrument_name: String,
    pub track_name: Option<String>,
    pub color: Option<i64>,
}

/// Create a MIDI track, load the instrument, then name and color it.
/// The success payload lists every sub-step's result in order.
pub async fn create_instrument_track(
    app: &Arc<App>,
    args: CreateInstrumentTrackArgs,
) -> Result<ToolOutput, BridgeError> {
    let uri = app.catalog.resolve(&args.instrument_name, RESOLVE_WAIT).await;
    let mut steps = Vec::new();

    let created = app
        .pipeline
        .run_daw(DawCommand::new("create_midi_track"), None)
        .await?;
    let track_index = created
        .get("track_index")
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            BridgeError::Protocol("create_midi_track result lacks track_index".to_string())
        })?;
    steps.push(json!({ "step": "create_midi_track", "result": created }));

    let loaded = app
        .pipeline
        .run_daw(
            DawCommand::new("load_instrument_or_effect")
                .with("track_index", track_index)
                .with("uri", uri.clone()),
            None,
        )
        .await?;
    steps.push(json!({ "step": "load_instrument_or_effect", "result": loaded }));

    if let Some(name) = &args.track_name {
        let renamed = app
            .pipeline
            .run_daw(
                DawCommand::new("set_track_name")
                    .with("track_index", track_index)
                    .with("name", name.clone()),
                None,
            )
            .await?;
        steps.push(json!({ "step": "set_track_name", "result": renamed }));
    }

    if let Some(color) = args.color {
        let colored = app
            .pipeline
            .run_daw(
                DawCommand::new("set_track_color")
                    .with("track_index", track_index)
                    .with("color", color),
                None,
            )
            .await?;
        steps.push(json!({ "step": "set_track_color", "result": colored }));
    }

    Ok(ToolOutput::with_data(
        format!(
            "instrument track {} ready with '{}'",
            track_index, args.instrument_name
        ),
        json!({ "track_index": track_index, "device_uri": uri, "steps": steps }),
    ))
}
