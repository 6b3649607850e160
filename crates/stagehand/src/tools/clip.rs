//! Clip tools: slots, notes, launch state, automation.

use std::sync::Arc;

use livewire::command::DawCommand;
use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::App;

#[derive(Debug, Deserialize)]
pub struct CreateClipArgs {
    pub track_index: i64,
    pub slot_index: i64,
    pub length: f64,
}

pub async fn create_clip(app: &Arc<App>, args: CreateClipArgs) -> Result<ToolOutput, BridgeError> {
    if args.length <= 0.0 {
        return Err(BridgeError::invalid_input(
            "length",
            "clip length must be positive",
        ));
    }
    let result = app
        .pipeline
        .run_daw(
            DawCommand::new("create_clip")
                .with("track_index", args.track_index)
                .with("slot_index", args.slot_index)
                .with("length", args.length),
            None,
        )
        .await?;
    Ok(ToolOutput::with_data(
        format!(
            "clip created at track {} slot {} ({} beats)",
            args.track_index, args.slot_index, args.length
        ),
        result,
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSpec {
    pub pitch: i64,
    pub start: f64,
    pub duration: f64,
    pub velocity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddNotesArgs {
    pub track_index: i64,
    pub slot_index: i64,
    pub notes: Vec<NoteSpec>,
}

pub async fn add_notes_to_clip(
    app: &Arc<App>,
    args: AddNotesArgs,
) -> Result<ToolOutput, BridgeError> {
    if args.notes.is_empty() {
        return Err(BridgeError::invalid_input("notes", "no notes given"));
    }
    for (i, note) in args.notes.iter().enumerate() {
        if !(0..=127).contains(&note.pitch) {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("note {} pitch {} is outside 0-127", i, note.pitch),
            ));
        }
        if note.start < 0.0 || note.duration <= 0.0 {
            return Err(BridgeError::invalid_input(
                "notes",
                format!("note {} has a negative start or non-positive duration", i),
            ));
        }
        if let Some(velocity) = note.velocity {
            if !(1..=127).contains(&velocity) {
                return Err(BridgeError::invalid_input(
                    "notes",
                    format!("note {} velocity {} is outside 1-127", i, velocity),
                ));
            }
        }
    }

    let notes = serde_json::to_value(&args.notes)?;
    let result = app
        .pipeline
        .run_daw(
            DawCommand::new("add_notes")
                .with("track_index", args.track_index)
                .with("slot_index", args.slot_index)
                .with("notes", notes),
            None,
        )
        .await?;
    Ok(ToolOutput::with_data(
        format!("{} notes written", args.notes.len()),
        result,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ClipSlotArgs {
    pub track_index: i64,
    pub slot_index: i64,
}

pub async fn launch_clip(app: &Arc<App>, args: ClipSlotArgs) -> Result<ToolOutput, BridgeError> {
    app.pipeline
        .run_daw(
            DawCommand::new("launch_clip")
                .with("track_index", args.track_index)
                .with("slot_index", args.slot_index),
            None,
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "clip launched at track {} slot {}",
        args.track_index, args.slot_index
    )))
}

pub async fn stop_clip(app: &Arc<App>, args: ClipSlotArgs) -> Result<ToolOutput, BridgeError> {
    app.pipeline
        .run_daw(
            DawCommand::new("stop_clip")
                .with("track_index", args.track_index)
                .with("slot_index", args.slot_index),
            None,
        )
        .await?;
    Ok(ToolOutput::message(format!(
        "clip stopped at track {} slot {}",
        args.track_index, args.slot_index
    )))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub time: f64,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddAutomationArgs {
    pub track_index: i64,
    pub slot_index: i64,
    pub parameter: String,
    pub points: Vec<AutomationPoint>,
}

pub async fn add_automation(
    app: &Arc<App>,
    args: AddAutomationArgs,
) -> Result<ToolOutput, BridgeError> {
    if args.points.is_empty() {
        return Err(BridgeError::invalid_input("points", "no points given"));
    }
    for (i, point) in args.points.iter().enumerate() {
        if point.time < 0.0 {
            return Err(BridgeError::invalid_input(
                "points",
                format!("point {} has a negative time", i),
            ));
        }
    }

    let points = serde_json::to_value(&args.points)?;
    let result = app
        .pipeline
        .run_daw(
            DawCommand::new("add_automation")
                .with("track_index", args.track_index)
                .with("slot_index", args.slot_index)
                .with("parameter", args.parameter.clone())
                .with("points", points),
            None,
        )
        .await?;
    Ok(ToolOutput::with_data(
        format!(
            "automation for '{}' written with {} points",
            args.parameter,
            args.points.len()
        ),
        json!({ "parameter": args.parameter, "result": result }),
    ))
}
