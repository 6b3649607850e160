//! Session-level tools.

use std::sync::Arc;

use livewire::command::DawCommand;
use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use serde::Deserialize;

use crate::state::App;

pub async fn get_capabilities(app: &Arc<App>) -> Result<ToolOutput, BridgeError> {
    Ok(ToolOutput::with_data(
        "bridge capabilities",
        app.capabilities().await,
    ))
}

pub async fn get_session_info(app: &Arc<App>) -> Result<ToolOutput, BridgeError> {
    let result = app
        .pipeline
        .run_daw(DawCommand::new("get_session_info"), None)
        .await?;
    Ok(ToolOutput::with_data("session info", result))
}

pub async fn list_tracks(app: &Arc<App>) -> Result<ToolOutput, BridgeError> {
    let result = app
        .pipeline
        .run_daw(DawCommand::new("get_tracks"), None)
        .await?;
    Ok(ToolOutput::with_data("track list", result))
}

#[derive(Debug, Deserialize)]
pub struct SetTempoArgs {
    pub bpm: f64,
}

pub async fn set_tempo(app: &Arc<App>, args: SetTempoArgs) -> Result<ToolOutput, BridgeError> {
    if !(20.0..=999.0).contains(&args.bpm) {
        return Err(BridgeError::invalid_input(
            "bpm",
            format!("{} is outside 20-999", args.bpm),
        ));
    }
    app.pipeline
        .run_daw(DawCommand::new("set_tempo").with("bpm", args.bpm), None)
        .await?;
    Ok(ToolOutput::message(format!("tempo set to {} BPM", args.bpm)))
}
