//! Tool handlers.
//!
//! Each handler parses its typed arguments, talks to the transports
//! through the pipeline, and returns a [`ToolOutput`] or a
//! [`BridgeError`]. Envelope formatting, logging, and readiness checks
//! all happen one level up in the dispatcher.

pub mod browser;
pub mod clip;
pub mod device;
pub mod session;
pub mod store_ops;
pub mod track;

use std::sync::Arc;

use livewire::envelope::ToolOutput;
use livewire::error::BridgeError;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::state::App;

/// Route a tool call to its handler.
pub async fn call_tool(app: &Arc<App>, name: &str, args: Value) -> Result<ToolOutput, BridgeError> {
    match name {
        // === Session ===
        "get_capabilities" => session::get_capabilities(app).await,
        "get_session_info" => session::get_session_info(app).await,
        "set_tempo" => session::set_tempo(app, parse_args(args)?).await,
        "list_tracks" => session::list_tracks(app).await,

        // === Tracks ===
        "create_midi_track" => track::create_midi_track(app, parse_args(args)?).await,
        "create_audio_track" => track::create_audio_track(app, parse_args(args)?).await,
        "delete_track" => track::delete_track(app, parse_args(args)?).await,
        "set_track_name" => track::set_track_name(app, parse_args(args)?).await,
        "set_track_color" => track::set_track_color(app, parse_args(args)?).await,
        "set_track_mixer" => track::set_track_mixer(app, parse_args(args)?).await,
        "freeze_track" => track::freeze_track(app, parse_args(args)?).await,
        "create_instrument_track" => track::create_instrument_track(app, parse_args(args)?).await,

        // === Devices ===
        "load_instrument_or_effect" => device::load_instrument_or_effect(app, parse_args(args)?).await,
        "discover_device_parameters" => device::discover_device_parameters(app, parse_args(args)?).await,
        "set_device_parameters" => device::set_device_parameters(app, parse_args(args)?).await,
        "stream_parameter" => device::stream_parameter(app, parse_args(args)?).await,

        // === Clips ===
        "create_clip" => clip::create_clip(app, parse_args(args)?).await,
        "add_notes_to_clip" => clip::add_notes_to_clip(app, parse_args(args)?).await,
        "launch_clip" => clip::launch_clip(app, parse_args(args)?).await,
        "stop_clip" => clip::stop_clip(app, parse_args(args)?).await,
        "add_automation" => clip::add_automation(app, parse_args(args)?).await,

        // === Browser ===
        "browser_search" => browser::search(app, parse_args(args)?).await,
        "browser_list_category" => browser::list_category(app, parse_args(args)?).await,
        "browser_refresh" => browser::refresh(app).await,

        // === Stores ===
        "capture_snapshot" => store_ops::capture_snapshot(app, parse_args(args)?).await,
        "restore_snapshot" => store_ops::restore_snapshot(app, parse_args(args)?).await,
        "list_snapshots" => store_ops::list_snapshots(app).await,
        "create_macro" => store_ops::create_macro(app, parse_args(args)?).await,
        "update_macro" => store_ops::update_macro(app, parse_args(args)?).await,
        "apply_macro" => store_ops::apply_macro(app, parse_args(args)?).await,
        "get_parameter_map" => store_ops::get_parameter_map(app, parse_args(args)?).await,
        "save_effect_chain" => store_ops::save_effect_chain(app, parse_args(args)?).await,
        "load_effect_chain" => store_ops::load_effect_chain(app, parse_args(args)?).await,
        "apply_effect_chain" => store_ops::apply_effect_chain(app, parse_args(args)?).await,
        "list_effect_chains" => store_ops::list_effect_chains(app).await,

        _ => Err(BridgeError::invalid_input(
            "tool",
            format!("unknown tool '{}'", name),
        )),
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, BridgeError> {
    serde_json::from_value(args)
        .map_err(|e| BridgeError::invalid_input("arguments", e.to_string()))
}
