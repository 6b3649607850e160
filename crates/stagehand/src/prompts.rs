//! MCP prompts - workflow templates with parameterized placeholders.
//!
//! Prompts solve the discoverability problem: an agent gets a worked
//! sequence of tool calls instead of guessing the right order.

use std::collections::HashMap;

use livewire::error::BridgeError;
use serde_json::{json, Value};

/// List all available prompts in MCP shape.
pub fn list() -> Vec<Value> {
    vec![
        json!({
            "name": "sound_design",
            "description": "Build an instrument track and shape its sound with discovered parameters",
            "arguments": [
                {
                    "name": "instrument",
                    "description": "Instrument name to load (e.g. 'Wavetable')",
                    "required": true,
                },
                {
                    "name": "character",
                    "description": "Target character (e.g. 'warm pad', 'aggressive bass')",
                    "required": false,
                },
            ],
        }),
        json!({
            "name": "arrange_section",
            "description": "Lay out a section: tracks, clips, notes, and launch order",
            "arguments": [
                {
                    "name": "bars",
                    "description": "Section length in bars",
                    "required": false,
                },
                {
                    "name": "style",
                    "description": "Style hint for the arrangement",
                    "required": false,
                },
            ],
        }),
    ]
}

/// Get a prompt by name with filled arguments.
pub fn get(name: &str, args: &HashMap<String, String>) -> Result<Value, BridgeError> {
    match name {
        "sound_design" => sound_design(args),
        "arrange_section" => Ok(arrange_section(args)),
        _ => Err(BridgeError::invalid_input(
            "name",
            format!("unknown prompt '{}'", name),
        )),
    }
}

fn sound_design(args: &HashMap<String, String>) -> Result<Value, BridgeError> {
    let instrument = args
        .get("instrument")
        .ok_or_else(|| BridgeError::invalid_input("instrument", "argument is required"))?;
    let character = args
        .get("character")
        .map(String::as_str)
        .unwrap_or("a balanced, playable patch");

    let text = format!(
        "Design a sound with the '{instrument}' instrument, aiming for {character}.\n\
         \n\
         1. Call create_instrument_track with instrument_name=\"{instrument}\".\n\
         2. Call discover_device_parameters on the new track's device 0 to see \
         every parameter with its current value.\n\
         3. Pick the parameters that matter for the target character (filter, \
         envelopes, oscillator settings) and adjust them with set_device_parameters \
         in one batch.\n\
         4. Capture the result with capture_snapshot so the patch can be restored \
         after experimentation.\n\
         \n\
         Use get_parameter_map to translate cryptic parameter names when a map \
         exists for the device kind."
    );

    Ok(prompt_result(
        format!("Sound design workflow for {}", instrument),
        text,
    ))
}

fn arrange_section(args: &HashMap<String, String>) -> Value {
    let bars = args.get("bars").map(String::as_str).unwrap_or("8");
    let style = args.get("style").map(String::as_str).unwrap_or("the current session's style");

    let text = format!(
        "Arrange a {bars}-bar section in {style}.\n\
         \n\
         1. Call get_session_info and list_tracks to see what already exists.\n\
         2. Create the tracks you need (create_instrument_track for melodic \
         parts, create_midi_track plus load_instrument_or_effect for drums).\n\
         3. For each part: create_clip with length={bars} bars worth of beats, \
         then add_notes_to_clip with the pattern.\n\
         4. Balance with set_track_mixer, then launch_clip on each track in \
         order.\n\
         \n\
         Keep note batches under the documented caps and prefer one batched \
         call per clip over many small ones."
    );

    prompt_result(format!("Arrange a {}-bar section", bars), text)
}

fn prompt_result(description: String, text: String) -> Value {
    json!({
        "description": description,
        "messages": [
            {
                "role": "user",
                "content": { "type": "text", "text": text },
            }
        ],
    })
}
