//! Tool registry - every operation exposed to the agent.
//!
//! Schemas are written inline so the surface is reviewable in one
//! place. `needs` drives the dispatcher's readiness checks: `daw` and
//! `bridge` are hard preconditions, `catalog` is a bounded wait (the
//! resolver falls back to pass-through).

use serde_json::{json, Value};

/// Preconditions a tool declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct Needs {
    pub daw: bool,
    pub bridge: bool,
    pub catalog: bool,
}

impl Needs {
    const NONE: Needs = Needs {
        daw: false,
        bridge: false,
        catalog: false,
    };
    const DAW: Needs = Needs {
        daw: true,
        bridge: false,
        catalog: false,
    };
    const BRIDGE: Needs = Needs {
        daw: false,
        bridge: true,
        catalog: false,
    };
    const DAW_CATALOG: Needs = Needs {
        daw: true,
        bridge: false,
        catalog: true,
    };
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub needs: Needs,
    pub error_prefix: &'static str,
}

/// List all tools supported by stagehand.
pub fn registry() -> Vec<ToolSpec> {
    vec![
        // ==========================================================================
        // Session Tools
        // ==========================================================================
        ToolSpec {
            name: "get_capabilities",
            description: "Report bridge health: DAW/bridge connectivity, catalog state, versions",
            input_schema: json!({ "type": "object", "properties": {} }),
            needs: Needs::NONE,
            error_prefix: "capabilities check failed",
        },
        ToolSpec {
            name: "get_session_info",
            description: "Current session overview: tempo, time signature, track and scene counts",
            input_schema: json!({ "type": "object", "properties": {} }),
            needs: Needs::DAW,
            error_prefix: "session info failed",
        },
        ToolSpec {
            name: "set_tempo",
            description: "Set the session tempo in BPM",
            input_schema: json!({
                "type": "object",
                "required": ["bpm"],
                "properties": {
                    "bpm": { "type": "number", "description": "Tempo, 20-999 BPM" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "set tempo failed",
        },
        ToolSpec {
            name: "list_tracks",
            description: "List tracks with names, colors, and mixer state",
            input_schema: json!({ "type": "object", "properties": {} }),
            needs: Needs::DAW,
            error_prefix: "list tracks failed",
        },

        // ==========================================================================
        // Track Tools
        // ==========================================================================
        ToolSpec {
            name: "create_midi_track",
            description: "Create an empty MIDI track",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "index": { "type": "integer", "description": "Insert position (append if omitted)" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "create MIDI track failed",
        },
        ToolSpec {
            name: "create_audio_track",
            description: "Create an empty audio track",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "index": { "type": "integer", "description": "Insert position (append if omitted)" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "create audio track failed",
        },
        ToolSpec {
            name: "delete_track",
            description: "Delete a track by index",
            input_schema: json!({
                "type": "object",
                "required": ["track_index"],
                "properties": {
                    "track_index": { "type": "integer" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "delete track failed",
        },
        ToolSpec {
            name: "set_track_name",
            description: "Rename a track",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "name"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "name": { "type": "string" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "rename track failed",
        },
        ToolSpec {
            name: "set_track_color",
            description: "Set a track's color index",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "color"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "color": { "type": "integer", "description": "DAW palette index" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "set track color failed",
        },
        ToolSpec {
            name: "set_track_mixer",
            description: "Set mixer state on a track: volume, pan, mute, solo, arm",
            input_schema: json!({
                "type": "object",
                "required": ["track_index"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "volume": { "type": "number", "description": "0.0-1.0" },
                    "pan": { "type": "number", "description": "-1.0 (left) to 1.0 (right)" },
                    "mute": { "type": "boolean" },
                    "solo": { "type": "boolean" },
                    "arm": { "type": "boolean" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "set mixer failed",
        },
        ToolSpec {
            name: "freeze_track",
            description: "Freeze or unfreeze a track",
            input_schema: json!({
                "type": "object",
                "required": ["track_index"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "unfreeze": { "type": "boolean", "description": "Unfreeze instead (default false)" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "freeze failed",
        },
        ToolSpec {
            name: "create_instrument_track",
            description: "Create a MIDI track, load an instrument by name, then name and color it",
            input_schema: json!({
                "type": "object",
                "required": ["instrument_name"],
                "properties": {
                    "instrument_name": { "type": "string", "description": "Device name or catalog URI" },
                    "track_name": { "type": "string" },
                    "color": { "type": "integer" }
                }
            }),
            needs: Needs::DAW_CATALOG,
            error_prefix: "create instrument track failed",
        },

        // ==========================================================================
        // Device Tools
        // ==========================================================================
        ToolSpec {
            name: "load_instrument_or_effect",
            description: "Load a device onto a track, resolving a human name through the catalog",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "name"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "name": { "type": "string", "description": "Device name or catalog URI" }
                }
            }),
            needs: Needs::DAW_CATALOG,
            error_prefix: "load device failed",
        },
        ToolSpec {
            name: "discover_device_parameters",
            description: "Deep-discover every parameter of a device via the OSC bridge",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "device_index"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "device_index": { "type": "integer" },
                    "expected_params": { "type": "integer", "description": "Declared size for timeout scaling" }
                }
            }),
            needs: Needs::BRIDGE,
            error_prefix: "parameter discovery failed",
        },
        ToolSpec {
            name: "set_device_parameters",
            description: "Batch-set device parameters via the OSC bridge (max 200 per call)",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "device_index", "params"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "device_index": { "type": "integer" },
                    "params": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name", "value"],
                            "properties": {
                                "name": { "type": "string" },
                                "value": { "type": "number" }
                            }
                        }
                    }
                }
            }),
            needs: Needs::BRIDGE,
            error_prefix: "set parameters failed",
        },
        ToolSpec {
            name: "stream_parameter",
            description: "Fire one real-time parameter update over UDP (lossy, no acknowledgment)",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "device_index", "param", "value"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "device_index": { "type": "integer" },
                    "param": { "type": "string" },
                    "value": { "type": "number" }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "real-time update failed",
        },

        // ==========================================================================
        // Clip Tools
        // ==========================================================================
        ToolSpec {
            name: "create_clip",
            description: "Create an empty MIDI clip in a slot",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "slot_index", "length"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "slot_index": { "type": "integer" },
                    "length": { "type": "number", "description": "Length in beats" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "create clip failed",
        },
        ToolSpec {
            name: "add_notes_to_clip",
            description: "Add MIDI notes to a clip (max 10000 per call)",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "slot_index", "notes"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "slot_index": { "type": "integer" },
                    "notes": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["pitch", "start", "duration"],
                            "properties": {
                                "pitch": { "type": "integer", "description": "MIDI pitch 0-127" },
                                "start": { "type": "number", "description": "Start in beats" },
                                "duration": { "type": "number", "description": "Length in beats" },
                                "velocity": { "type": "integer", "description": "1-127, default 100" }
                            }
                        }
                    }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "add notes failed",
        },
        ToolSpec {
            name: "launch_clip",
            description: "Launch a clip slot",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "slot_index"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "slot_index": { "type": "integer" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "launch clip failed",
        },
        ToolSpec {
            name: "stop_clip",
            description: "Stop a playing clip slot",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "slot_index"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "slot_index": { "type": "integer" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "stop clip failed",
        },
        ToolSpec {
            name: "add_automation",
            description: "Write an automation envelope into a clip (max 500 points)",
            input_schema: json!({
                "type": "object",
                "required": ["track_index", "slot_index", "parameter", "points"],
                "properties": {
                    "track_index": { "type": "integer" },
                    "slot_index": { "type": "integer" },
                    "parameter": { "type": "string", "description": "Automation target, e.g. 'volume'" },
                    "points": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["time", "value"],
                            "properties": {
                                "time": { "type": "number", "description": "Beats from clip start" },
                                "value": { "type": "number" }
                            }
                        }
                    }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "add automation failed",
        },

        // ==========================================================================
        // Browser Tools
        // ==========================================================================
        ToolSpec {
            name: "browser_search",
            description: "Search the cached catalog by name (max 500 chars)",
            input_schema: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "description": "Max results, default 25" }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "browser search failed",
        },
        ToolSpec {
            name: "browser_list_category",
            description: "List cached catalog items in one category",
            input_schema: json!({
                "type": "object",
                "required": ["category"],
                "properties": {
                    "category": { "type": "string", "description": "instruments, drums, sounds, audio_effects, midi_effects" },
                    "limit": { "type": "integer", "description": "Max results, default 50" }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "browser listing failed",
        },
        ToolSpec {
            name: "browser_refresh",
            description: "Re-walk the DAW browser and rebuild the catalog cache",
            input_schema: json!({ "type": "object", "properties": {} }),
            needs: Needs::DAW,
            error_prefix: "catalog refresh failed",
        },

        // ==========================================================================
        // Snapshot Tools
        // ==========================================================================
        ToolSpec {
            name: "capture_snapshot",
            description: "Capture a device's current parameter values under an id",
            input_schema: json!({
                "type": "object",
                "required": ["snapshot_id", "track_index", "device_index"],
                "properties": {
                    "snapshot_id": { "type": "string" },
                    "track_index": { "type": "integer" },
                    "device_index": { "type": "integer" },
                    "expected_params": { "type": "integer" }
                }
            }),
            needs: Needs::BRIDGE,
            error_prefix: "capture snapshot failed",
        },
        ToolSpec {
            name: "restore_snapshot",
            description: "Restore a captured snapshot onto its device",
            input_schema: json!({
                "type": "object",
                "required": ["snapshot_id"],
                "properties": {
                    "snapshot_id": { "type": "string" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "restore snapshot failed",
        },
        ToolSpec {
            name: "list_snapshots",
            description: "List captured snapshot ids",
            input_schema: json!({ "type": "object", "properties": {} }),
            needs: Needs::NONE,
            error_prefix: "list snapshots failed",
        },

        // ==========================================================================
        // Macro Tools
        // ==========================================================================
        ToolSpec {
            name: "create_macro",
            description: "Create a macro controller fanning one 0-1 input across device parameters",
            input_schema: json!({
                "type": "object",
                "required": ["macro_id", "bindings"],
                "properties": {
                    "macro_id": { "type": "string" },
                    "bindings": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["track_index", "device_index", "parameter_name", "min_out", "max_out"],
                            "properties": {
                                "track_index": { "type": "integer" },
                                "device_index": { "type": "integer" },
                                "parameter_name": { "type": "string" },
                                "min_out": { "type": "number" },
                                "max_out": { "type": "number" },
                                "curve": { "type": "string", "description": "linear, exponential, logarithmic" }
                            }
                        }
                    }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "create macro failed",
        },
        ToolSpec {
            name: "update_macro",
            description: "Replace a macro controller's bindings",
            input_schema: json!({
                "type": "object",
                "required": ["macro_id", "bindings"],
                "properties": {
                    "macro_id": { "type": "string" },
                    "bindings": { "type": "array", "items": { "type": "object" } }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "update macro failed",
        },
        ToolSpec {
            name: "apply_macro",
            description: "Drive a macro controller to a 0-1 position, updating every bound parameter",
            input_schema: json!({
                "type": "object",
                "required": ["macro_id", "position"],
                "properties": {
                    "macro_id": { "type": "string" },
                    "position": { "type": "number", "description": "0.0-1.0" }
                }
            }),
            needs: Needs::DAW,
            error_prefix: "apply macro failed",
        },

        // ==========================================================================
        // Parameter Map Tools
        // ==========================================================================
        ToolSpec {
            name: "get_parameter_map",
            description: "Look up friendly parameter names for a device kind",
            input_schema: json!({
                "type": "object",
                "required": ["device_kind"],
                "properties": {
                    "device_kind": { "type": "string", "description": "e.g. wavetable, eq_eight, compressor" }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "parameter map lookup failed",
        },

        // ==========================================================================
        // Effect Chain Tools
        // ==========================================================================
        ToolSpec {
            name: "save_effect_chain",
            description: "Persist an ordered device chain with parameter overrides",
            input_schema: json!({
                "type": "object",
                "required": ["name", "devices"],
                "properties": {
                    "name": { "type": "string" },
                    "devices": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["uri"],
                            "properties": {
                                "uri": { "type": "string" },
                                "parameter_overrides": { "type": "object" }
                            }
                        }
                    }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "save effect chain failed",
        },
        ToolSpec {
            name: "load_effect_chain",
            description: "Fetch a saved effect-chain template",
            input_schema: json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" }
                }
            }),
            needs: Needs::NONE,
            error_prefix: "load effect chain failed",
        },
        ToolSpec {
            name: "apply_effect_chain",
            description: "Load a saved chain's devices onto a track in order, applying overrides",
            input_schema: json!({
                "type": "object",
                "required": ["name", "track_index"],
                "properties": {
                    "name": { "type": "string" },
                    "track_index": { "type": "integer" }
                }
            }),
            needs: Needs::DAW_CATALOG,
            error_prefix: "apply effect chain failed",
        },
        ToolSpec {
            name: "list_effect_chains",
            description: "List saved effect-chain template names",
            input_schema: json!({ "type": "object", "properties": {} }),
            needs: Needs::NONE,
            error_prefix: "list effect chains failed",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let tools = registry();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn every_schema_is_an_object() {
        for tool in registry() {
            assert_eq!(
                tool.input_schema["type"], "object",
                "schema for {} must be an object",
                tool.name
            );
            assert!(!tool.description.is_empty());
            assert!(!tool.error_prefix.is_empty());
        }
    }

    #[test]
    fn transport_tools_declare_their_needs() {
        let tools = registry();
        let by_name = |n: &str| tools.iter().find(|t| t.name == n).unwrap();
        assert!(by_name("set_tempo").needs.daw);
        assert!(by_name("discover_device_parameters").needs.bridge);
        assert!(by_name("load_instrument_or_effect").needs.catalog);
        assert!(!by_name("get_capabilities").needs.daw);
        assert!(!by_name("stream_parameter").needs.daw);
    }
}
