//! Command tier, idempotency, and timeout classification.
//!
//! This module is the source of truth for how the command pipeline
//! paces, retries, and bounds each DAW command:
//!
//! - **Instant** (tier 0): pure property setters, no settle time.
//! - **Light** (tier 1): content edits, 50 ms post-delay.
//! - **Structural** (tier 2): creates/deletes/loads, 100 ms post-delay.
//!
//! Post-delays serialize the *next* command so the DAW has time to
//! settle; no pre-delay is ever applied. Non-idempotent commands are
//! never retried, idempotent commands are retried once on a
//! connection-level failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default deadline for read-only commands.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for modifying commands.
pub const DEFAULT_MODIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// Pacing class for an outgoing DAW command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTier {
    /// Pure property setters (tempo, name, color, mute, clip launch).
    Instant,
    /// Note/clip/automation edits, parameter batches.
    Light,
    /// Creates, deletes, device loads, freezes.
    Structural,
}

impl CommandTier {
    /// Delay applied after a successful send, before the transport is
    /// released to the next caller.
    pub fn post_delay(&self) -> Duration {
        match self {
            CommandTier::Instant => Duration::ZERO,
            CommandTier::Light => Duration::from_millis(50),
            CommandTier::Structural => Duration::from_millis(100),
        }
    }
}

/// Classify a command by name, or `None` for names outside the known
/// vocabulary.
fn known_tier(name: &str) -> Option<CommandTier> {
    match name {
        // === Tier 0: property setters ===
        "set_tempo" | "set_track_name" | "set_track_color" | "set_track_mute"
        | "set_track_solo" | "set_track_arm" | "set_track_volume" | "set_track_pan"
        | "set_clip_name" | "launch_clip" | "stop_clip" | "stop_all_clips"
        | "set_metronome" | "set_loop_region" => Some(CommandTier::Instant),

        // === Tier 1: content edits ===
        "add_notes" | "remove_notes" | "set_clip_loop" | "add_automation"
        | "clear_automation" | "set_warp_markers" | "set_device_parameters"
        | "quantize_clip" => Some(CommandTier::Light),

        // === Tier 2: structural changes ===
        "create_midi_track" | "create_audio_track" | "delete_track" | "create_clip"
        | "delete_clip" | "create_scene" | "delete_scene" | "create_rack"
        | "load_instrument_or_effect" | "load_drum_kit" | "freeze_track"
        | "unfreeze_track" | "audio_to_midi" => Some(CommandTier::Structural),

        // Reads carry no settle cost.
        "get_session_info" | "get_tracks" | "get_track_info" | "get_clip_info"
        | "get_device_parameters" | "get_browser_root" | "browse_children" => {
            Some(CommandTier::Instant)
        }

        _ => None,
    }
}

/// Classify a command by name. Unknown commands are treated as
/// structural: pass-through is permitted, but paced conservatively.
pub fn command_tier(name: &str) -> CommandTier {
    known_tier(name).unwrap_or(CommandTier::Structural)
}

/// Whether the bridge knows this command name. Unknown names are still
/// forwarded (the DAW-side vocabulary is the real gatekeeper), but a
/// known name gets precise classification.
pub fn is_known_command(name: &str) -> bool {
    known_tier(name).is_some()
}

/// Commands whose effect duplicates when applied twice. These are never
/// retried; a transport failure mid-call surfaces immediately.
pub fn is_idempotent(name: &str) -> bool {
    !matches!(
        name,
        "create_midi_track"
            | "create_audio_track"
            | "delete_track"
            | "create_clip"
            | "delete_clip"
            | "create_scene"
            | "delete_scene"
            | "create_rack"
            | "add_notes"
            | "load_instrument_or_effect"
            | "load_drum_kit"
    )
}

/// Read-only commands use the shorter default deadline.
pub fn is_read_only(name: &str) -> bool {
    matches!(
        name,
        "get_session_info"
            | "get_tracks"
            | "get_track_info"
            | "get_clip_info"
            | "get_device_parameters"
            | "get_browser_root"
            | "browse_children"
    )
}

/// Known-slow commands carry their own deadline.
pub fn timeout_override(name: &str) -> Option<Duration> {
    match name {
        "get_browser_root" | "browse_children" => Some(Duration::from_secs(20)),
        "load_instrument_or_effect" | "load_drum_kit" => Some(Duration::from_secs(30)),
        "freeze_track" | "unfreeze_track" | "audio_to_midi" => Some(Duration::from_secs(60)),
        _ => None,
    }
}

/// Deadline for a command: explicit override from the caller, else the
/// slow-command table, else the read/modify default.
pub fn command_timeout(name: &str, explicit: Option<Duration>) -> Duration {
    if let Some(t) = explicit {
        return t;
    }
    if let Some(t) = timeout_override(name) {
        return t;
    }
    if is_read_only(name) {
        DEFAULT_READ_TIMEOUT
    } else {
        DEFAULT_MODIFY_TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_setters_have_no_delay() {
        assert_eq!(command_tier("set_tempo").post_delay(), Duration::ZERO);
        assert_eq!(command_tier("launch_clip").post_delay(), Duration::ZERO);
    }

    #[test]
    fn edits_settle_for_50ms() {
        assert_eq!(command_tier("add_notes").post_delay(), Duration::from_millis(50));
        assert_eq!(
            command_tier("set_device_parameters").post_delay(),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn structural_commands_settle_for_100ms() {
        assert_eq!(
            command_tier("create_midi_track").post_delay(),
            Duration::from_millis(100)
        );
        assert_eq!(
            command_tier("load_instrument_or_effect").post_delay(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn unknown_commands_pace_conservatively() {
        assert_eq!(command_tier("mystery_op"), CommandTier::Structural);
        assert!(!is_known_command("mystery_op"));
    }

    #[test]
    fn creates_are_not_idempotent() {
        assert!(!is_idempotent("create_midi_track"));
        assert!(!is_idempotent("add_notes"));
        assert!(!is_idempotent("load_instrument_or_effect"));
        assert!(is_idempotent("set_tempo"));
        assert!(is_idempotent("get_session_info"));
    }

    #[test]
    fn timeouts_layer_correctly() {
        // Explicit beats everything.
        assert_eq!(
            command_timeout("freeze_track", Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        // Slow table beats defaults.
        assert_eq!(command_timeout("freeze_track", None), Duration::from_secs(60));
        assert_eq!(command_timeout("browse_children", None), Duration::from_secs(20));
        // Defaults split on read vs modify.
        assert_eq!(command_timeout("get_tracks", None), DEFAULT_READ_TIMEOUT);
        assert_eq!(command_timeout("set_tempo", None), DEFAULT_MODIFY_TIMEOUT);
    }
}
