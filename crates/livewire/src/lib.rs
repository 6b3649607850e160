//! Protocol types for the stagehand DAW bridge.
//!
//! This crate defines everything that crosses a wire or a component
//! boundary: DAW commands and responses, line framing, tier and
//! idempotency classification, the chunk envelope used by the OSC
//! bridge, the closed error taxonomy, and the uniform tool-result
//! envelope handed back to the agent.
//!
//! The daemon lives in the `stagehand` crate; this crate has no I/O.

pub mod chunk;
pub mod command;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod tier;

pub use chunk::{ChunkAssembly, ChunkEnvelope, DecodedMessage};
pub use command::{DawCommand, DawResponse, DawStatus};
pub use envelope::ToolOutput;
pub use error::BridgeError;
pub use frame::LineBuffer;
pub use tier::CommandTier;
