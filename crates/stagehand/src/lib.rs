//! stagehand - MCP bridge daemon that lets an agent drive a host DAW.
//!
//! The daemon multiplexes agent tool calls onto three DAW transports:
//! a reliable TCP command channel, a lossy UDP real-time channel, and
//! an OSC bridge to an in-DAW scripting device. Everything binds to
//! loopback; there is no authentication and no multi-tenancy.

pub mod calllog;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod mcp;
pub mod oscbridge;
pub mod pipeline;
pub mod prompts;
pub mod readiness;
pub mod resources;
pub mod singleton;
pub mod state;
pub mod stores;
pub mod tcp;
pub mod tools;
pub mod tools_registry;
pub mod udp;
pub mod web;

pub use config::Config;
pub use state::App;
