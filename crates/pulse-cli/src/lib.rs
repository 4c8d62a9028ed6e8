//! # pulse-cli
//!
//! Command-line interface for Pulse.
//!
//! ## Commands
//!
//! - `pulse serve`: Run the tool server
//! - `pulse mock-api`: Run the mock OpenClaw analysis API
//! - `pulse openclaw`: Call the OpenClaw API directly
//! - `pulse telemetry`: Emit events or probe the telemetry endpoint
//! - `pulse tools`: List or call tools in-process
//! - `pulse config` / `pulse doctor`: Inspect and audit configuration

pub mod commands;
pub mod probe;

pub use commands::Cli;
