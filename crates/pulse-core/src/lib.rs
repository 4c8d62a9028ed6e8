//! # pulse-core
//!
//! Core types and traits for the Pulse agent tool server.
//! This crate defines the shared vocabulary used by every other crate in the workspace.

pub mod error;
pub mod tool;

pub use error::{PulseError, Result};
pub use tool::{Tool, ToolCall, ToolExecutor, ToolResult};
