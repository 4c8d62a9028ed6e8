//! # pulse-openclaw
//!
//! Thin HTTP client for the OpenClaw analysis API, plus a small mock of the
//! API (`/health`, `/analyze`) for local development.

pub mod client;
pub mod mock;

pub use client::{DEFAULT_PREDICT_ENDPOINT, OpenClawClient};
pub use mock::{DEFAULT_MOCK_LISTEN, analyze_text, mock_router, serve_mock};
