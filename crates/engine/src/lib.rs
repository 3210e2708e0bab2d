//! AgentDeck Engine Boundary
//!
//! The engine is an external autonomous agent process. It accepts intents,
//! executes them, and emits a single NDJSON event stream tagged by engine
//! session id. This crate holds the wire model (events in, commands out)
//! and a stream-attached client; process launch and bundling live elsewhere.

pub mod client;
pub mod events;

pub use client::EngineClient;
pub use events::{
    EngineCommand, EngineEvent, EngineEventKind, PermissionDecision, PromptPayload, ToolOutcome,
};

use thiserror::Error;

/// Errors that can occur at the engine boundary. Stream IO failures never
/// surface here; the pumps log and stop instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Wire encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
