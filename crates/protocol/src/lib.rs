//! AgentDeck Protocol
//!
//! Shared types between the orchestration core and its front end.
//! These types are serialized as JSON over the desktop IPC channel.

use uuid::Uuid;

pub mod client;
pub mod types;
pub mod ui;

pub use client::ClientRequest;
pub use types::*;
pub use ui::UiEvent;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
