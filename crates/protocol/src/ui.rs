//! Core → front-end notifications
//!
//! The front end never mutates core state directly; it receives these
//! change notifications and reads snapshots.

use serde::{Deserialize, Serialize};

use crate::types::{
    ConversationMessage, MessageChanges, PromptRequest, SessionStatus, SessionSummary,
    StateChanges,
};

/// Notifications broadcast from the orchestration core to the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    // Lifecycle
    SessionCreated {
        session: SessionSummary,
    },
    SessionEnded {
        session_id: String,
        status: SessionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    SessionDeleted {
        session_id: String,
    },

    // Incremental updates
    SessionDelta {
        session_id: String,
        changes: StateChanges,
    },
    MessageAppended {
        session_id: String,
        message: ConversationMessage,
    },
    MessageUpdated {
        session_id: String,
        message_id: String,
        changes: MessageChanges,
    },
    /// The whole log was replaced (focus switch or restore)
    LogReplaced {
        session_id: String,
        messages: Vec<ConversationMessage>,
    },
    /// Live "thinking" indicator; `None` clears it
    Thinking {
        session_id: String,
        text: Option<String>,
    },

    /// Reply to a `ListRunning` request
    RunningSessions {
        sessions: Vec<SessionSummary>,
    },

    // Prompts
    PromptDisplayed {
        request: PromptRequest,
    },
    PromptResolved {
        request_id: String,
    },
}
