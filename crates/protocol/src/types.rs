//! Core types shared across the protocol

use serde::{Deserialize, Serialize};

/// Session status - terminal states are absorbing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl SessionStatus {
    /// Whether no further status transitions are allowed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

/// Message kind - what a conversation entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    Tool,
    System,
    Todo,
    Reasoning,
}

/// Message status - tool messages only move forward:
/// `pending -> running -> {completed|failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl MessageStatus {
    fn rank(self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Running => 1,
            MessageStatus::Completed => 2,
            MessageStatus::Failed => 2,
        }
    }

    /// Whether a transition to `next` is a forward move. Regressive
    /// transitions (and completed -> failed flips) are rejected.
    pub fn advances_to(self, next: MessageStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// Status of a single todo item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One entry in a todo snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub text: String,
    pub status: TodoStatus,
}

/// A message in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub kind: MessageKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Unified diff produced by the tool call, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub todos: Vec<TodoItem>,
    pub timestamp: String,
}

impl ConversationMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>, timestamp: String) -> Self {
        Self {
            id: crate::new_id(),
            kind,
            content: content.into(),
            tool_name: None,
            tool_input: None,
            tool_output: None,
            tool_call_id: None,
            diff: None,
            status: MessageStatus::Completed,
            todos: Vec::new(),
            timestamp,
        }
    }
}

/// Context-size estimate for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub tokens: u64,
    pub context_window: u64,
}

impl ContextUsage {
    /// Context fill percentage, 0 when the window is unknown
    pub fn fill_percent(&self) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        (self.tokens as f64 / self.context_window as f64) * 100.0
    }
}

/// Kind of human-approval checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Permission,
    Question,
}

/// One selectable option in a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A permission/question request raised by the engine mid-execution.
/// Ephemeral: discarded as soon as it is resolved, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Matches the engine's correlation id (the originating tool call)
    pub id: String,
    pub session_id: String,
    pub kind: PromptKind,
    pub header: String,
    pub prompt: String,
    pub options: Vec<PromptOption>,
    #[serde(default)]
    pub multi_select: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// How a prompt was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromptResolution {
    Answered { answers: Vec<String> },
    Rejected,
}

/// Summary of a session for list views and snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_session_id: Option<String>,
    pub intent: String,
    pub cwd: String,
    pub status: SessionStatus,
    pub context: ContextUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<String>,
    pub remote_origin: bool,
    pub created_at: String,
}

/// Changes to apply to a session (delta updates). Double-option fields
/// distinguish "unchanged" from "cleared".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tool: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_session_id: Option<String>,
}

/// Changes to apply to a message (delta updates)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<TodoItem>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_status_only_advances_forward() {
        assert!(MessageStatus::Pending.advances_to(MessageStatus::Running));
        assert!(MessageStatus::Running.advances_to(MessageStatus::Completed));
        assert!(MessageStatus::Running.advances_to(MessageStatus::Failed));
        assert!(!MessageStatus::Completed.advances_to(MessageStatus::Running));
        assert!(!MessageStatus::Completed.advances_to(MessageStatus::Failed));
        assert!(!MessageStatus::Failed.advances_to(MessageStatus::Completed));
        assert!(!MessageStatus::Running.advances_to(MessageStatus::Pending));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SessionStatus::Running.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Interrupted.is_terminal());
    }

    #[test]
    fn context_fill_percent_handles_zero_window() {
        let usage = ContextUsage::default();
        assert_eq!(usage.fill_percent(), 0.0);

        let usage = ContextUsage {
            tokens: 50_000,
            context_window: 200_000,
        };
        assert!((usage.fill_percent() - 25.0).abs() < f64::EPSILON);
    }
}
