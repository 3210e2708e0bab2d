//! Engine wire model
//!
//! Events arrive as NDJSON lines, one `EngineEvent` per line, each tagged
//! with the engine-assigned session id and a `kind`. Commands go back the
//! same way. Unknown event kinds decode to an opaque fallback instead of
//! failing the stream.

use agentdeck_protocol::{PromptKind, PromptOption, TodoItem};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// One event from the engine's stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub session_id: String,
    #[serde(flatten)]
    pub kind: EngineEventKind,
}

impl EngineEvent {
    /// Decode a single NDJSON line
    pub fn from_json_line(line: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Event kinds, per the engine's stream protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EngineEventKind {
    /// Echo of a user turn (the engine replays submitted intents)
    User { text: String },

    /// Streaming chunk of assistant output
    AssistantDelta { text: String },

    /// Streaming chunk of the engine's reasoning; transient, display-only
    ReasoningDelta { text: String },

    /// A tool call began. Permission/question tools carry a prompt payload.
    ToolStart {
        tool_call_id: String,
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prompt: Option<PromptPayload>,
    },

    /// Streaming chunk of tool output
    ToolDelta {
        tool_call_id: String,
        output: String,
    },

    /// A tool call finished
    ToolEnd {
        tool_call_id: String,
        outcome: ToolOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        diff: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        plan_path: Option<String>,
    },

    /// Full replacement of the session's todo list (last snapshot wins)
    TodoSnapshot { items: Vec<TodoItem> },

    /// The intent ran to completion
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        context_tokens: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        context_window: Option<u64>,
    },

    /// The engine reported a failure; the session is over
    Error { message: String },

    /// Forward-compatible fallback for kinds this build doesn't know
    #[serde(other)]
    Unknown,
}

/// How a tool call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Completed,
    Failed,
}

/// Prompt metadata attached to a permission/question tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptPayload {
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

/// Commands sent to the engine. Submission and interruption are
/// fire-and-forget: their outcome is observed via the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineCommand {
    Submit {
        intent: String,
        cwd: String,
    },
    Resume {
        engine_session_id: String,
        intent: String,
    },
    Interrupt {
        engine_session_id: String,
    },
    PermissionReply {
        request_id: String,
        decision: PermissionDecision,
    },
    QuestionReply {
        request_id: String,
        answers: Vec<String>,
    },
    QuestionReject {
        request_id: String,
    },
}

impl EngineCommand {
    /// Encode as a single NDJSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Permission decisions understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Once,
    Always,
    Reject,
}

impl PermissionDecision {
    /// Map a selected option label to a decision. Unrecognized labels are
    /// treated as a rejection rather than silently approving.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "allow once" | "allow" | "yes" => PermissionDecision::Once,
            "always allow" | "allow always" => PermissionDecision::Always,
            _ => PermissionDecision::Reject,
        }
    }
}
