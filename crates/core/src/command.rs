//! Commands sent to the orchestrator actor
//!
//! Every code path that touches shared state — the engine event pump, user
//! actions, relay answers, restore completions — goes through one of these.
//! Queries carry oneshot reply channels; mutations are fire-and-forget.

use agentdeck_engine::EngineEvent;
use agentdeck_protocol::{ConversationMessage, PromptRequest, SessionSummary};
use tokio::sync::oneshot;

pub enum DeckCommand {
    // -- User actions --
    /// Submit a new intent; replies with the created session
    SubmitIntent {
        intent: String,
        cwd: String,
        remote: bool,
        reply: oneshot::Sender<SessionSummary>,
    },

    /// Stop a running session
    Interrupt { session_id: String },

    /// Continue a finished session's engine thread under a brand-new
    /// session object; replies with it, or None when the source session
    /// can't be resumed
    ResumeSession {
        session_id: String,
        intent: String,
        reply: oneshot::Sender<Option<SessionSummary>>,
    },

    /// Answer the prompt with the given request id
    AnswerPrompt {
        request_id: String,
        answers: Vec<String>,
    },

    /// Reject the prompt with the given request id
    RejectPrompt { request_id: String },

    /// Move foreground focus to another session
    SwitchSession { session_id: String },

    /// Drop a session and tell the store to forget it
    DeleteSession { session_id: String },

    // -- Engine stream --
    /// One event from the engine's stream (sent by the event pump)
    EngineEvent { event: EngineEvent },

    // -- Internal feedback --
    /// A store restore finished (spawned by SwitchSession)
    RestoreLoaded {
        session_id: String,
        messages: Vec<ConversationMessage>,
    },

    // -- Queries --
    RunningSessions {
        reply: oneshot::Sender<Vec<SessionSummary>>,
    },
    ActivePrompt {
        reply: oneshot::Sender<Option<PromptRequest>>,
    },
}
