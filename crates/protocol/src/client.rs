//! Front-end → core requests

use serde::{Deserialize, Serialize};

/// Requests sent from the front end to the orchestration core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    SubmitIntent {
        intent: String,
        cwd: String,
        #[serde(default)]
        remote: bool,
    },
    Interrupt {
        session_id: String,
    },
    AnswerPrompt {
        request_id: String,
        answers: Vec<String>,
    },
    RejectPrompt {
        request_id: String,
    },
    SwitchSession {
        session_id: String,
    },
    DeleteSession {
        session_id: String,
    },
    ListRunning,
}
