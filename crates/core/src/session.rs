//! Session metadata

use agentdeck_protocol::{new_id, ContextUsage, SessionStatus, SessionSummary};

/// One tracked session: a submitted intent and its lifecycle state.
/// The associated message log lives next to it in the registry.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// Engine-assigned id, bound once the engine accepts the intent
    pub engine_session_id: Option<String>,
    pub intent: String,
    pub cwd: String,
    pub status: SessionStatus,
    pub context: ContextUsage,
    pub last_error: Option<String>,
    pub plan_path: Option<String>,
    /// Name of the tool currently running, for the UI's activity indicator
    pub current_tool: Option<String>,
    /// Whether the intent was initiated from a paired remote device
    pub remote_origin: bool,
    pub created_at: String,
}

impl Session {
    pub fn new(intent: impl Into<String>, cwd: impl Into<String>, remote_origin: bool) -> Self {
        Self {
            id: new_id(),
            engine_session_id: None,
            intent: intent.into(),
            cwd: cwd.into(),
            status: SessionStatus::Running,
            context: ContextUsage::default(),
            last_error: None,
            plan_path: None,
            current_tool: None,
            remote_origin,
            created_at: timestamp_now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            engine_session_id: self.engine_session_id.clone(),
            intent: self.intent.clone(),
            cwd: self.cwd.clone(),
            status: self.status,
            context: self.context,
            last_error: self.last_error.clone(),
            plan_path: self.plan_path.clone(),
            current_tool: self.current_tool.clone(),
            remote_origin: self.remote_origin,
            created_at: self.created_at.clone(),
        }
    }
}

/// Get current time as an epoch-seconds string (display-only; never parsed)
pub fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}Z", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_running_and_unbound() {
        let session = Session::new("refactor foo.go", "/tmp/project", false);
        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.engine_session_id.is_none());
        assert!(session.is_running());
        assert!(!session.summary().remote_origin);
    }
}
