//! Interrupt controller
//!
//! Converts a user "stop" into a synchronous local rollback. The upstream
//! engine cancellation is fire-and-forget (the orchestrator sends it before
//! calling in here); what matters is that local state settles *before* any
//! further engine events are routed, so a late streaming delta can never
//! reopen a bubble the user believes stopped.

use agentdeck_protocol::{MessageChanges, MessageStatus, SessionStatus, UiEvent};

use crate::registry::SessionEntry;
use crate::router::{terminal_effects, Effect};

/// Apply the local side of an interrupt. No-op unless the session is
/// `running` (interrupting a terminal session is not an error).
///
/// Every message still `running` is closed as `completed` — a user-stopped
/// tool is not a failed one — and a system notice marks the stop point.
pub fn apply_interrupt(entry: &mut SessionEntry) -> Vec<Effect> {
    if !entry.session.is_running() {
        return Vec::new();
    }

    let sid = entry.session.id.clone();
    let mut effects: Vec<Effect> = Vec::new();

    entry.session.status = SessionStatus::Interrupted;
    entry.session.current_tool = None;

    if entry.log.clear_thinking() {
        effects.push(Effect::Emit(Box::new(UiEvent::Thinking {
            session_id: sid.clone(),
            text: None,
        })));
    }

    for message_id in entry.log.mark_running_completed() {
        effects.push(Effect::Emit(Box::new(UiEvent::MessageUpdated {
            session_id: sid.clone(),
            message_id,
            changes: MessageChanges {
                status: Some(MessageStatus::Completed),
                ..Default::default()
            },
        })));
    }

    let notice = entry.log.push_system("Stopped by user");
    effects.push(Effect::Emit(Box::new(UiEvent::MessageAppended {
        session_id: sid.clone(),
        message: notice,
    })));

    terminal_effects(entry, &sid, &mut effects);
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageLog;
    use crate::persist::PersistCommand;
    use crate::session::Session;
    use agentdeck_protocol::MessageKind;

    fn test_entry() -> SessionEntry {
        SessionEntry {
            session: Session::new("intent", "/tmp/p", false),
            log: MessageLog::new(),
        }
    }

    #[test]
    fn interrupt_closes_running_tool_as_completed() {
        let mut entry = test_entry();
        entry
            .log
            .upsert_tool_start("call-1", "bash", None, "Running tests");

        let effects = apply_interrupt(&mut entry);

        assert_eq!(entry.session.status, SessionStatus::Interrupted);
        assert!(entry.session.current_tool.is_none());
        let tool = entry.log.get_by_tool_call("call-1").unwrap();
        assert_eq!(tool.status, MessageStatus::Completed);

        // System notice appended, snapshot handed to the store
        assert_eq!(
            entry.log.messages().last().unwrap().kind,
            MessageKind::System
        );
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Persist(PersistCommand::SessionSnapshot {
                final_status: SessionStatus::Interrupted,
                ..
            })
        )));
    }

    #[test]
    fn interrupt_clears_thinking_indicator() {
        let mut entry = test_entry();
        entry.log.append_thinking("reasoning...");
        let effects = apply_interrupt(&mut entry);
        assert!(entry.log.thinking().is_none());
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Emit(event) if matches!(**event, UiEvent::Thinking { text: None, .. })
        )));
    }

    #[test]
    fn interrupt_on_terminal_session_is_noop() {
        let mut entry = test_entry();
        entry.session.status = SessionStatus::Completed;
        let effects = apply_interrupt(&mut entry);
        assert!(effects.is_empty());
        assert_eq!(entry.session.status, SessionStatus::Completed);
        assert!(entry.log.is_empty(), "no notice appended");
    }

    #[test]
    fn double_interrupt_is_noop() {
        let mut entry = test_entry();
        assert!(!apply_interrupt(&mut entry).is_empty());
        let before = entry.log.len();
        assert!(apply_interrupt(&mut entry).is_empty());
        assert_eq!(entry.log.len(), before);
    }
}
