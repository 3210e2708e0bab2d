//! Event router
//!
//! Converts engine events into message-log operations and session status
//! transitions as a synchronous reducer: `route_event(entry, event)` mutates
//! the session entry and returns effects (persistence writes, UI
//! notifications, prompt submissions) for the orchestrator to execute. No
//! IO, no locking — fully unit-testable.
//!
//! Ordering: the caller feeds one engine session's events strictly in
//! arrival order; different sessions' events may interleave freely.
//! Terminal sessions keep absorbing log updates for audit, but their status
//! never changes and they raise no new prompts.

use agentdeck_engine::{EngineEventKind, PromptPayload, ToolOutcome};
use agentdeck_protocol::{
    ContextUsage, MessageChanges, MessageStatus, PromptRequest, SessionStatus, StateChanges,
    UiEvent,
};
use tracing::debug;

use crate::persist::PersistCommand;
use crate::registry::SessionEntry;

/// IO the orchestrator executes on the router's behalf
pub enum Effect {
    Persist(PersistCommand),
    Emit(Box<UiEvent>),
    /// Hand a permission/question request to the prompt queue. Produced
    /// before any further events for the owning tool call are routed.
    ShowPrompt(Box<PromptRequest>),
}

/// Route one engine event into a session's log and status.
pub fn route_event(entry: &mut SessionEntry, event: EngineEventKind) -> Vec<Effect> {
    let sid = entry.session.id.clone();
    let mut effects: Vec<Effect> = Vec::new();

    // Reasoning is transient: the indicator survives only until the next
    // non-reasoning event for the session.
    if !matches!(event, EngineEventKind::ReasoningDelta { .. }) && entry.log.clear_thinking() {
        effects.push(emit(UiEvent::Thinking {
            session_id: sid.clone(),
            text: None,
        }));
    }

    match event {
        EngineEventKind::User { text } => {
            // The engine echoes submitted intents back on the stream
            if entry.log.is_recent_user_echo(&text) {
                return effects;
            }
            close_assistant(entry, &sid, &mut effects);
            let message = entry.log.push_user(text);
            effects.push(emit(UiEvent::MessageAppended {
                session_id: sid,
                message,
            }));
        }

        EngineEventKind::AssistantDelta { text } => {
            let (message, created) = entry.log.append_assistant_delta(&text);
            if created {
                effects.push(emit(UiEvent::MessageAppended {
                    session_id: sid,
                    message,
                }));
            } else {
                effects.push(emit(UiEvent::MessageUpdated {
                    session_id: sid,
                    message_id: message.id,
                    changes: MessageChanges {
                        content: Some(message.content),
                        ..Default::default()
                    },
                }));
            }
        }

        EngineEventKind::ReasoningDelta { text } => {
            let full = entry.log.append_thinking(&text);
            effects.push(emit(UiEvent::Thinking {
                session_id: sid,
                text: Some(full),
            }));
        }

        EngineEventKind::ToolStart {
            tool_call_id,
            tool,
            input,
            prompt,
        } => {
            close_assistant(entry, &sid, &mut effects);
            let content = tool_content(&tool, prompt.as_ref());
            let (message, created) =
                entry
                    .log
                    .upsert_tool_start(&tool_call_id, &tool, input, content);
            if created {
                effects.push(emit(UiEvent::MessageAppended {
                    session_id: sid.clone(),
                    message,
                }));
            } else {
                effects.push(emit(UiEvent::MessageUpdated {
                    session_id: sid.clone(),
                    message_id: message.id,
                    changes: MessageChanges {
                        status: Some(MessageStatus::Running),
                        ..Default::default()
                    },
                }));
            }

            entry.session.current_tool = Some(tool);
            effects.push(emit(UiEvent::SessionDelta {
                session_id: sid.clone(),
                changes: StateChanges {
                    current_tool: Some(entry.session.current_tool.clone()),
                    ..Default::default()
                },
            }));

            // The pending approval must surface immediately, not after the
            // call completes. Terminal sessions raise no new prompts.
            if let Some(payload) = prompt {
                if entry.session.is_running() {
                    effects.push(Effect::ShowPrompt(Box::new(prompt_request(
                        &sid,
                        &tool_call_id,
                        payload,
                    ))));
                } else {
                    debug!(
                        component = "router",
                        event = "prompt.suppressed",
                        session_id = %sid,
                        request_id = %tool_call_id,
                        "Prompt for terminal session suppressed"
                    );
                }
            }
        }

        EngineEventKind::ToolDelta {
            tool_call_id,
            output,
        } => {
            let (message, created) = entry.log.append_tool_delta(&tool_call_id, &output);
            if created {
                effects.push(emit(UiEvent::MessageAppended {
                    session_id: sid,
                    message,
                }));
            } else {
                effects.push(emit(UiEvent::MessageUpdated {
                    session_id: sid,
                    message_id: message.id,
                    changes: MessageChanges {
                        tool_output: message.tool_output,
                        ..Default::default()
                    },
                }));
            }
        }

        EngineEventKind::ToolEnd {
            tool_call_id,
            outcome,
            output,
            diff,
            plan_path,
        } => {
            let status = match outcome {
                ToolOutcome::Completed => MessageStatus::Completed,
                ToolOutcome::Failed => MessageStatus::Failed,
            };
            match entry.log.finish_tool(&tool_call_id, status, output, diff) {
                Some((message, _)) => {
                    effects.push(emit(UiEvent::MessageUpdated {
                        session_id: sid.clone(),
                        message_id: message.id,
                        changes: MessageChanges {
                            tool_output: message.tool_output,
                            diff: message.diff,
                            status: Some(message.status),
                            ..Default::default()
                        },
                    }));
                }
                None => {
                    debug!(
                        component = "router",
                        event = "tool.end_unmatched",
                        session_id = %sid,
                        tool_call_id = %tool_call_id,
                        "Dropping tool-end with no matching call"
                    );
                }
            }

            let mut changes = StateChanges::default();
            entry.session.current_tool = None;
            changes.current_tool = Some(None);
            if plan_path.is_some() {
                entry.session.plan_path = plan_path;
                changes.plan_path = Some(entry.session.plan_path.clone());
            }
            effects.push(emit(UiEvent::SessionDelta {
                session_id: sid,
                changes,
            }));
        }

        EngineEventKind::TodoSnapshot { items } => {
            let (message, created) = entry.log.apply_todo_snapshot(items);
            if created {
                effects.push(emit(UiEvent::MessageAppended {
                    session_id: sid,
                    message,
                }));
            } else {
                effects.push(emit(UiEvent::MessageUpdated {
                    session_id: sid,
                    message_id: message.id,
                    changes: MessageChanges {
                        todos: Some(message.todos),
                        ..Default::default()
                    },
                }));
            }
        }

        EngineEventKind::Done {
            context_tokens,
            context_window,
        } => {
            close_assistant(entry, &sid, &mut effects);
            if let Some(tokens) = context_tokens {
                entry.session.context = ContextUsage {
                    tokens,
                    context_window: context_window
                        .unwrap_or(entry.session.context.context_window),
                };
                effects.push(emit(UiEvent::SessionDelta {
                    session_id: sid.clone(),
                    changes: StateChanges {
                        context: Some(entry.session.context),
                        ..Default::default()
                    },
                }));
            }

            // Interrupt wins over a late `done`
            if entry.session.is_running() {
                entry.session.status = SessionStatus::Completed;
                entry.session.current_tool = None;
                terminal_effects(entry, &sid, &mut effects);
            } else {
                debug!(
                    component = "router",
                    event = "session.late_done",
                    session_id = %sid,
                    status = ?entry.session.status,
                    "Ignoring done for non-running session"
                );
            }
        }

        EngineEventKind::Error { message } => {
            close_assistant(entry, &sid, &mut effects);
            // The failure is appended as a distinguishable message; the
            // history up to this point is kept.
            let notice = entry.log.push_system(format!("Engine error: {message}"));
            effects.push(emit(UiEvent::MessageAppended {
                session_id: sid.clone(),
                message: notice,
            }));

            if entry.session.is_running() {
                entry.session.status = SessionStatus::Failed;
                entry.session.last_error = Some(message);
                entry.session.current_tool = None;
                terminal_effects(entry, &sid, &mut effects);
            } else {
                debug!(
                    component = "router",
                    event = "session.late_error",
                    session_id = %sid,
                    status = ?entry.session.status,
                    "Ignoring error status for non-running session"
                );
            }
        }

        EngineEventKind::Unknown => {
            debug!(
                component = "router",
                event = "engine.event.unknown",
                session_id = %sid,
                "Dropping unknown engine event kind"
            );
        }
    }

    effects
}

fn emit(event: UiEvent) -> Effect {
    Effect::Emit(Box::new(event))
}

fn close_assistant(entry: &mut SessionEntry, sid: &str, effects: &mut Vec<Effect>) {
    if let Some(message) = entry.log.close_assistant() {
        effects.push(emit(UiEvent::MessageUpdated {
            session_id: sid.to_string(),
            message_id: message.id,
            changes: MessageChanges {
                status: Some(message.status),
                ..Default::default()
            },
        }));
    }
}

/// Snapshot handoff plus the two notifications every terminal transition
/// produces. Callers set the status first.
pub(crate) fn terminal_effects(entry: &SessionEntry, sid: &str, effects: &mut Vec<Effect>) {
    effects.push(emit(UiEvent::SessionDelta {
        session_id: sid.to_string(),
        changes: StateChanges {
            status: Some(entry.session.status),
            last_error: Some(entry.session.last_error.clone()),
            current_tool: Some(None),
            ..Default::default()
        },
    }));
    effects.push(emit(UiEvent::SessionEnded {
        session_id: sid.to_string(),
        status: entry.session.status,
        error: entry.session.last_error.clone(),
    }));
    effects.push(Effect::Persist(PersistCommand::SessionSnapshot {
        session_id: sid.to_string(),
        final_status: entry.session.status,
        messages: entry.log.to_vec(),
    }));
}

fn tool_content(tool: &str, prompt: Option<&PromptPayload>) -> String {
    match prompt {
        Some(payload) => payload.prompt.clone(),
        None => tool.to_string(),
    }
}

fn prompt_request(sid: &str, tool_call_id: &str, payload: PromptPayload) -> PromptRequest {
    PromptRequest {
        id: tool_call_id.to_string(),
        session_id: sid.to_string(),
        kind: payload.kind,
        header: payload.header,
        prompt: payload.prompt,
        options: payload.options,
        multi_select: payload.multi_select,
        diff: payload.diff,
        pattern: payload.pattern,
    }
}
