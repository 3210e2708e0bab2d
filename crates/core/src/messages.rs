//! Per-session conversation log
//!
//! An ordered, append/update container. Ordering is append order, not
//! timestamp. Upserts are idempotent, keyed by tool-call id with message
//! id as the fallback: re-applying an event for a known call updates the
//! existing entry in place and never duplicates it.

use std::collections::HashMap;

use agentdeck_protocol::{ConversationMessage, MessageKind, MessageStatus, TodoItem};

use crate::session::timestamp_now;

/// How many trailing user messages to scan when deduplicating echoes
const USER_ECHO_WINDOW: usize = 5;

#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<ConversationMessage>,
    by_id: HashMap<String, usize>,
    by_tool_call: HashMap<String, usize>,
    /// Index of the assistant message still receiving streaming deltas
    open_assistant: Option<usize>,
    /// Index of the single active todo message (snapshots replace its items)
    todo_index: Option<usize>,
    /// Transient reasoning text; surfaced as a live indicator, never stored
    thinking: Option<String>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from a persisted snapshot. Nothing is considered open.
    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        let mut log = Self::default();
        for message in messages {
            log.insert(message);
        }
        log
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<ConversationMessage> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&ConversationMessage> {
        self.by_id.get(message_id).map(|&i| &self.entries[i])
    }

    pub fn get_by_tool_call(&self, tool_call_id: &str) -> Option<&ConversationMessage> {
        self.by_tool_call.get(tool_call_id).map(|&i| &self.entries[i])
    }

    pub fn thinking(&self) -> Option<&str> {
        self.thinking.as_deref()
    }

    fn insert(&mut self, message: ConversationMessage) -> usize {
        let index = self.entries.len();
        self.by_id.insert(message.id.clone(), index);
        if let Some(call_id) = &message.tool_call_id {
            self.by_tool_call.insert(call_id.clone(), index);
        }
        self.entries.push(message);
        index
    }

    /// Whether `content` repeats a recent user turn (the engine echoes
    /// submitted intents back on the stream)
    pub fn is_recent_user_echo(&self, content: &str) -> bool {
        self.entries
            .iter()
            .rev()
            .take(USER_ECHO_WINDOW)
            .any(|m| m.kind == MessageKind::User && m.content == content)
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> ConversationMessage {
        self.open_assistant = None;
        let message = ConversationMessage::new(MessageKind::User, content, timestamp_now());
        let index = self.insert(message);
        self.entries[index].clone()
    }

    pub fn push_system(&mut self, content: impl Into<String>) -> ConversationMessage {
        let message = ConversationMessage::new(MessageKind::System, content, timestamp_now());
        let index = self.insert(message);
        self.entries[index].clone()
    }

    /// Append a streaming chunk to the open assistant message, or open a
    /// new one. Returns the message and whether it was newly created.
    pub fn append_assistant_delta(&mut self, text: &str) -> (ConversationMessage, bool) {
        if let Some(index) = self.open_assistant {
            self.entries[index].content.push_str(text);
            (self.entries[index].clone(), false)
        } else {
            let mut message =
                ConversationMessage::new(MessageKind::Assistant, text, timestamp_now());
            message.status = MessageStatus::Running;
            let index = self.insert(message);
            self.open_assistant = Some(index);
            (self.entries[index].clone(), true)
        }
    }

    /// Close the streaming assistant message, if any. Returns it when its
    /// status changed.
    pub fn close_assistant(&mut self) -> Option<ConversationMessage> {
        let index = self.open_assistant.take()?;
        let entry = &mut self.entries[index];
        if entry.status.advances_to(MessageStatus::Completed) {
            entry.status = MessageStatus::Completed;
            return Some(entry.clone());
        }
        None
    }

    /// Accumulate transient reasoning text. Returns the full indicator text.
    pub fn append_thinking(&mut self, text: &str) -> String {
        let buffer = self.thinking.get_or_insert_with(String::new);
        buffer.push_str(text);
        buffer.clone()
    }

    /// Clear the thinking indicator. Returns whether it was set.
    pub fn clear_thinking(&mut self) -> bool {
        self.thinking.take().is_some()
    }

    /// Upsert a tool message for `tool_call_id` with status `running`.
    /// Returns the message and whether it was newly created.
    pub fn upsert_tool_start(
        &mut self,
        tool_call_id: &str,
        tool: &str,
        input: Option<serde_json::Value>,
        content: impl Into<String>,
    ) -> (ConversationMessage, bool) {
        self.open_assistant = None;
        if let Some(&index) = self.by_tool_call.get(tool_call_id) {
            let entry = &mut self.entries[index];
            if entry.status.advances_to(MessageStatus::Running) {
                entry.status = MessageStatus::Running;
            }
            if entry.tool_input.is_none() {
                entry.tool_input = input;
            }
            return (entry.clone(), false);
        }

        let mut message = ConversationMessage::new(MessageKind::Tool, content, timestamp_now());
        message.tool_name = Some(tool.to_string());
        message.tool_input = input;
        message.tool_call_id = Some(tool_call_id.to_string());
        message.status = MessageStatus::Running;
        let index = self.insert(message);
        (self.entries[index].clone(), true)
    }

    /// Append streamed tool output. Creates the entry if the start event
    /// was missed (the stream is authoritative).
    pub fn append_tool_delta(
        &mut self,
        tool_call_id: &str,
        chunk: &str,
    ) -> (ConversationMessage, bool) {
        if let Some(&index) = self.by_tool_call.get(tool_call_id) {
            let entry = &mut self.entries[index];
            entry.tool_output.get_or_insert_with(String::new).push_str(chunk);
            return (entry.clone(), false);
        }

        let mut message = ConversationMessage::new(MessageKind::Tool, "", timestamp_now());
        message.tool_call_id = Some(tool_call_id.to_string());
        message.tool_output = Some(chunk.to_string());
        message.status = MessageStatus::Running;
        let index = self.insert(message);
        (self.entries[index].clone(), true)
    }

    /// Transition a tool message to its final status. The status only moves
    /// forward: a `failed` arriving after the message was already closed
    /// (e.g. by an interrupt) is kept for audit in the output but does not
    /// regress the status. Returns the updated message and whether the
    /// status actually changed.
    pub fn finish_tool(
        &mut self,
        tool_call_id: &str,
        status: MessageStatus,
        output: Option<String>,
        diff: Option<String>,
    ) -> Option<(ConversationMessage, bool)> {
        let &index = self.by_tool_call.get(tool_call_id)?;
        let entry = &mut self.entries[index];
        let advanced = entry.status.advances_to(status);
        if advanced {
            entry.status = status;
        }
        if let Some(output) = output {
            if entry.tool_output.is_none() {
                entry.tool_output = Some(output);
            }
        }
        if diff.is_some() {
            entry.diff = diff;
        }
        Some((entry.clone(), advanced))
    }

    /// Record a prompt resolution on its originating tool message: the
    /// response text becomes the tool output and the call completes.
    pub fn record_resolution(
        &mut self,
        tool_call_id: &str,
        response: &str,
    ) -> Option<ConversationMessage> {
        let &index = self.by_tool_call.get(tool_call_id)?;
        let entry = &mut self.entries[index];
        if entry.status.advances_to(MessageStatus::Completed) {
            entry.status = MessageStatus::Completed;
        }
        entry.tool_output = Some(response.to_string());
        Some(entry.clone())
    }

    /// Replace the active todo message's items wholesale (last snapshot
    /// wins, no merge). Returns the message and whether it was created.
    pub fn apply_todo_snapshot(&mut self, items: Vec<TodoItem>) -> (ConversationMessage, bool) {
        if let Some(index) = self.todo_index {
            self.entries[index].todos = items;
            return (self.entries[index].clone(), false);
        }
        let mut message = ConversationMessage::new(MessageKind::Todo, "", timestamp_now());
        message.todos = items;
        let index = self.insert(message);
        self.todo_index = Some(index);
        (self.entries[index].clone(), true)
    }

    /// Close every `running` message as `completed` — used by interrupt to
    /// distinguish a user-stopped tool from a failed one. Returns the
    /// affected message ids in log order.
    pub fn mark_running_completed(&mut self) -> Vec<String> {
        self.open_assistant = None;
        let mut changed = Vec::new();
        for entry in &mut self.entries {
            if entry.status == MessageStatus::Running {
                entry.status = MessageStatus::Completed;
                changed.push(entry.id.clone());
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_events_upsert_by_call_id() {
        let mut log = MessageLog::new();
        let (first, created) = log.upsert_tool_start("call-1", "edit", None, "Editing foo.go");
        assert!(created);
        assert_eq!(first.status, MessageStatus::Running);

        // Re-applying the same start is a no-op upsert
        let (_, created) = log.upsert_tool_start("call-1", "edit", None, "Editing foo.go");
        assert!(!created);
        assert_eq!(log.len(), 1);

        log.append_tool_delta("call-1", "patching...");
        let (done, advanced) = log
            .finish_tool("call-1", MessageStatus::Completed, Some("done".into()), None)
            .unwrap();
        assert!(advanced);
        assert_eq!(done.status, MessageStatus::Completed);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn finish_tool_never_regresses_status() {
        let mut log = MessageLog::new();
        log.upsert_tool_start("call-1", "bash", None, "Running tests");
        log.finish_tool("call-1", MessageStatus::Completed, None, None);

        // A late `failed` (e.g. after an interrupt) must not flip it
        let (msg, advanced) = log
            .finish_tool("call-1", MessageStatus::Failed, Some("killed".into()), None)
            .unwrap();
        assert!(!advanced);
        assert_eq!(msg.status, MessageStatus::Completed);
        // Output still attached for audit
        assert_eq!(msg.tool_output.as_deref(), Some("killed"));
    }

    #[test]
    fn assistant_deltas_stream_into_one_message() {
        let mut log = MessageLog::new();
        let (_, created) = log.append_assistant_delta("Hello");
        assert!(created);
        let (msg, created) = log.append_assistant_delta(", world");
        assert!(!created);
        assert_eq!(msg.content, "Hello, world");
        assert_eq!(log.len(), 1);

        let closed = log.close_assistant().unwrap();
        assert_eq!(closed.status, MessageStatus::Completed);

        // Next delta opens a fresh message
        let (_, created) = log.append_assistant_delta("Again");
        assert!(created);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn tool_start_closes_open_assistant_message() {
        let mut log = MessageLog::new();
        log.append_assistant_delta("working on it");
        log.upsert_tool_start("call-1", "edit", None, "Editing");
        let (_, created) = log.append_assistant_delta("more text");
        assert!(created, "delta after tool start opens a new message");
    }

    #[test]
    fn thinking_is_transient() {
        let mut log = MessageLog::new();
        let text = log.append_thinking("pondering");
        assert_eq!(text, "pondering");
        let text = log.append_thinking(" deeply");
        assert_eq!(text, "pondering deeply");
        assert!(log.clear_thinking());
        assert!(!log.clear_thinking());
        assert!(log.is_empty(), "reasoning never lands in the log");
    }

    #[test]
    fn todo_snapshot_replaces_wholesale() {
        let mut log = MessageLog::new();
        let items = vec![TodoItem {
            text: "write tests".into(),
            status: agentdeck_protocol::TodoStatus::Pending,
        }];
        let (_, created) = log.apply_todo_snapshot(items);
        assert!(created);

        let replacement = vec![
            TodoItem {
                text: "write tests".into(),
                status: agentdeck_protocol::TodoStatus::Completed,
            },
            TodoItem {
                text: "run clippy".into(),
                status: agentdeck_protocol::TodoStatus::Pending,
            },
        ];
        let (msg, created) = log.apply_todo_snapshot(replacement);
        assert!(!created);
        assert_eq!(msg.todos.len(), 2);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn mark_running_completed_closes_everything_running() {
        let mut log = MessageLog::new();
        log.append_assistant_delta("streaming");
        log.upsert_tool_start("call-1", "bash", None, "Running");
        log.push_user("hi");

        let changed = log.mark_running_completed();
        assert_eq!(changed.len(), 2);
        assert!(log
            .messages()
            .iter()
            .all(|m| m.status != MessageStatus::Running));
    }

    #[test]
    fn user_echo_detection_scans_recent_window() {
        let mut log = MessageLog::new();
        log.push_user("refactor foo.go");
        assert!(log.is_recent_user_echo("refactor foo.go"));
        assert!(!log.is_recent_user_echo("something else"));
    }

    #[test]
    fn restore_rebuilds_indices() {
        let mut log = MessageLog::new();
        log.upsert_tool_start("call-1", "edit", None, "Editing");
        let restored = MessageLog::from_messages(log.to_vec());
        assert!(restored.get_by_tool_call("call-1").is_some());
    }

    #[test]
    fn record_resolution_completes_with_response_text() {
        let mut log = MessageLog::new();
        log.upsert_tool_start("call-1", "permission", None, "Edit foo.go?");
        let msg = log.record_resolution("call-1", "Allow Once").unwrap();
        assert_eq!(msg.status, MessageStatus::Completed);
        assert_eq!(msg.tool_output.as_deref(), Some("Allow Once"));
    }
}
