//! Session registry
//!
//! One entry per known session: lifecycle metadata plus its message log.
//! Local ids are allocated at submit time; the engine-assigned session id
//! is bound exactly once, on the first event the engine emits for the
//! intent. Events for engine ids that are not yet bound are buffered (in
//! arrival order, bounded) and replayed at bind time; operations on ids
//! the registry has never heard of are dropped, since the engine may trail
//! events after a session is abandoned.

use std::collections::{HashMap, VecDeque};

use agentdeck_engine::EngineEventKind;
use agentdeck_protocol::SessionSummary;
use tracing::{debug, warn};

use crate::messages::MessageLog;
use crate::session::Session;

/// Max buffered events per unbound engine session id; overflow drops the
/// oldest event
const UNBOUND_BUFFER_CAP: usize = 256;

/// Max distinct unbound engine ids tracked at once; beyond this, events for
/// new unknown ids are dropped outright
const UNBOUND_SESSION_CAP: usize = 16;

/// A session and its conversation log
pub struct SessionEntry {
    pub session: Session,
    pub log: MessageLog,
}

#[derive(Default)]
pub struct SessionRegistry {
    entries: HashMap<String, SessionEntry>,
    /// engine session id -> local session id
    engine_index: HashMap<String, String>,
    /// Local sessions submitted but not yet bound to an engine id, oldest
    /// first. The engine acknowledges intents in submission order.
    pending_bind: VecDeque<String>,
    /// Events for engine ids with no binding yet
    unbound: HashMap<String, VecDeque<EngineEventKind>>,
    /// The single foreground session
    current: Option<String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new running session, make it current, and queue it for
    /// engine-id binding. Returns the local session id.
    pub fn create_session(
        &mut self,
        intent: impl Into<String>,
        cwd: impl Into<String>,
        remote_origin: bool,
    ) -> String {
        let session = Session::new(intent, cwd, remote_origin);
        let id = session.id.clone();
        self.entries.insert(
            id.clone(),
            SessionEntry {
                session,
                log: MessageLog::new(),
            },
        );
        self.pending_bind.push_back(id.clone());
        self.current = Some(id.clone());
        id
    }

    pub fn entry(&self, id: &str) -> Option<&SessionEntry> {
        self.entries.get(id)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut SessionEntry> {
        self.entries.get_mut(id)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_current(&self, id: &str) -> bool {
        self.current.as_deref() == Some(id)
    }

    /// Switch foreground focus. Returns false for unknown ids.
    pub fn set_current(&mut self, id: &str) -> bool {
        if self.entries.contains_key(id) {
            self.current = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Resolve an engine session id to the local session id
    pub fn resolve_engine_id(&self, engine_id: &str) -> Option<&str> {
        self.engine_index.get(engine_id).map(String::as_str)
    }

    /// One-time binding of an engine id to a local session. Re-binding an
    /// already-bound session or engine id is a no-op.
    pub fn bind_engine_session_id(&mut self, local_id: &str, engine_id: &str) -> bool {
        if self.engine_index.contains_key(engine_id) {
            return false;
        }
        let Some(entry) = self.entries.get_mut(local_id) else {
            return false;
        };
        if entry.session.engine_session_id.is_some() {
            return false;
        }
        entry.session.engine_session_id = Some(engine_id.to_string());
        self.engine_index
            .insert(engine_id.to_string(), local_id.to_string());
        self.pending_bind.retain(|id| id != local_id);
        debug!(
            component = "registry",
            event = "session.bound",
            session_id = %local_id,
            engine_session_id = %engine_id,
            "Bound engine session id"
        );
        true
    }

    /// Bind the oldest session awaiting an engine id, returning the local
    /// id and any events buffered for that engine id, in arrival order.
    pub fn bind_next(&mut self, engine_id: &str) -> Option<(String, Vec<EngineEventKind>)> {
        while let Some(local_id) = self.pending_bind.pop_front() {
            // Entries can disappear before binding (user deleted the session)
            if !self.entries.contains_key(&local_id) {
                continue;
            }
            self.pending_bind.push_front(local_id.clone());
            if !self.bind_engine_session_id(&local_id, engine_id) {
                self.pending_bind.pop_front();
                continue;
            }
            let buffered = self
                .unbound
                .remove(engine_id)
                .map(|queue| queue.into_iter().collect())
                .unwrap_or_default();
            return Some((local_id, buffered));
        }
        None
    }

    /// Move an engine id binding onto a new session object (resume). The
    /// previous owner keeps its log but loses the live binding.
    pub fn rebind_engine_id(&mut self, engine_id: &str, new_local_id: &str) -> bool {
        let Some(old_local) = self.engine_index.get(engine_id).cloned() else {
            return false;
        };
        if !self.entries.contains_key(new_local_id) {
            return false;
        }
        if let Some(old_entry) = self.entries.get_mut(&old_local) {
            old_entry.session.engine_session_id = None;
        }
        if let Some(entry) = self.entries.get_mut(new_local_id) {
            entry.session.engine_session_id = Some(engine_id.to_string());
        }
        self.engine_index
            .insert(engine_id.to_string(), new_local_id.to_string());
        self.pending_bind.retain(|id| id != new_local_id);
        true
    }

    /// Buffer an event for an engine id with no binding yet
    pub fn buffer_unbound(&mut self, engine_id: &str, event: EngineEventKind) {
        if self.unbound.len() >= UNBOUND_SESSION_CAP && !self.unbound.contains_key(engine_id) {
            warn!(
                component = "registry",
                event = "session.unbound_dropped",
                engine_session_id = %engine_id,
                "Too many unbound engine sessions, dropping event"
            );
            return;
        }
        let queue = self.unbound.entry(engine_id.to_string()).or_default();
        if queue.len() >= UNBOUND_BUFFER_CAP {
            warn!(
                component = "registry",
                event = "session.unbound_overflow",
                engine_session_id = %engine_id,
                "Unbound event buffer full, dropping oldest"
            );
            queue.pop_front();
        }
        queue.push_back(event);
    }

    /// Drain any events buffered for an engine id (used after an explicit
    /// rebind)
    pub fn take_unbound(&mut self, engine_id: &str) -> Vec<EngineEventKind> {
        self.unbound
            .remove(engine_id)
            .map(|queue| queue.into_iter().collect())
            .unwrap_or_default()
    }

    /// All sessions currently `running`, foreground included
    pub fn running_sessions(&self) -> Vec<SessionSummary> {
        let mut running: Vec<SessionSummary> = self
            .entries
            .values()
            .filter(|e| e.session.is_running())
            .map(|e| e.session.summary())
            .collect();
        running.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        running
    }

    /// Drop a session. Clears the foreground pointer and engine binding.
    pub fn remove(&mut self, id: &str) -> Option<SessionEntry> {
        let entry = self.entries.remove(id)?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        if let Some(engine_id) = &entry.session.engine_session_id {
            self.engine_index.remove(engine_id);
        }
        self.pending_bind.retain(|pending| pending != id);
        Some(entry)
    }
}
