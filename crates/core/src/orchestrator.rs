//! The orchestrator actor
//!
//! Owns every piece of shared mutable state — the session registry and the
//! prompt queue — behind a single command channel, so engine events, user
//! actions, and relay answers are serialized without locks. Reads go
//! through an [`arc_swap`] snapshot the actor refreshes after every
//! command, and change notifications fan out over a broadcast channel.

use std::sync::Arc;

use agentdeck_engine::{EngineCommand, EngineEvent, EngineEventKind, PermissionDecision};
use agentdeck_protocol::{
    ConversationMessage, MessageChanges, PromptKind, PromptRequest, PromptResolution,
    SessionStatus, SessionSummary, StateChanges, UiEvent,
};
use arc_swap::ArcSwap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::command::DeckCommand;
use crate::interrupt::apply_interrupt;
use crate::messages::MessageLog;
use crate::persist::PersistCommand;
use crate::prompts::PromptQueue;
use crate::registry::SessionRegistry;
use crate::relay::RelayCommand;
use crate::router::{route_event, Effect};

const COMMAND_CHANNEL_CAPACITY: usize = 256;
const UI_CHANNEL_CAPACITY: usize = 1024;

/// Point-in-time view of the orchestrator for UI reads. Rebuilt after every
/// command; readers never block the actor.
#[derive(Clone, Default)]
pub struct DeckSnapshot {
    pub current: Option<SessionSummary>,
    pub messages: Vec<ConversationMessage>,
    pub thinking: Option<String>,
    pub active_prompt: Option<PromptRequest>,
    pub running: Vec<SessionSummary>,
}

/// Cloneable handle to the orchestrator actor
#[derive(Clone)]
pub struct DeckHandle {
    command_tx: mpsc::Sender<DeckCommand>,
    snapshot: Arc<ArcSwap<DeckSnapshot>>,
    ui_tx: broadcast::Sender<UiEvent>,
}

impl DeckHandle {
    /// Spawn the actor and its engine event pump. `relay_tx` is `None` when
    /// no remote bridge is configured; remote-origin sessions then behave
    /// like local ones.
    pub fn spawn(
        engine_tx: mpsc::Sender<EngineCommand>,
        mut event_rx: mpsc::Receiver<EngineEvent>,
        persist_tx: mpsc::Sender<PersistCommand>,
        relay_tx: Option<mpsc::Sender<RelayCommand>>,
    ) -> DeckHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (ui_tx, _) = broadcast::channel(UI_CHANNEL_CAPACITY);
        let snapshot = Arc::new(ArcSwap::from_pointee(DeckSnapshot::default()));

        let pump_tx = command_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if pump_tx.send(DeckCommand::EngineEvent { event }).await.is_err() {
                    break;
                }
            }
            debug!(
                component = "orchestrator",
                event = "engine.stream_closed",
                "Engine event stream ended"
            );
        });

        let actor = Orchestrator {
            registry: SessionRegistry::new(),
            prompts: PromptQueue::new(),
            engine_tx,
            persist_tx,
            relay_tx,
            ui_tx: ui_tx.clone(),
            snapshot: snapshot.clone(),
            command_tx: command_tx.clone(),
        };
        tokio::spawn(actor.run(command_rx));

        DeckHandle {
            command_tx,
            snapshot,
            ui_tx,
        }
    }

    /// Current point-in-time view
    pub fn snapshot(&self) -> Arc<DeckSnapshot> {
        self.snapshot.load_full()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui_tx.subscribe()
    }

    /// Submit a new intent. Returns the created session, or `None` when the
    /// actor has shut down.
    pub async fn submit_intent(
        &self,
        intent: impl Into<String>,
        cwd: impl Into<String>,
        remote: bool,
    ) -> Option<SessionSummary> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(DeckCommand::SubmitIntent {
                intent: intent.into(),
                cwd: cwd.into(),
                remote,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn interrupt(&self, session_id: impl Into<String>) {
        let _ = self
            .command_tx
            .send(DeckCommand::Interrupt {
                session_id: session_id.into(),
            })
            .await;
    }

    /// Continue a finished session's engine thread with a follow-up intent
    pub async fn resume_session(
        &self,
        session_id: impl Into<String>,
        intent: impl Into<String>,
    ) -> Option<SessionSummary> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(DeckCommand::ResumeSession {
                session_id: session_id.into(),
                intent: intent.into(),
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn answer_prompt(&self, request_id: impl Into<String>, answers: Vec<String>) {
        let _ = self
            .command_tx
            .send(DeckCommand::AnswerPrompt {
                request_id: request_id.into(),
                answers,
            })
            .await;
    }

    pub async fn reject_prompt(&self, request_id: impl Into<String>) {
        let _ = self
            .command_tx
            .send(DeckCommand::RejectPrompt {
                request_id: request_id.into(),
            })
            .await;
    }

    pub async fn switch_session(&self, session_id: impl Into<String>) {
        let _ = self
            .command_tx
            .send(DeckCommand::SwitchSession {
                session_id: session_id.into(),
            })
            .await;
    }

    pub async fn delete_session(&self, session_id: impl Into<String>) {
        let _ = self
            .command_tx
            .send(DeckCommand::DeleteSession {
                session_id: session_id.into(),
            })
            .await;
    }

    pub async fn running_sessions(&self) -> Vec<SessionSummary> {
        let (reply, rx) = oneshot::channel();
        if self
            .command_tx
            .send(DeckCommand::RunningSessions { reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn active_prompt(&self) -> Option<PromptRequest> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(DeckCommand::ActivePrompt { reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }
}

struct Orchestrator {
    registry: SessionRegistry,
    prompts: PromptQueue,
    engine_tx: mpsc::Sender<EngineCommand>,
    persist_tx: mpsc::Sender<PersistCommand>,
    relay_tx: Option<mpsc::Sender<RelayCommand>>,
    ui_tx: broadcast::Sender<UiEvent>,
    snapshot: Arc<ArcSwap<DeckSnapshot>>,
    /// Clone handed to spawned feedback tasks (relay round-trips, restores)
    command_tx: mpsc::Sender<DeckCommand>,
}

impl Orchestrator {
    async fn run(mut self, mut command_rx: mpsc::Receiver<DeckCommand>) {
        info!(
            component = "orchestrator",
            event = "actor.started",
            "Orchestrator running"
        );
        while let Some(command) = command_rx.recv().await {
            self.handle(command).await;
            self.refresh_snapshot();
        }
        info!(
            component = "orchestrator",
            event = "actor.stopped",
            "Orchestrator stopped"
        );
    }

    async fn handle(&mut self, command: DeckCommand) {
        match command {
            DeckCommand::SubmitIntent {
                intent,
                cwd,
                remote,
                reply,
            } => self.handle_submit(intent, cwd, remote, reply).await,
            DeckCommand::Interrupt { session_id } => self.handle_interrupt(&session_id).await,
            DeckCommand::ResumeSession {
                session_id,
                intent,
                reply,
            } => self.handle_resume(&session_id, intent, reply).await,
            DeckCommand::AnswerPrompt {
                request_id,
                answers,
            } => self.handle_resolution(&request_id, PromptResolution::Answered { answers }),
            DeckCommand::RejectPrompt { request_id } => {
                self.handle_resolution(&request_id, PromptResolution::Rejected)
            }
            DeckCommand::SwitchSession { session_id } => self.handle_switch(&session_id),
            DeckCommand::DeleteSession { session_id } => self.handle_delete(&session_id),
            DeckCommand::EngineEvent { event } => self.handle_engine_event(event).await,
            DeckCommand::RestoreLoaded {
                session_id,
                messages,
            } => self.handle_restore_loaded(&session_id, messages),
            DeckCommand::RunningSessions { reply } => {
                let _ = reply.send(self.registry.running_sessions());
            }
            DeckCommand::ActivePrompt { reply } => {
                let _ = reply.send(self.prompts.active().cloned());
            }
        }
    }

    // -- User actions --

    async fn handle_submit(
        &mut self,
        intent: String,
        cwd: String,
        remote: bool,
        reply: oneshot::Sender<SessionSummary>,
    ) {
        let session_id = self.registry.create_session(intent.clone(), cwd.clone(), remote);
        info!(
            component = "orchestrator",
            event = "session.created",
            session_id = %session_id,
            remote = remote,
            "New session"
        );

        let Some(entry) = self.registry.entry_mut(&session_id) else {
            return;
        };
        let message = entry.log.push_user(&intent);
        let summary = entry.session.summary();

        self.broadcast(UiEvent::SessionCreated {
            session: summary.clone(),
        });
        self.broadcast(UiEvent::MessageAppended {
            session_id: session_id.clone(),
            message,
        });
        self.persist(PersistCommand::SessionCreate {
            session: summary.clone(),
        });

        if self
            .engine_tx
            .send(EngineCommand::Submit { intent, cwd })
            .await
            .is_err()
        {
            warn!(
                component = "orchestrator",
                event = "engine.send_failed",
                session_id = %session_id,
                "Engine command channel closed"
            );
        }
        let _ = reply.send(summary);
    }

    async fn handle_interrupt(&mut self, session_id: &str) {
        let Some(entry) = self.registry.entry(session_id) else {
            debug!(
                component = "orchestrator",
                event = "interrupt.unknown_session",
                session_id = %session_id,
                "Interrupt for unknown session"
            );
            return;
        };
        if !entry.session.is_running() {
            return;
        }

        // Upstream cancellation first, fire-and-forget; local rollback does
        // not wait for it. An unbound session has no engine id to cancel
        // yet; the cancellation is delivered when the binding arrives.
        if let Some(engine_session_id) = entry.session.engine_session_id.clone() {
            let _ = self
                .engine_tx
                .send(EngineCommand::Interrupt { engine_session_id })
                .await;
        }

        info!(
            component = "orchestrator",
            event = "session.interrupted",
            session_id = %session_id,
            "Interrupting session"
        );

        // A stopped session will never answer its prompts. Rejected before
        // the rollback so the terminal snapshot records their outcome.
        for request_id in self.prompts.pending_for_session(session_id) {
            self.handle_resolution(&request_id, PromptResolution::Rejected);
        }

        let effects = match self.registry.entry_mut(session_id) {
            Some(entry) => apply_interrupt(entry),
            None => return,
        };
        self.run_effects(session_id, effects);
    }

    async fn handle_resume(
        &mut self,
        session_id: &str,
        intent: String,
        reply: oneshot::Sender<Option<SessionSummary>>,
    ) {
        let source = match self.registry.entry(session_id) {
            Some(entry) if !entry.session.is_running() => &entry.session,
            _ => {
                let _ = reply.send(None);
                return;
            }
        };
        let Some(engine_session_id) = source.engine_session_id.clone() else {
            let _ = reply.send(None);
            return;
        };
        let cwd = source.cwd.clone();
        let remote = source.remote_origin;

        let new_id = self.registry.create_session(intent.clone(), cwd, remote);
        self.registry.rebind_engine_id(&engine_session_id, &new_id);
        // Anything the engine trailed for that id belongs to the new session
        for kind in self.registry.take_unbound(&engine_session_id) {
            self.route(&new_id, kind);
        }

        let Some(entry) = self.registry.entry_mut(&new_id) else {
            let _ = reply.send(None);
            return;
        };
        let message = entry.log.push_user(&intent);
        let summary = entry.session.summary();

        info!(
            component = "orchestrator",
            event = "session.resumed",
            session_id = %new_id,
            from_session_id = %session_id,
            engine_session_id = %engine_session_id,
            "Resuming engine thread"
        );
        self.broadcast(UiEvent::SessionCreated {
            session: summary.clone(),
        });
        self.broadcast(UiEvent::MessageAppended {
            session_id: new_id.clone(),
            message,
        });
        self.persist(PersistCommand::SessionCreate {
            session: summary.clone(),
        });

        let _ = self
            .engine_tx
            .send(EngineCommand::Resume {
                engine_session_id,
                intent,
            })
            .await;
        let _ = reply.send(Some(summary));
    }

    fn handle_switch(&mut self, session_id: &str) {
        if !self.registry.set_current(session_id) {
            debug!(
                component = "orchestrator",
                event = "switch.unknown_session",
                session_id = %session_id,
                "Switch to unknown session"
            );
            return;
        }
        let Some(entry) = self.registry.entry(session_id) else {
            return;
        };

        // Terminal sessions whose log was never loaded this run come back
        // from the store; everything else replays from memory.
        if !entry.session.is_running() && entry.log.is_empty() {
            let sid = session_id.to_string();
            let (reply, rx) = oneshot::channel();
            self.persist(PersistCommand::Restore {
                session_id: sid.clone(),
                reply,
            });
            let command_tx = self.command_tx.clone();
            tokio::spawn(async move {
                let messages = rx.await.ok().flatten().unwrap_or_default();
                let _ = command_tx
                    .send(DeckCommand::RestoreLoaded {
                        session_id: sid,
                        messages,
                    })
                    .await;
            });
        } else {
            self.broadcast(UiEvent::LogReplaced {
                session_id: session_id.to_string(),
                messages: entry.log.to_vec(),
            });
        }
    }

    fn handle_restore_loaded(&mut self, session_id: &str, messages: Vec<ConversationMessage>) {
        let Some(entry) = self.registry.entry_mut(session_id) else {
            return;
        };
        // The session may have produced messages since the restore started
        if !entry.log.is_empty() {
            return;
        }
        entry.log = MessageLog::from_messages(messages);
        let messages = entry.log.to_vec();
        self.broadcast(UiEvent::LogReplaced {
            session_id: session_id.to_string(),
            messages,
        });
    }

    fn handle_delete(&mut self, session_id: &str) {
        if self.registry.remove(session_id).is_none() {
            return;
        }
        info!(
            component = "orchestrator",
            event = "session.deleted",
            session_id = %session_id,
            "Session deleted"
        );
        for request_id in self.prompts.pending_for_session(session_id) {
            self.handle_resolution(&request_id, PromptResolution::Rejected);
        }
        self.persist(PersistCommand::SessionDelete {
            session_id: session_id.to_string(),
        });
        self.broadcast(UiEvent::SessionDeleted {
            session_id: session_id.to_string(),
        });
    }

    // -- Prompt resolution (user answer, relay answer, or internal reject) --

    fn handle_resolution(&mut self, request_id: &str, resolution: PromptResolution) {
        let Some(resolved) = self.prompts.resolve(request_id, resolution) else {
            return; // stale or duplicate, by contract a no-op
        };

        let response_text = match &resolved.resolution {
            PromptResolution::Answered { answers } => answers.join(", "),
            PromptResolution::Rejected => "Rejected".to_string(),
        };
        let session_id = resolved.request.session_id.clone();
        if let Some(entry) = self.registry.entry_mut(&session_id) {
            if let Some(message) = entry.log.record_resolution(request_id, &response_text) {
                self.broadcast(UiEvent::MessageUpdated {
                    session_id,
                    message_id: message.id.clone(),
                    changes: MessageChanges {
                        status: Some(message.status),
                        tool_output: message.tool_output,
                        ..Default::default()
                    },
                });
            }
        }

        self.broadcast(UiEvent::PromptResolved {
            request_id: request_id.to_string(),
        });
        if let Some(next) = resolved.next_displayed {
            self.broadcast(UiEvent::PromptDisplayed { request: next });
        }
    }

    // -- Engine stream --

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        let engine_id = event.session_id;
        if let Some(local_id) = self.registry.resolve_engine_id(&engine_id) {
            let local_id = local_id.to_string();
            self.route(&local_id, event.kind);
            return;
        }

        // First event for an unbound engine id claims the oldest submitted
        // session still awaiting one.
        if let Some((local_id, buffered)) = self.registry.bind_next(&engine_id) {
            // An interrupt issued before the bind had no engine id to
            // cancel; deliver it now.
            let interrupted = self
                .registry
                .entry(&local_id)
                .is_some_and(|e| e.session.status == SessionStatus::Interrupted);
            if interrupted {
                let _ = self
                    .engine_tx
                    .send(EngineCommand::Interrupt {
                        engine_session_id: engine_id.clone(),
                    })
                    .await;
            }
            self.broadcast(UiEvent::SessionDelta {
                session_id: local_id.clone(),
                changes: StateChanges {
                    engine_session_id: Some(engine_id.clone()),
                    ..Default::default()
                },
            });
            for kind in buffered {
                self.route(&local_id, kind);
            }
            self.route(&local_id, event.kind);
            return;
        }

        self.registry.buffer_unbound(&engine_id, event.kind);
    }

    fn route(&mut self, session_id: &str, kind: EngineEventKind) {
        let effects = match self.registry.entry_mut(session_id) {
            Some(entry) => route_event(entry, kind),
            None => {
                debug!(
                    component = "orchestrator",
                    event = "route.unknown_session",
                    session_id = %session_id,
                    "Dropping event for unknown session"
                );
                return;
            }
        };
        self.run_effects(session_id, effects);
    }

    fn run_effects(&mut self, session_id: &str, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Persist(command) => self.persist(command),
                Effect::Emit(event) => self.broadcast(*event),
                Effect::ShowPrompt(request) => self.submit_prompt(session_id, *request),
            }
        }
    }

    fn submit_prompt(&mut self, session_id: &str, request: PromptRequest) {
        let remote = self.relay_tx.is_some()
            && self
                .registry
                .entry(session_id)
                .map(|e| e.session.remote_origin)
                .unwrap_or(false);

        let (resolution_rx, displayed) = self.prompts.submit(request.clone(), remote);

        // Forward the eventual resolution to the engine off the actor task
        let engine_tx = self.engine_tx.clone();
        let kind = request.kind;
        let request_id = request.id.clone();
        tokio::spawn(async move {
            let Ok(resolution) = resolution_rx.await else {
                return;
            };
            let command = match (kind, resolution) {
                (PromptKind::Permission, PromptResolution::Answered { answers }) => {
                    let label = answers.first().map(String::as_str).unwrap_or("");
                    EngineCommand::PermissionReply {
                        request_id,
                        decision: PermissionDecision::from_label(label),
                    }
                }
                (PromptKind::Permission, PromptResolution::Rejected) => {
                    EngineCommand::PermissionReply {
                        request_id,
                        decision: PermissionDecision::Reject,
                    }
                }
                (PromptKind::Question, PromptResolution::Answered { answers }) => {
                    EngineCommand::QuestionReply {
                        request_id,
                        answers,
                    }
                }
                (PromptKind::Question, PromptResolution::Rejected) => {
                    EngineCommand::QuestionReject { request_id }
                }
            };
            let _ = engine_tx.send(command).await;
        });

        if let Some(request) = displayed {
            self.broadcast(UiEvent::PromptDisplayed { request });
        }

        if remote {
            self.forward_to_relay(request);
        }
    }

    /// Round-trip a remote-origin prompt through the relay bridge; its
    /// answer re-enters through the normal resolution path.
    fn forward_to_relay(&self, request: PromptRequest) {
        let Some(relay_tx) = self.relay_tx.clone() else {
            return;
        };
        let command_tx = self.command_tx.clone();
        let request_id = request.id.clone();
        tokio::spawn(async move {
            let (reply, rx) = oneshot::channel();
            if relay_tx
                .send(RelayCommand::ForwardPrompt { request, reply })
                .await
                .is_err()
            {
                return;
            }
            let Ok(resolution) = rx.await else {
                return;
            };
            let command = match resolution {
                PromptResolution::Answered { answers } => DeckCommand::AnswerPrompt {
                    request_id,
                    answers,
                },
                PromptResolution::Rejected => DeckCommand::RejectPrompt { request_id },
            };
            let _ = command_tx.send(command).await;
        });
    }

    // -- Plumbing --

    fn persist(&self, command: PersistCommand) {
        if let Err(err) = self.persist_tx.try_send(command) {
            warn!(
                component = "orchestrator",
                event = "persist.send_failed",
                error = %err,
                "Dropping persistence command"
            );
        }
    }

    fn broadcast(&self, event: UiEvent) {
        // No subscribers is fine (headless start, tests)
        let _ = self.ui_tx.send(event);
    }

    fn refresh_snapshot(&self) {
        let current = self
            .registry
            .current_id()
            .and_then(|id| self.registry.entry(id));
        let snapshot = DeckSnapshot {
            current: current.map(|e| e.session.summary()),
            messages: current.map(|e| e.log.to_vec()).unwrap_or_default(),
            thinking: current.and_then(|e| e.log.thinking().map(str::to_string)),
            active_prompt: self.prompts.active().cloned(),
            running: self.registry.running_sessions(),
        };
        self.snapshot.store(Arc::new(snapshot));
    }
}
