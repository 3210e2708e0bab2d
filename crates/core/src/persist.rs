//! Persistence collaborator boundary
//!
//! The core never touches disk. Terminal-session snapshots and deletions
//! go out over this channel to an external record store; the store answers
//! restore requests over a oneshot. A slow or absent store must not wedge
//! the orchestrator, so sends are best-effort.

use agentdeck_protocol::{ConversationMessage, SessionStatus, SessionSummary};
use tokio::sync::{mpsc, oneshot};

const PERSIST_CHANNEL_CAPACITY: usize = 256;

/// Commands handed to the external record store
#[derive(Debug)]
pub enum PersistCommand {
    /// A session was created
    SessionCreate { session: SessionSummary },

    /// A session reached a terminal status; snapshot its full log
    SessionSnapshot {
        session_id: String,
        final_status: SessionStatus,
        messages: Vec<ConversationMessage>,
    },

    /// The user deleted a session
    SessionDelete { session_id: String },

    /// Read path used when switching focus to a past session
    Restore {
        session_id: String,
        reply: oneshot::Sender<Option<Vec<ConversationMessage>>>,
    },
}

/// Create the channel connecting the core to the store collaborator
pub fn persistence_channel() -> (mpsc::Sender<PersistCommand>, mpsc::Receiver<PersistCommand>) {
    mpsc::channel(PERSIST_CHANNEL_CAPACITY)
}
