//! AgentDeck Core
//!
//! The session event and prompt orchestration core: tracks every session's
//! lifecycle, reconciles the engine's event stream into ordered per-session
//! message logs, serializes permission/question prompts into a single-flight
//! display queue (local or remote-relayed), and implements interrupt
//! semantics that keep local state consistent regardless of in-flight
//! events.
//!
//! All shared mutable state is owned by a single actor task
//! ([`orchestrator::DeckHandle::spawn`]); the engine event pump, user
//! actions, and relay answers all funnel through its command channel.

pub mod command;
pub mod interrupt;
pub mod messages;
pub mod orchestrator;
pub mod persist;
pub mod prompts;
pub mod registry;
pub mod relay;
pub mod router;
pub mod session;

pub use command::DeckCommand;
pub use orchestrator::{DeckHandle, DeckSnapshot};
pub use persist::PersistCommand;
pub use relay::RelayCommand;
