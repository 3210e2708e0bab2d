//! Remote relay collaborator boundary
//!
//! When a session was initiated from a paired remote device, its prompts
//! are forwarded over this channel instead of the local display. The
//! bridge's answer comes back on the oneshot and flows through the same
//! resolution path as a local answer. No timeout is imposed here; a
//! silent bridge leaves the prompt pending without blocking anything else.

use agentdeck_protocol::{PromptRequest, PromptResolution};
use tokio::sync::{mpsc, oneshot};

const RELAY_CHANNEL_CAPACITY: usize = 32;

/// Commands handed to the remote relay bridge
#[derive(Debug)]
pub enum RelayCommand {
    ForwardPrompt {
        request: PromptRequest,
        reply: oneshot::Sender<PromptResolution>,
    },
}

/// Create the channel connecting the core to the relay collaborator
pub fn relay_channel() -> (mpsc::Sender<RelayCommand>, mpsc::Receiver<RelayCommand>) {
    mpsc::channel(RELAY_CHANNEL_CAPACITY)
}
