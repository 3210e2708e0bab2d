//! AgentDeck
//!
//! Local companion process for an autonomous coding engine: launches the
//! engine, orchestrates its sessions and approval prompts, and exposes the
//! whole thing to a front end as an NDJSON request/notification stream over
//! stdio.

mod logging;
mod runtime;

use clap::Parser;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "agentdeck", version, about = "Session orchestrator for an autonomous coding engine")]
pub struct Args {
    /// Engine executable to launch
    #[arg(long, env = "AGENTDECK_ENGINE_BIN", default_value = "agent-engine")]
    pub engine_bin: String,

    /// Default working directory for new sessions (defaults to the current
    /// directory)
    #[arg(long, env = "AGENTDECK_CWD")]
    pub cwd: Option<String>,

    /// Log file format: "json" or "pretty"
    #[arg(long, env = "AGENTDECK_LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logging = logging::init_logging(&args.log_format)?;

    if let Err(err) = runtime::run(args).await {
        error!(
            component = "main",
            event = "runtime.failed",
            error = %err,
            "Runtime error"
        );
        return Err(err);
    }
    Ok(())
}
