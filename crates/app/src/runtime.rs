//! Process wiring
//!
//! Launches the engine subprocess, attaches the NDJSON client to its stdio,
//! starts the orchestrator, and bridges the front end over this process's
//! own stdio: one `ClientRequest` per stdin line, one `UiEvent` per stdout
//! line. Logs go to a file, never stdout.

use std::collections::HashMap;
use std::process::Stdio;

use agentdeck_core::orchestrator::DeckHandle;
use agentdeck_core::persist::{persistence_channel, PersistCommand};
use agentdeck_engine::EngineClient;
use agentdeck_protocol::{ClientRequest, ConversationMessage, UiEvent};
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::Args;

const OUT_CHANNEL_CAPACITY: usize = 256;

pub async fn run(args: Args) -> anyhow::Result<()> {
    let (mut child, mut client) = spawn_engine(&args.engine_bin)?;
    let engine_tx = client.commands();
    let event_rx = client
        .take_events()
        .context("engine event stream already taken")?;

    let (persist_tx, persist_rx) = persistence_channel();
    tokio::spawn(record_store(persist_rx));

    let deck = DeckHandle::spawn(engine_tx, event_rx, persist_tx, None);

    let (out_tx, out_rx) = mpsc::channel::<UiEvent>(OUT_CHANNEL_CAPACITY);
    tokio::spawn(write_stdout(out_rx));
    tokio::spawn(forward_notifications(deck.subscribe(), out_tx.clone()));

    let default_cwd = match args.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| ".".into()),
    };

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            warn!(
                component = "runtime",
                event = "engine.exited",
                status = %status,
                "Engine process exited"
            );
        }
        result = read_stdin(deck, out_tx, default_cwd) => {
            result?;
            info!(
                component = "runtime",
                event = "stdin.closed",
                "Front-end stream closed, shutting down"
            );
        }
    }
    Ok(())
}

/// Launch the engine and attach the line-protocol client to its stdio
fn spawn_engine(engine_bin: &str) -> anyhow::Result<(Child, EngineClient)> {
    let mut child = Command::new(engine_bin)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("launching engine `{engine_bin}`"))?;

    let stdin = child.stdin.take().context("engine stdin unavailable")?;
    let stdout = child.stdout.take().context("engine stdout unavailable")?;
    info!(
        component = "runtime",
        event = "engine.launched",
        engine_bin = %engine_bin,
        pid = child.id().unwrap_or_default(),
        "Engine process started"
    );
    Ok((child, EngineClient::attach(stdout, stdin)))
}

/// One `ClientRequest` per line until EOF
async fn read_stdin(
    deck: DeckHandle,
    out_tx: mpsc::Sender<UiEvent>,
    default_cwd: String,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: ClientRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(
                    component = "runtime",
                    event = "client.request.unparseable",
                    error = %err,
                    raw = %line,
                    "Skipping malformed request"
                );
                continue;
            }
        };
        dispatch(&deck, &out_tx, &default_cwd, request).await;
    }
    Ok(())
}

async fn dispatch(
    deck: &DeckHandle,
    out_tx: &mpsc::Sender<UiEvent>,
    default_cwd: &str,
    request: ClientRequest,
) {
    match request {
        ClientRequest::SubmitIntent {
            intent,
            cwd,
            remote,
        } => {
            let cwd = if cwd.is_empty() {
                default_cwd.to_string()
            } else {
                cwd
            };
            let _ = deck.submit_intent(intent, cwd, remote).await;
        }
        ClientRequest::Interrupt { session_id } => deck.interrupt(session_id).await,
        ClientRequest::AnswerPrompt {
            request_id,
            answers,
        } => deck.answer_prompt(request_id, answers).await,
        ClientRequest::RejectPrompt { request_id } => deck.reject_prompt(request_id).await,
        ClientRequest::SwitchSession { session_id } => deck.switch_session(session_id).await,
        ClientRequest::DeleteSession { session_id } => deck.delete_session(session_id).await,
        ClientRequest::ListRunning => {
            let sessions = deck.running_sessions().await;
            let _ = out_tx.send(UiEvent::RunningSessions { sessions }).await;
        }
    }
}

/// Pipe orchestrator notifications into the stdout writer
async fn forward_notifications(
    mut ui_rx: broadcast::Receiver<UiEvent>,
    out_tx: mpsc::Sender<UiEvent>,
) {
    loop {
        match ui_rx.recv().await {
            Ok(event) => {
                if out_tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(
                    component = "runtime",
                    event = "ui.lagged",
                    skipped = skipped,
                    "Front end fell behind, notifications dropped"
                );
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// One `UiEvent` per stdout line
async fn write_stdout(mut out_rx: mpsc::Receiver<UiEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = out_rx.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(err) => {
                warn!(
                    component = "runtime",
                    event = "ui.encode_failed",
                    error = %err,
                    "Dropping unencodable notification"
                );
                continue;
            }
        };
        if stdout.write_all(line.as_bytes()).await.is_err()
            || stdout.write_all(b"\n").await.is_err()
            || stdout.flush().await.is_err()
        {
            warn!(
                component = "runtime",
                event = "stdout.write_failed",
                "Front-end stream closed, stopping writer"
            );
            return;
        }
    }
}

/// In-memory record store. Holds terminal-session snapshots for the life of
/// the process and answers restore requests from them; durable storage
/// lives outside this process.
async fn record_store(mut persist_rx: mpsc::Receiver<PersistCommand>) {
    let mut snapshots: HashMap<String, Vec<ConversationMessage>> = HashMap::new();
    while let Some(command) = persist_rx.recv().await {
        match command {
            PersistCommand::SessionCreate { session } => {
                debug!(
                    component = "record_store",
                    event = "store.session_created",
                    session_id = %session.id,
                    "Session recorded"
                );
            }
            PersistCommand::SessionSnapshot {
                session_id,
                final_status,
                messages,
            } => {
                debug!(
                    component = "record_store",
                    event = "store.snapshot",
                    session_id = %session_id,
                    final_status = ?final_status,
                    message_count = messages.len(),
                    "Snapshot stored"
                );
                snapshots.insert(session_id, messages);
            }
            PersistCommand::SessionDelete { session_id } => {
                snapshots.remove(&session_id);
            }
            PersistCommand::Restore { session_id, reply } => {
                let _ = reply.send(snapshots.get(&session_id).cloned());
            }
        }
    }
}
