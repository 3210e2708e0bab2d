//! Stream-attached NDJSON engine client
//!
//! Speaks the engine's line protocol over any pair of async streams:
//! a read pump decodes events onto a channel, a write pump drains the
//! command channel into the engine's stdin. A malformed line is logged
//! and skipped; it never tears down the stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{EngineCommand, EngineEvent};

const CHANNEL_CAPACITY: usize = 256;

/// Client half of the engine connection
pub struct EngineClient {
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: Option<mpsc::Receiver<EngineEvent>>,
}

impl EngineClient {
    /// Attach to an already-running engine's stdio streams and spawn the
    /// read/write pumps.
    pub fn attach<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel::<EngineCommand>(CHANNEL_CAPACITY);

        tokio::spawn(read_pump(reader, event_tx));
        tokio::spawn(write_pump(writer, command_rx));

        Self {
            command_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event stream receiver (available exactly once)
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.event_rx.take()
    }

    /// Get a clone of the command sender
    pub fn commands(&self) -> mpsc::Sender<EngineCommand> {
        self.command_tx.clone()
    }
}

async fn read_pump<R>(reader: R, event_tx: mpsc::Sender<EngineEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match EngineEvent::from_json_line(line) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            debug!(
                                component = "engine_client",
                                "Event receiver dropped, stopping read pump"
                            );
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(
                            component = "engine_client",
                            event = "engine.event.unparseable",
                            error = %e,
                            raw = %line,
                            "Skipping malformed engine event"
                        );
                    }
                }
            }
            Ok(None) => {
                info!(
                    component = "engine_client",
                    event = "engine.stream.eof",
                    "Engine event stream closed"
                );
                return;
            }
            Err(e) => {
                warn!(
                    component = "engine_client",
                    event = "engine.stream.error",
                    error = %e,
                    "Engine event stream read failed"
                );
                return;
            }
        }
    }
}

async fn write_pump<W>(mut writer: W, mut command_rx: mpsc::Receiver<EngineCommand>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(cmd) = command_rx.recv().await {
        let line = match cmd.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    component = "engine_client",
                    event = "engine.command.encode_failed",
                    error = %e,
                    "Dropping unencodable engine command"
                );
                continue;
            }
        };
        if writer.write_all(line.as_bytes()).await.is_err()
            || writer.write_all(b"\n").await.is_err()
            || writer.flush().await.is_err()
        {
            warn!(
                component = "engine_client",
                event = "engine.stream.write_failed",
                "Engine stdin closed, stopping write pump"
            );
            return;
        }
    }
}
