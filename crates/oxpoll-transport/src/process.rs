//! Child-process plugin runner.
//!
//! Requests are written to the plugin's stdin and replies read from its
//! stdout, one JSON object per line. The plugin's stderr is forwarded to
//! the host's logs. A failure to spawn the plugin is the only fatal
//! transport condition; everything after startup is best-effort.

use crate::{receiver_from_raw, sender_from_raw, TransportError, TransportPair};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a running plugin process and its pump tasks.
pub struct PluginProcess {
    child: Child,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    stderr_pump: JoinHandle<()>,
}

impl PluginProcess {
    /// Spawns the plugin and returns the engine-side transport pair for it.
    ///
    /// `capacity` bounds both directions; a full inbound buffer drops the
    /// oldest-arriving excess replies rather than stalling the reader.
    pub fn spawn(
        command: &str,
        args: &[String],
        capacity: usize,
    ) -> Result<(TransportPair, PluginProcess), TransportError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TransportError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or(TransportError::MissingStdio("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingStdio("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::MissingStdio("stderr"))?;

        let (out_tx, out_rx) = mpsc::channel::<String>(capacity);
        let (in_tx, in_rx) = mpsc::channel::<String>(capacity);

        let writer = tokio::spawn(pump_outbound(out_rx, stdin));
        let reader = tokio::spawn(pump_inbound(stdout, in_tx));
        let stderr_pump = tokio::spawn(pump_stderr(stderr));

        tracing::info!(command, "Plugin process started");

        Ok((
            TransportPair {
                tx: sender_from_raw(out_tx),
                rx: receiver_from_raw(in_rx),
            },
            PluginProcess {
                child,
                writer,
                reader,
                stderr_pump,
            },
        ))
    }

    /// Kills the plugin and stops the pump tasks.
    pub async fn shutdown(mut self) {
        self.writer.abort();
        self.reader.abort();
        self.stderr_pump.abort();
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "Failed to kill plugin process");
        }
    }
}

async fn pump_outbound(mut out_rx: mpsc::Receiver<String>, mut stdin: tokio::process::ChildStdin) {
    while let Some(message) = out_rx.recv().await {
        if let Err(e) = stdin.write_all(message.as_bytes()).await {
            tracing::error!(error = %e, "Failed to write request to plugin stdin");
            break;
        }
        if let Err(e) = stdin.write_all(b"\n").await {
            tracing::error!(error = %e, "Failed to write request to plugin stdin");
            break;
        }
        if let Err(e) = stdin.flush().await {
            tracing::error!(error = %e, "Failed to flush plugin stdin");
            break;
        }
    }
    tracing::debug!("Plugin stdin pump stopped");
}

async fn pump_inbound(stdout: tokio::process::ChildStdout, in_tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                // Best-effort: a saturated inbound buffer drops the reply.
                if let Err(e) = in_tx.try_send(line) {
                    match e {
                        mpsc::error::TrySendError::Full(_) => {
                            tracing::warn!("Inbound buffer full, plugin reply dropped");
                        }
                        mpsc::error::TrySendError::Closed(_) => break,
                    }
                }
            }
            Ok(None) => {
                tracing::warn!("Plugin stdout closed");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read from plugin stdout");
                break;
            }
        }
    }
    tracing::debug!("Plugin stdout pump stopped");
}

async fn pump_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(plugin = %line, "plugin stderr");
    }
}
