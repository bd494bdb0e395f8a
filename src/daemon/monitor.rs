//! Monitor session manager.
//!
//! Each connected monitor gets: a replay of every still-pending approval,
//! then the live event stream. Inbound lines are resolution messages
//! forwarded to the coordinator. A bad message earns an `error` event on
//! that connection only — the session never dies over it, and a monitor
//! disconnecting never resolves anything.

use crate::approval::types::ResolveError;
use crate::daemon::protocol::{MonitorCommand, MonitorEvent};
use crate::daemon::server::DaemonState;
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};

/// Accept monitor connections forever.
pub async fn serve(listener: UnixListener, state: Arc<DaemonState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_session(stream, state).await {
                        tracing::debug!("monitor session ended: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::error!("failed to accept monitor connection: {}", e);
            }
        }
    }
}

async fn handle_session(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();

    // Subscribe before taking the snapshot: an approval opened in the gap
    // shows up in the live queue as well, so nothing can be missed — a
    // duplicate `approval_requested` is harmless, a lost one is not.
    let mut events = state.bus.subscribe();
    let snapshot = state.coordinator.pending_snapshot();
    tracing::info!(pending = snapshot.len(), "monitor attached");
    for event in &snapshot {
        write_event(&mut writer, event).await?;
    }

    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => write_event(&mut writer, &event).await?,
                // The bus detached us (critical-event overflow). Close the
                // session; the client reconnects and replays the snapshot.
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    if let Some(error) = apply_resolution(line.trim(), &state) {
                        write_event(&mut writer, &MonitorEvent::Error { message: error })
                            .await?;
                    }
                }
                // Disconnect. Pending approvals keep running against their
                // timers — fail-closed does the rest.
                None => break,
            },
        }
    }

    Ok(())
}

/// Parse and forward one resolution message. Returns an error message to
/// report back to this monitor, or None when there is nothing to say.
fn apply_resolution(line: &str, state: &Arc<DaemonState>) -> Option<String> {
    let command: MonitorCommand = match serde_json::from_str(line) {
        Ok(command) => command,
        Err(e) => return Some(format!("invalid resolution message: {}", e)),
    };

    match state.coordinator.resolve(
        &command.request_id,
        command.decision,
        command.reason,
        Some("monitor".to_string()),
    ) {
        Ok(()) => None,
        // Lost a race against the timer or another monitor — the
        // coordinator already discarded and recorded it.
        Err(ResolveError::AlreadyResolved(_)) => None,
        Err(err @ ResolveError::Unknown(_)) => Some(err.to_string()),
    }
}

async fn write_event(writer: &mut OwnedWriteHalf, event: &MonitorEvent) -> Result<()> {
    let json = serde_json::to_string(event)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
