//! Request dispatcher — the front-end-facing half of the daemon.
//!
//! Accepts connections from shims and hooks, one JSON request per line:
//! 1. Evaluates the command against the current rule-set snapshot
//! 2. allow / deny: replies immediately, no state retained
//! 3. require_approval: submits to the coordinator and suspends this
//!    connection handler until the terminal state, without blocking any
//!    other connection
//! 4. Publishes and audit-logs every decision regardless of outcome

use crate::approval::types::SubmitError;
use crate::audit::LogEntry;
use crate::daemon::protocol::*;
use crate::daemon::server::DaemonState;
use crate::rules::types::RuleAction;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use uuid::Uuid;

/// Accept front-end connections forever. Bind failures propagate; a failed
/// accept is logged and the loop continues.
pub async fn serve(listener: UnixListener, state: Arc<DaemonState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        tracing::error!("front-end connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::error!("failed to accept front-end connection: {}", e);
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break; // connection closed
        }
        if line.trim().is_empty() {
            continue;
        }

        // A malformed line gets a per-message rejection; the connection
        // stays open and no state is created.
        let reply = match serde_json::from_str::<FrontendRequest>(line.trim()) {
            Ok(FrontendRequest::Decide(request)) => {
                let response = decide(request, &state).await;
                serde_json::to_string(&response)?
            }
            Ok(FrontendRequest::Status) => {
                let engine = state.store.engine();
                let report = StatusReport {
                    ruleset: engine.ruleset_name().to_string(),
                    rules_loaded: engine.rule_count(),
                    pending_approvals: state.coordinator.pending_count(),
                };
                serde_json::to_string(&report)?
            }
            Err(e) => serde_json::to_string(&ErrorReply {
                error: format!("invalid request: {}", e),
            })?,
        };

        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Decide one command, suspending on an approval round if the policy asks
/// for one.
async fn decide(request: DecisionRequest, state: &Arc<DaemonState>) -> DecisionResponse {
    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let command = request.command;

    let engine = state.store.engine();
    let start = std::time::Instant::now();
    let decision = engine.evaluate(&command);
    let eval_duration_us = start.elapsed().as_micros() as u64;

    tracing::debug!(
        id = %request_id,
        command = %command.command,
        decision = %decision.action,
        "evaluated"
    );

    let (response, approved_by) = match decision.action {
        RuleAction::Allow => (
            DecisionResponse::allow(&request_id, &decision.reason),
            None,
        ),
        RuleAction::Deny => (
            DecisionResponse::deny(&request_id, &decision.reason),
            None,
        ),
        RuleAction::RequireApproval => {
            let approval = state.coordinator.make_request(
                request_id.clone(),
                command.clone(),
                engine.approval_timeout_secs(),
            );
            match state.coordinator.submit(approval).await {
                Ok(resolution) => {
                    let reason = resolution
                        .reason
                        .clone()
                        .unwrap_or_else(|| decision.reason.clone());
                    if resolution.is_approved() {
                        (
                            DecisionResponse::allow(&request_id, reason),
                            resolution.resolved_by,
                        )
                    } else {
                        (DecisionResponse::deny(&request_id, reason), None)
                    }
                }
                Err(SubmitError::DuplicateId(id)) => (
                    DecisionResponse::deny(
                        &request_id,
                        format!("request id '{}' is already awaiting approval", id),
                    ),
                    None,
                ),
            }
        }
    };

    let final_action = match response.action {
        FinalAction::Allow => RuleAction::Allow,
        FinalAction::Deny => RuleAction::Deny,
    };
    state.bus.publish(MonitorEvent::CommandObserved {
        request_id: request_id.clone(),
        command: command.command.clone(),
        arguments: command.arguments.clone(),
        action: final_action,
        rule: decision.rule.clone(),
        reason: response.reason.clone(),
    });

    let entry = LogEntry {
        timestamp: Utc::now(),
        request_id,
        tool: command
            .context
            .tool_identity
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        command: command.command,
        arguments: command.arguments,
        rule: decision.rule,
        action: response.action,
        reason: response.reason.clone(),
        approved_by,
        eval_duration_us: Some(eval_duration_us),
    };
    if let Err(e) = state.logger.lock().await.log(&entry) {
        tracing::error!("failed to write audit log: {}", e);
    }

    response
}
