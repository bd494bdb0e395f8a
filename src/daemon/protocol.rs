//! Wire protocol for both daemon channels.
//!
//! Everything is newline-delimited JSON over a Unix domain socket.
//!
//! Front-end channel: a shim or hook sends a `FrontendRequest`, the daemon
//! answers with a `DecisionResponse` (for `decide`), a `StatusReport` (for
//! `status`), or an `ErrorReply` for malformed lines.
//!
//! Monitor channel: the daemon streams `MonitorEvent`s (`{type, payload}`),
//! and the monitor sends `MonitorCommand`s to resolve pending approvals.

use crate::approval::types::ResolutionOutcome;
use crate::rules::types::{CommandRequest, RequestContext, RuleAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request on the front-end channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrontendRequest {
    /// "May this command run?"
    Decide(DecisionRequest),
    /// Report loaded rules and in-flight approvals.
    Status,
}

/// One command decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Caller-supplied correlation id. The daemon assigns a UUID if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Command, raw arguments, and execution context.
    #[serde(flatten)]
    pub command: CommandRequest,
}

/// The daemon's reply to a `decide` request. After an approval round this
/// reflects the human's (or the timeout's) verdict, never `require_approval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub request_id: String,
    pub action: FinalAction,
    pub reason: String,
}

/// What the front-end is told to do. The conventional exit-code mapping
/// (0 = allow, 2 = deny) is the front-end's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalAction {
    Allow,
    Deny,
}

impl DecisionResponse {
    pub fn allow(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            action: FinalAction::Allow,
            reason: reason.into(),
        }
    }

    pub fn deny(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            action: FinalAction::Deny,
            reason: reason.into(),
        }
    }
}

/// Reply to a `status` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Name of the active rule set.
    pub ruleset: String,
    /// Number of loaded rules.
    pub rules_loaded: usize,
    /// Number of approvals currently in flight.
    pub pending_approvals: usize,
}

/// Per-message rejection on either channel. The connection stays open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Server-to-monitor event stream, framed as `{type, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A decision was made (allowed or denied, immediate or post-approval).
    CommandObserved {
        request_id: String,
        command: String,
        arguments: String,
        action: RuleAction,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule: Option<String>,
        reason: String,
    },

    /// A command is suspended waiting for a human.
    ApprovalRequested {
        request_id: String,
        command: String,
        arguments: String,
        context: RequestContext,
        deadline: DateTime<Utc>,
    },

    /// A suspended command reached its terminal state.
    ApprovalResolved {
        request_id: String,
        decision: ResolutionOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Informational daemon message.
    Log { message: String },

    /// Rejection of a monitor command, sent only to the offending
    /// connection. Never published on the bus.
    Error { message: String },
}

impl MonitorEvent {
    /// Approval lifecycle events must reach every connected monitor;
    /// everything else may be shed under backpressure.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            MonitorEvent::ApprovalRequested { .. } | MonitorEvent::ApprovalResolved { .. }
        )
    }

    pub fn log(message: impl Into<String>) -> Self {
        MonitorEvent::Log {
            message: message.into(),
        }
    }
}

/// Monitor-to-server resolution message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorCommand {
    pub request_id: String,
    pub decision: ResolveDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The human's verdict in a `MonitorCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveDecision {
    Approve,
    Deny,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::CommandRequest;

    #[test]
    fn test_decide_request_wire_shape() {
        let json = r#"{"type":"decide","request_id":"req-1","command":"git",
            "arguments":"push --force origin main",
            "context":{"cwd":"/work","branch":"main","tool_identity":"shell-shim"}}"#;
        let parsed: FrontendRequest = serde_json::from_str(json).unwrap();
        match parsed {
            FrontendRequest::Decide(req) => {
                assert_eq!(req.request_id.as_deref(), Some("req-1"));
                assert_eq!(req.command.command, "git");
                assert_eq!(req.command.context.branch.as_deref(), Some("main"));
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_status_request_wire_shape() {
        let parsed: FrontendRequest = serde_json::from_str(r#"{"type":"status"}"#).unwrap();
        assert!(matches!(parsed, FrontendRequest::Status));
    }

    #[test]
    fn test_decision_response_round_trip() {
        let response = DecisionResponse::deny("req-2", "blocked by rule");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""action":"deny""#));
        let parsed: DecisionResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.action, FinalAction::Deny);
    }

    #[test]
    fn test_monitor_event_is_type_payload_framed() {
        let event = MonitorEvent::ApprovalResolved {
            request_id: "req-3".to_string(),
            decision: ResolutionOutcome::TimedOut,
            reason: Some("no response".to_string()),
        };
        let value: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "approval_resolved");
        assert_eq!(value["payload"]["decision"], "timed_out");
        assert_eq!(value["payload"]["request_id"], "req-3");
    }

    #[test]
    fn test_criticality_split() {
        let observed = MonitorEvent::CommandObserved {
            request_id: "r".into(),
            command: "ls".into(),
            arguments: String::new(),
            action: RuleAction::Allow,
            rule: None,
            reason: "default".into(),
        };
        assert!(!observed.is_critical());
        assert!(!MonitorEvent::log("hi").is_critical());

        let requested = MonitorEvent::ApprovalRequested {
            request_id: "r".into(),
            command: "git".into(),
            arguments: "push --force".into(),
            context: CommandRequest::new("git", "push --force").context,
            deadline: Utc::now(),
        };
        assert!(requested.is_critical());
    }

    #[test]
    fn test_monitor_command_parses() {
        let cmd: MonitorCommand =
            serde_json::from_str(r#"{"request_id":"req-9","decision":"approve"}"#).unwrap();
        assert_eq!(cmd.decision, ResolveDecision::Approve);
        assert!(cmd.reason.is_none());
    }
}
