//! Audit log entry shape.

use crate::daemon::protocol::FinalAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decided command, as appended to the JSONL audit log.
/// Every decision is recorded, allowed ones included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,

    /// Request id the front-end saw in its response.
    pub request_id: String,

    /// Invoking front-end identity ("shell-shim", "claude-hook", ...).
    pub tool: String,

    pub command: String,
    pub arguments: String,

    /// Rule that decided it, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// What the front-end was told to do.
    pub action: FinalAction,

    pub reason: String,

    /// Set when a human approved a suspended command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    /// Rule-engine evaluation time, microseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_duration_us: Option<u64>,
}
