//! Approval lifecycle types.

use crate::rules::types::CommandRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A command suspended while a human decides.
///
/// Owned exclusively by the coordinator from creation to its terminal
/// state. Its state is positional: present in the in-flight table means
/// pending; removal happens exactly once, at resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier, never reused.
    pub id: String,
    /// The command awaiting the verdict.
    pub command: CommandRequest,
    /// When the approval was opened.
    pub requested_at: DateTime<Utc>,
    /// When the timeout timer fires and the request is denied fail-closed.
    pub deadline: DateTime<Utc>,
}

/// How a pending approval ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Approved,
    Denied,
    TimedOut,
}

/// The terminal verdict handed back to the waiting dispatcher connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    /// Human-supplied reason, or a system-generated one on timeout.
    pub reason: Option<String>,
    /// Who resolved it ("monitor" for a human, None for the timer).
    pub resolved_by: Option<String>,
}

impl Resolution {
    /// Whether the suspended command may proceed.
    pub fn is_approved(&self) -> bool {
        self.outcome == ResolutionOutcome::Approved
    }
}

/// Why a resolution message was not applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No in-flight entry and no memory of one — reported to the sender.
    #[error("no pending approval with id '{0}'")]
    Unknown(String),
    /// Lost the race against an earlier resolution or the timer —
    /// discarded, never surfaced as a hard error.
    #[error("approval '{0}' was already resolved")]
    AlreadyResolved(String),
}

/// Why a submission was not accepted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("approval id '{0}' is already in use")]
    DuplicateId(String),
}
