//! Core types for the cmdgate rule engine.
//!
//! These types define rules, triggers, command requests, and decisions —
//! the vocabulary shared by the engine, the daemon, and the front-ends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a matching rule does with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Let the command run.
    Allow,
    /// Block the command.
    Deny,
    /// Suspend the command and ask a human via a connected monitor.
    RequireApproval,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Allow => write!(f, "allow"),
            RuleAction::Deny => write!(f, "deny"),
            RuleAction::RequireApproval => write!(f, "require_approval"),
        }
    }
}

/// Conditions that narrow when a rule applies, beyond the command name.
///
/// Every specified group must hold for the rule to trigger (AND logic).
/// Within a list group, any single entry matching is enough.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trigger {
    /// Raw argument string contains one of these substrings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains: Vec<String>,

    /// Raw argument string matches one of these regular expressions.
    /// Compiled once at rule-set load time, not per request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<String>,

    /// Current version-control branch is one of these.
    /// Example: ["main", "master", "develop"]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branch_in: Vec<String>,

    /// Invoking front-end identity is one of these.
    /// Example: ["claude-hook", "shell-shim"]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_in: Vec<String>,

    /// A path-like argument token matches one of these glob patterns.
    /// Example: ["*.env", ".ssh/*"]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_matches: Vec<String>,

    /// A path-like argument token resolves outside the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escapes_root: Option<bool>,
}

impl Trigger {
    pub fn is_empty(&self) -> bool {
        self.contains.is_empty()
            && self.matches.is_empty()
            && self.branch_in.is_empty()
            && self.tool_in.is_empty()
            && self.path_matches.is_empty()
            && self.escapes_root.is_none()
    }
}

/// A single rule. Rules are evaluated in declared order — first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique name, used in logs and decision records.
    pub name: String,

    /// Target command name. Matched exactly against the request's command.
    pub command: String,

    /// Conditions narrowing when this rule applies.
    #[serde(default)]
    pub trigger: Trigger,

    /// What to do when the rule matches.
    pub action: RuleAction,

    /// Reason template shown to the caller. Supports `{command}`,
    /// `{arguments}` and `{branch}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A complete, ordered rule set. Immutable once loaded; the daemon swaps the
/// whole set atomically on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule set name (e.g. "org-default-v1")
    pub name: String,

    /// Decision when no rule matches. Defaults to allow — unclassified
    /// commands like `pwd` or `git status` run normally.
    #[serde(default = "default_action")]
    pub default_action: RuleAction,

    /// Approval timeout override, seconds. Daemon config wins if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_timeout_secs: Option<u64>,

    /// Ordered rules. First match wins.
    pub rules: Vec<Rule>,
}

fn default_action() -> RuleAction {
    RuleAction::Allow
}

/// Execution context sent by the front-end alongside the command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Working directory the command would run in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Resolved version-control branch, if the cwd is inside a repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Which front-end is asking (e.g. "shell-shim", "claude-hook").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_identity: Option<String>,
}

/// One command awaiting a verdict. Created by the front-end, immutable,
/// lives only for the duration of one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command name, e.g. "git".
    pub command: String,

    /// Raw argument string, e.g. "push --force origin main".
    #[serde(default)]
    pub arguments: String,

    /// Where and who.
    #[serde(default)]
    pub context: RequestContext,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            arguments: arguments.into(),
            context: RequestContext::default(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.context.branch = Some(branch.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.context.cwd = Some(cwd.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.context.tool_identity = Some(tool.into());
        self
    }
}

/// The engine's verdict for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// What the policy says.
    pub action: RuleAction,

    /// Name of the rule that produced it (None = default policy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    /// Human-readable reason.
    pub reason: String,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.action == RuleAction::Allow
    }

    pub fn is_denied(&self) -> bool {
        self.action == RuleAction::Deny
    }

    pub fn requires_approval(&self) -> bool {
        self.action == RuleAction::RequireApproval
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action, self.reason)
    }
}
