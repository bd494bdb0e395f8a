//! Rule decision engine — the pure core of cmdgate.
//!
//! Evaluates a command request against an ordered rule set and returns a
//! decision: allow, deny, or require approval.
//!
//! Rules are evaluated **in order** — first match wins, the same model as
//! firewall rules. A rule matches when its target command name equals the
//! request's command AND every trigger group it specifies holds.
//!
//! Evaluation is synchronous, side-effect free, and never blocks; regexes
//! and glob patterns are pre-compiled at load time, not per request.

use crate::rules::types::*;
use crate::utils::paths::{escapes_root, path_tokens, CompiledMatcher};
use anyhow::{Context, Result};
use regex::Regex;

/// Pre-compiled rule engine ready for fast evaluation.
/// Created once from a RuleSet, swapped whole on reload.
pub struct RuleEngine {
    ruleset: RuleSet,
    compiled: Vec<CompiledRule>,
}

/// A rule with its trigger patterns compiled for fast matching.
struct CompiledRule {
    rule: Rule,
    regexes: Vec<Regex>,
    path_matcher: Option<CompiledMatcher>,
}

impl RuleEngine {
    /// Compile a rule set into an engine.
    /// Fails if any trigger regex or glob pattern is malformed — the caller
    /// keeps the previously active engine in that case.
    pub fn new(ruleset: RuleSet) -> Result<Self> {
        let compiled = ruleset
            .rules
            .iter()
            .map(|rule| {
                let regexes = rule
                    .trigger
                    .matches
                    .iter()
                    .map(|pattern| {
                        Regex::new(pattern).with_context(|| {
                            format!("Rule '{}': invalid regex '{}'", rule.name, pattern)
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                let path_matcher = if rule.trigger.path_matches.is_empty() {
                    None
                } else {
                    Some(
                        CompiledMatcher::new(&rule.trigger.path_matches).with_context(|| {
                            format!("Rule '{}': invalid glob pattern", rule.name)
                        })?,
                    )
                };

                Ok(CompiledRule {
                    rule: rule.clone(),
                    regexes,
                    path_matcher,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { ruleset, compiled })
    }

    /// Evaluate a command request against the rule set.
    ///
    /// Scans rules in declared order; the first rule whose target command and
    /// trigger both match determines the decision. No match falls through to
    /// the rule set's configured default action.
    pub fn evaluate(&self, request: &CommandRequest) -> Decision {
        for compiled in &self.compiled {
            if compiled.rule.command != request.command {
                continue;
            }
            if compiled.matches(request) {
                return self.rule_to_decision(&compiled.rule, request);
            }
        }

        Decision {
            action: self.ruleset.default_action,
            rule: None,
            reason: format!(
                "No rule matched '{}' — default policy is {}",
                request.command, self.ruleset.default_action
            ),
        }
    }

    fn rule_to_decision(&self, rule: &Rule, request: &CommandRequest) -> Decision {
        let reason = match &rule.reason {
            Some(template) => render_reason(template, request),
            None => format!(
                "Rule '{}' in set '{}': {} {}",
                rule.name, self.ruleset.name, rule.action, request.command
            ),
        };
        Decision {
            action: rule.action,
            rule: Some(rule.name.clone()),
            reason,
        }
    }

    /// Approval timeout override carried by the rule set, if any.
    pub fn approval_timeout_secs(&self) -> Option<u64> {
        self.ruleset.approval_timeout_secs
    }

    pub fn ruleset_name(&self) -> &str {
        &self.ruleset.name
    }

    pub fn rule_count(&self) -> usize {
        self.ruleset.rules.len()
    }
}

impl CompiledRule {
    /// Check every trigger group the rule specifies (AND); within a list
    /// group any single entry matching is enough.
    fn matches(&self, request: &CommandRequest) -> bool {
        let trigger = &self.rule.trigger;
        let args = request.arguments.as_str();

        if !trigger.contains.is_empty()
            && !trigger.contains.iter().any(|needle| args.contains(needle))
        {
            return false;
        }

        if !self.regexes.is_empty() && !self.regexes.iter().any(|re| re.is_match(args)) {
            return false;
        }

        if !trigger.branch_in.is_empty() {
            match &request.context.branch {
                Some(branch) => {
                    if !trigger.branch_in.iter().any(|b| b == branch) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if !trigger.tool_in.is_empty() {
            match &request.context.tool_identity {
                Some(tool) => {
                    if !trigger.tool_in.iter().any(|t| t == tool) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if let Some(ref matcher) = self.path_matcher {
            if !path_tokens(args).iter().any(|tok| matcher.matches(tok)) {
                return false;
            }
        }

        if trigger.escapes_root == Some(true) {
            match &request.context.cwd {
                Some(cwd) => {
                    if !path_tokens(args).iter().any(|tok| escapes_root(tok, cwd)) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }
}

/// Fill `{command}`, `{arguments}` and `{branch}` placeholders in a reason
/// template.
fn render_reason(template: &str, request: &CommandRequest) -> String {
    template
        .replace("{command}", &request.command)
        .replace("{arguments}", &request.arguments)
        .replace(
            "{branch}",
            request.context.branch.as_deref().unwrap_or("(no branch)"),
        )
}
