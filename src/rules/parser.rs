//! YAML rule-set parser.
//!
//! Parses declarative rule files into the internal `RuleSet`. The format is
//! deliberately small — a named, ordered list of rules:
//!
//! ```yaml
//! name: org-default-v1
//! default_action: allow
//! rules:
//!   - name: protected-force-push
//!     command: git
//!     trigger:
//!       contains: "push --force"
//!       branch_in: [main, master, develop]
//!     action: require_approval
//!     reason: "force-push to {branch} needs a human"
//!   - name: no-secret-reads
//!     command: cat
//!     trigger:
//!       path_matches: ["*.env", ".ssh/*"]
//!     action: deny
//! ```

use crate::rules::types::*;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Raw YAML representation before validation.
#[derive(Debug, Deserialize)]
struct RawRuleSet {
    name: String,
    #[serde(default)]
    default_action: Option<RuleAction>,
    #[serde(default)]
    approval_timeout_secs: Option<u64>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    name: String,
    command: String,
    #[serde(default)]
    trigger: RawTrigger,
    action: RuleAction,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTrigger {
    #[serde(default)]
    contains: Option<StringOrVec>,
    #[serde(default)]
    matches: Option<StringOrVec>,
    #[serde(default)]
    branch_in: Option<StringOrVec>,
    #[serde(default)]
    tool_in: Option<StringOrVec>,
    #[serde(default)]
    path_matches: Option<StringOrVec>,
    #[serde(default)]
    escapes_root: Option<bool>,
}

/// Allows YAML fields to be either a single string or a list of strings:
/// ```yaml
/// contains: "push --force"            # single string — works
/// contains: ["push --force", "-f"]    # list — also works
/// ```
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrVec {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::Single(s) => vec![s],
            StringOrVec::Multiple(v) => v,
        }
    }
}

fn opt_vec(field: Option<StringOrVec>) -> Vec<String> {
    field.map(StringOrVec::into_vec).unwrap_or_default()
}

/// Parse a YAML rule file from a path.
pub fn parse_ruleset_file(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file: {}", path.display()))?;
    parse_ruleset_str(&content)
        .with_context(|| format!("Failed to parse rule file: {}", path.display()))
}

/// Parse a YAML rule-set string.
pub fn parse_ruleset_str(yaml: &str) -> Result<RuleSet> {
    let raw: RawRuleSet =
        serde_yaml::from_str(yaml).context("Invalid YAML syntax in rule file")?;

    if raw.name.trim().is_empty() {
        bail!("Rule set must have a non-empty 'name'");
    }

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(raw.rules.len());
    for (i, raw_rule) in raw.rules.into_iter().enumerate() {
        let rule = convert_rule(raw_rule)
            .with_context(|| format!("Invalid rule at position {} (0-indexed)", i))?;
        if !seen.insert(rule.name.clone()) {
            bail!("Duplicate rule name '{}' at position {}", rule.name, i);
        }
        rules.push(rule);
    }

    Ok(RuleSet {
        name: raw.name,
        default_action: raw.default_action.unwrap_or(RuleAction::Allow),
        approval_timeout_secs: raw.approval_timeout_secs,
        rules,
    })
}

fn convert_rule(raw: RawRule) -> Result<Rule> {
    if raw.name.trim().is_empty() {
        bail!("Rule must have a non-empty 'name'");
    }
    if raw.command.trim().is_empty() {
        bail!("Rule '{}' must name a target command", raw.name);
    }

    Ok(Rule {
        name: raw.name,
        command: raw.command,
        trigger: Trigger {
            contains: opt_vec(raw.trigger.contains),
            matches: opt_vec(raw.trigger.matches),
            branch_in: opt_vec(raw.trigger.branch_in),
            tool_in: opt_vec(raw.trigger.tool_in),
            path_matches: opt_vec(raw.trigger.path_matches),
            escapes_root: raw.trigger.escapes_root,
        },
        action: raw.action,
        reason: raw.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let ruleset = parse_ruleset_str(
            r#"
name: minimal
rules:
  - name: deny-shutdown
    command: shutdown
    action: deny
"#,
        )
        .unwrap();

        assert_eq!(ruleset.name, "minimal");
        assert_eq!(ruleset.default_action, RuleAction::Allow);
        assert_eq!(ruleset.rules.len(), 1);
        assert!(ruleset.rules[0].trigger.is_empty());
    }

    #[test]
    fn test_string_or_list_trigger_fields() {
        let ruleset = parse_ruleset_str(
            r#"
name: ergo
rules:
  - name: force-push
    command: git
    trigger:
      contains: "push --force"
      branch_in: [main, master]
    action: require_approval
"#,
        )
        .unwrap();

        let trigger = &ruleset.rules[0].trigger;
        assert_eq!(trigger.contains, vec!["push --force"]);
        assert_eq!(trigger.branch_in, vec!["main", "master"]);
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let err = parse_ruleset_str(
            r#"
name: dup
rules:
  - name: same
    command: ls
    action: allow
  - name: same
    command: rm
    action: deny
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate rule name"));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(parse_ruleset_str("rules: [not: {valid").is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = parse_ruleset_str("name: \"  \"\nrules: []").unwrap_err();
        assert!(format!("{:#}", err).contains("non-empty"));
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(parse_ruleset_str(
            r#"
name: bad
rules:
  - name: x
    command: ls
    action: maybe
"#
        )
        .is_err());
    }
}
