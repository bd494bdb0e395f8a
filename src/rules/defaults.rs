//! Starter rule file written by `cmdgate init`.

/// A commented starting point covering the common risky commands.
pub const STARTER_RULESET: &str = r#"# cmdgate rule file
#
# Rules are checked top to bottom — first match wins.
# A rule matches when its `command` equals the intercepted command name
# and every trigger it lists holds. No match falls through to
# `default_action`.

name: starter-v1
default_action: allow

# How long a require_approval command waits for a human before it is
# denied (fail-closed).
approval_timeout_secs: 300

rules:
  # Force-pushing a protected branch needs a human.
  - name: protected-force-push
    command: git
    trigger:
      contains: ["push --force", "push -f"]
      branch_in: [main, master, develop]
    action: require_approval
    reason: "force-push to {branch} needs a human"

  # Committing straight to main is blocked.
  - name: no-commit-on-main
    command: git
    trigger:
      contains: [commit]
      branch_in: [main, master]
    action: deny
    reason: "commit directly to {branch} is not allowed — use a feature branch"

  # Recursive delete anywhere needs a human.
  - name: recursive-delete
    command: rm
    trigger:
      matches: ["(^|\\s)-[a-zA-Z]*r"]
    action: require_approval

  # Reading secret material is blocked outright.
  - name: no-secret-reads
    command: cat
    trigger:
      path_matches: ["*.env", ".ssh/*", "*.pem", "*.key"]
    action: deny
    reason: "{command} on secret files is blocked"

  # Piping the network into a shell is blocked.
  - name: no-pipe-to-shell
    command: curl
    trigger:
      matches: ["\\|\\s*(ba|z)?sh"]
    action: deny
"#;
