//! CLI tests for the `cmdgate` binary: rule-file validation, starter
//! file generation, and failure modes when no daemon is running.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmdgate() -> Command {
    Command::cargo_bin("cmdgate").unwrap()
}

#[test]
fn test_check_accepts_valid_rule_file() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.yaml");
    std::fs::write(
        &rules,
        r#"
name: team-policy
rules:
  - name: no-force-push
    command: git
    trigger:
      contains: ["push --force"]
    action: deny
"#,
    )
    .unwrap();

    cmdgate()
        .arg("check")
        .arg(&rules)
        .assert()
        .success()
        .stdout(predicate::str::contains("team-policy"))
        .stdout(predicate::str::contains("1 rules"));
}

#[test]
fn test_check_rejects_bad_yaml() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.yaml");
    std::fs::write(&rules, "rules: [not, a, rule, set").unwrap();

    cmdgate().arg("check").arg(&rules).assert().failure();
}

#[test]
fn test_check_rejects_unknown_action() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.yaml");
    std::fs::write(
        &rules,
        r#"
name: bad
rules:
  - name: oops
    command: git
    action: maybe
"#,
    )
    .unwrap();

    cmdgate().arg("check").arg(&rules).assert().failure();
}

#[test]
fn test_check_rejects_duplicate_rule_names() {
    let dir = TempDir::new().unwrap();
    let rules = dir.path().join("rules.yaml");
    std::fs::write(
        &rules,
        r#"
name: dupes
rules:
  - name: same
    command: git
    action: deny
  - name: same
    command: rm
    action: deny
"#,
    )
    .unwrap();

    cmdgate()
        .arg("check")
        .arg(&rules)
        .assert()
        .failure()
        .stderr(predicate::str::contains("same"));
}

#[test]
fn test_init_writes_starter_file_that_checks_clean() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join(".cmdgate.yaml");

    cmdgate()
        .arg("init")
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    assert!(output.exists());

    cmdgate().arg("check").arg(&output).assert().success();
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join(".cmdgate.yaml");
    std::fs::write(&output, "name: mine\nrules: []\n").unwrap();

    cmdgate()
        .arg("init")
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents, "name: mine\nrules: []\n");
}

#[test]
fn test_status_fails_without_daemon() {
    let dir = TempDir::new().unwrap();

    cmdgate()
        .arg("status")
        .arg("--dir")
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn test_shim_fails_open_without_daemon() {
    let dir = TempDir::new().unwrap();

    // No daemon at this socket: the shim warns and runs the command anyway.
    Command::cargo_bin("cmdgate-shim")
        .unwrap()
        .env("CMDGATE_DIR", dir.path())
        .env_remove("CMDGATE_SOCKET")
        .arg("true")
        .assert()
        .success()
        .stderr(predicate::str::contains("without a decision"));
}
