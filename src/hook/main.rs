//! cmdgate-hook — AI-agent tool-runner front-end (PreToolUse hook shape).
//!
//! Called by the agent host before every tool use. Reads the tool-call
//! JSON from stdin, extracts the shell command if there is one, and asks
//! the daemon:
//!   - exit 0: allow the tool call
//!   - exit 2 + stderr: block it (the host shows stderr to the agent)
//!
//! Approvals work here too: the daemon holds the request until a human
//! resolves it on a monitor, and the hook simply waits for the answer.
//!
//! Stdin shape (from the host):
//! {
//!   "session_id": "...",
//!   "cwd": "/project/path",
//!   "tool_name": "Bash",
//!   "tool_input": { "command": "git push --force origin main" }
//! }

use cmdgate::daemon::protocol::FinalAction;
use cmdgate::daemon::DecisionClient;
use cmdgate::rules::types::CommandRequest;
use cmdgate::utils::vcs::resolve_branch;
use std::io::Read;
use std::path::PathBuf;
use std::process;

const EXIT_DENIED: i32 = 2;

#[derive(serde::Deserialize, Debug)]
struct HookInput {
    #[allow(dead_code)]
    session_id: Option<String>,
    cwd: Option<String>,
    tool_name: String,
    tool_input: serde_json::Value,
}

fn main() {
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        // Fail open on transport problems — the daemon never saw a request.
        process::exit(0);
    }

    let hook_input: HookInput = match serde_json::from_str(&input) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("[cmdgate] unparseable hook input: {}", e);
            process::exit(0);
        }
    };

    // Only shell commands are decided here; read-only tools pass.
    if hook_input.tool_name != "Bash" {
        process::exit(0);
    }
    let Some(command_line) = hook_input
        .tool_input
        .get("command")
        .and_then(|v| v.as_str())
    else {
        process::exit(0);
    };

    let Some((command, arguments)) = split_command_line(command_line) else {
        process::exit(0);
    };

    let cwd = hook_input
        .cwd
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut request = CommandRequest::new(command, arguments)
        .with_cwd(cwd.to_string_lossy())
        .with_tool("claude-hook");
    if let Some(branch) = resolve_branch(&cwd) {
        request = request.with_branch(branch);
    }

    match DecisionClient::from_env().decide(request) {
        Ok(response) => match response.action {
            FinalAction::Allow => process::exit(0),
            FinalAction::Deny => {
                eprintln!("[cmdgate] BLOCKED: {} — {}", command_line, response.reason);
                process::exit(EXIT_DENIED);
            }
        },
        Err(e) => {
            // No daemon, no decision — don't block the user's session.
            eprintln!("[cmdgate] {:#} — allowing without a decision", e);
            process::exit(0);
        }
    }
}

/// Split a shell line into command name and raw argument string.
fn split_command_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => Some((command, rest.trim_start())),
        None => Some((trimmed, "")),
    }
}
