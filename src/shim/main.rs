//! cmdgate-shim — shell front-end.
//!
//! Installed as symlinks (`git` → cmdgate-shim, `rm` → cmdgate-shim, ...)
//! or invoked explicitly as `cmdgate-shim <command> [args...]`. It asks the
//! daemon whether the command may run, then:
//!   - allow: execs the real binary and exits with its status
//!   - deny: prints the reason to stderr and exits 2
//!
//! The daemon's response drives the exit-code convention; the shim never
//! second-guesses it. If the command needs approval, the daemon holds the
//! connection open until a human (or the timeout) decides — the shim just
//! waits.

use cmdgate::daemon::protocol::FinalAction;
use cmdgate::daemon::DecisionClient;
use cmdgate::rules::types::CommandRequest;
use cmdgate::utils::vcs::resolve_branch;
use std::env;
use std::path::Path;
use std::process;

/// Deny exit code, by convention shared with the hook.
const EXIT_DENIED: i32 = 2;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Symlink interception: argv[0] is the intercepted command name.
    // Direct invocation: cmdgate-shim <command> [args...].
    let invoked_as = Path::new(&args[0])
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "cmdgate-shim".to_string());

    let (command, arguments) = if invoked_as == "cmdgate-shim" {
        if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
            print_usage();
            process::exit(if args.len() < 2 { 1 } else { 0 });
        }
        (args[1].clone(), args[2..].to_vec())
    } else {
        (invoked_as, args[1..].to_vec())
    };

    let cwd = env::current_dir().unwrap_or_else(|_| ".".into());
    let mut request = CommandRequest::new(&command, arguments.join(" "))
        .with_cwd(cwd.to_string_lossy())
        .with_tool("shell-shim");
    if let Some(branch) = resolve_branch(&cwd) {
        request = request.with_branch(branch);
    }

    let response = match DecisionClient::from_env().decide(request) {
        Ok(response) => response,
        Err(e) => {
            // Daemon unreachable — pass through rather than bricking the
            // shell. Approvals only exist once the daemon is up.
            eprintln!("[cmdgate] {:#} — running without a decision", e);
            exec_real(&command, &arguments);
        }
    };

    match response.action {
        FinalAction::Allow => exec_real(&command, &arguments),
        FinalAction::Deny => {
            eprintln!("[cmdgate] BLOCKED: {} — {}", command, response.reason);
            process::exit(EXIT_DENIED);
        }
    }
}

/// Run the real command and exit with its status. `/usr/bin/<cmd>` is
/// tried first; the bare PATH lookup is a fallback and can re-resolve to
/// the shim symlink for binaries living elsewhere, so the shim directory
/// should only shadow /usr/bin names.
fn exec_real(command: &str, arguments: &[String]) -> ! {
    let candidates = [format!("/usr/bin/{}", command), command.to_string()];
    for candidate in &candidates {
        let status = process::Command::new(candidate).args(arguments).status();
        if let Ok(status) = status {
            process::exit(status.code().unwrap_or(1));
        }
    }
    eprintln!("[cmdgate] cannot find real '{}' to execute", command);
    process::exit(127);
}

fn print_usage() {
    eprintln!(
        r#"cmdgate-shim — command interceptor

Usage:
  cmdgate-shim <command> [args...]   Ask the daemon, then run the command

Environment:
  CMDGATE_SOCKET   Decision socket path (default: $CMDGATE_DIR or ~/.cmdgate)

Symlink a command name to cmdgate-shim to intercept it transparently:
  ln -s $(which cmdgate-shim) ~/.cmdgate/bin/git"#
    );
}
