//! cmdgate — command firewall daemon.
//!
//! Quick start:
//!   cmdgate init                 # write a starter rule file
//!   cmdgate daemon               # run the decision daemon
//!   cmdgate monitor              # watch decisions, approve/deny pending commands
//!   cmdgate status               # loaded rules and in-flight approvals

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cmdgate::daemon::protocol::{MonitorCommand, MonitorEvent, ResolveDecision};
use cmdgate::daemon::{Daemon, DaemonConfig, DecisionClient};
use cmdgate::rules::defaults::STARTER_RULESET;
use cmdgate::rules::engine::RuleEngine;
use cmdgate::rules::parser::parse_ruleset_file;
use cmdgate::utils::paths::{decision_socket, monitor_socket, runtime_dir};
use colored::Colorize;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

/// cmdgate — decide whether intercepted commands may run.
///
/// Front-ends (shell shims, agent hooks) ask the daemon before executing
/// a command. Rules allow, deny, or suspend the command for live human
/// approval via a connected monitor.
#[derive(Parser)]
#[command(name = "cmdgate", version, about = "Command firewall daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the policy decision daemon
    Daemon {
        /// Path to the YAML rule file
        #[arg(short, long, default_value = ".cmdgate.yaml", env = "CMDGATE_RULES")]
        rules: PathBuf,

        /// Runtime directory for sockets and the audit log
        #[arg(long, env = "CMDGATE_DIR")]
        dir: Option<PathBuf>,

        /// Seconds before an unanswered approval is denied
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },

    /// Show loaded rules and in-flight approvals
    Status {
        #[arg(long, env = "CMDGATE_DIR")]
        dir: Option<PathBuf>,
    },

    /// Validate a rule file
    Check {
        #[arg(default_value = ".cmdgate.yaml")]
        rules: PathBuf,
    },

    /// Write a starter rule file
    Init {
        #[arg(short, long, default_value = ".cmdgate.yaml")]
        output: PathBuf,
    },

    /// Attach a line-oriented monitor: stream events, resolve approvals
    /// with `approve <id> [reason]` / `deny <id> [reason]`
    Monitor {
        #[arg(long, env = "CMDGATE_DIR")]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            rules,
            dir,
            timeout_secs,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                )
                .init();

            let config = DaemonConfig {
                rules_path: rules,
                runtime_dir: dir.unwrap_or_else(runtime_dir),
                approval_timeout: Duration::from_secs(timeout_secs),
            };
            Daemon::new(config)?.run().await
        }

        Commands::Status { dir } => {
            let dir = dir.unwrap_or_else(runtime_dir);
            let client = DecisionClient::new(decision_socket(&dir));
            let report = client.status()?;
            println!(
                "{} rule set '{}': {} rules loaded, {} approvals pending",
                "cmdgate".green().bold(),
                report.ruleset,
                report.rules_loaded,
                report.pending_approvals
            );
            Ok(())
        }

        Commands::Check { rules } => {
            let ruleset = parse_ruleset_file(&rules)?;
            let engine = RuleEngine::new(ruleset)?;
            println!(
                "{} {} — rule set '{}', {} rules",
                "ok".green().bold(),
                rules.display(),
                engine.ruleset_name(),
                engine.rule_count()
            );
            Ok(())
        }

        Commands::Init { output } => {
            if output.exists() {
                bail!("{} already exists — not overwriting", output.display());
            }
            std::fs::write(&output, STARTER_RULESET)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} wrote {}", "ok".green().bold(), output.display());
            Ok(())
        }

        Commands::Monitor { dir } => {
            let dir = dir.unwrap_or_else(runtime_dir);
            run_monitor(monitor_socket(&dir).as_path())
        }
    }
}

/// Thin line-oriented monitor client. One thread prints the event stream,
/// the main thread turns stdin lines into resolution messages.
fn run_monitor(socket: &std::path::Path) -> Result<()> {
    let stream = UnixStream::connect(socket).with_context(|| {
        format!(
            "Failed to connect to {}. Is the daemon running?",
            socket.display()
        )
    })?;
    let reader = stream.try_clone()?;
    let mut writer = stream;

    std::thread::spawn(move || {
        let reader = BufReader::new(reader);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            match serde_json::from_str::<MonitorEvent>(line.trim()) {
                Ok(event) => print_event(&event),
                Err(_) => println!("{}", line),
            }
        }
        eprintln!("{}", "daemon closed the monitor stream".red());
        std::process::exit(0);
    });

    eprintln!("connected — resolve with: approve <id> [reason] | deny <id> [reason]");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.trim().splitn(3, ' ');
        let verb = parts.next().unwrap_or_default();
        let decision = match verb {
            "approve" => ResolveDecision::Approve,
            "deny" => ResolveDecision::Deny,
            "" => continue,
            other => {
                eprintln!("unknown command '{}'", other);
                continue;
            }
        };
        let Some(request_id) = parts.next() else {
            eprintln!("usage: {} <id> [reason]", verb);
            continue;
        };
        let command = MonitorCommand {
            request_id: request_id.to_string(),
            decision,
            reason: parts.next().map(|s| s.to_string()),
        };
        let json = serde_json::to_string(&command)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

fn print_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::CommandObserved {
            command,
            arguments,
            action,
            reason,
            ..
        } => println!(
            "{} {} {} — {}",
            format!("[{}]", action).cyan(),
            command,
            arguments,
            reason.dimmed()
        ),
        MonitorEvent::ApprovalRequested {
            request_id,
            command,
            arguments,
            deadline,
            ..
        } => println!(
            "{} {} — `{} {}` (deadline {})",
            "[approval needed]".yellow().bold(),
            request_id,
            command,
            arguments,
            deadline.format("%H:%M:%S")
        ),
        MonitorEvent::ApprovalResolved {
            request_id,
            decision,
            reason,
        } => println!(
            "{} {} — {:?} {}",
            "[resolved]".green().bold(),
            request_id,
            decision,
            reason.as_deref().unwrap_or("").dimmed()
        ),
        MonitorEvent::Log { message } => println!("{}", message.dimmed()),
        MonitorEvent::Error { message } => eprintln!("{} {}", "error:".red().bold(), message),
    }
}
