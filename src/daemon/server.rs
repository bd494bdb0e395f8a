//! Daemon assembly — sockets, shared state, and hot reload.
//!
//! One logical process serves two Unix sockets under the runtime
//! directory: `decision.sock` for front-ends and `monitor.sock` for
//! monitors. SIGHUP atomically swaps the rule set; a bad rule file leaves
//! the old set in force and never drops in-flight approvals. Per-request
//! errors never terminate the daemon — only failing to bind does.

use crate::approval::ApprovalCoordinator;
use crate::audit::AuditLogger;
use crate::bus::EventBus;
use crate::daemon::protocol::MonitorEvent;
use crate::daemon::{dispatcher, monitor};
use crate::rules::RuleStore;
use crate::utils::paths::{decision_socket, monitor_socket};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;

/// Everything the connection handlers share.
pub struct DaemonState {
    pub store: Arc<RuleStore>,
    pub coordinator: Arc<ApprovalCoordinator>,
    pub bus: Arc<EventBus>,
    pub logger: Mutex<AuditLogger>,
}

pub struct DaemonConfig {
    /// YAML rule file to load and reload.
    pub rules_path: PathBuf,
    /// Directory for sockets and the audit log.
    pub runtime_dir: PathBuf,
    /// Default approval timeout; a rule set's
    /// `approval_timeout_secs` overrides it.
    pub approval_timeout: Duration,
}

pub struct Daemon {
    config: DaemonConfig,
    state: Arc<DaemonState>,
}

impl Daemon {
    /// Load the rule set, open the audit log, and wire the components.
    pub fn new(config: DaemonConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.runtime_dir).with_context(|| {
            format!(
                "Failed to create runtime directory: {}",
                config.runtime_dir.display()
            )
        })?;

        let store = Arc::new(RuleStore::load(&config.rules_path)?);
        let bus = Arc::new(EventBus::new());
        let coordinator = ApprovalCoordinator::new(bus.clone(), config.approval_timeout);
        let logger = Mutex::new(AuditLogger::open(&config.runtime_dir)?);

        Ok(Self {
            config,
            state: Arc::new(DaemonState {
                store,
                coordinator,
                bus,
                logger,
            }),
        })
    }

    pub fn state(&self) -> Arc<DaemonState> {
        self.state.clone()
    }

    /// Bind both sockets and serve until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        let decision_path = decision_socket(&self.config.runtime_dir);
        let monitor_path = monitor_socket(&self.config.runtime_dir);
        for path in [&decision_path, &monitor_path] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }

        let decision_listener = UnixListener::bind(&decision_path)
            .with_context(|| format!("Failed to bind socket: {}", decision_path.display()))?;
        let monitor_listener = UnixListener::bind(&monitor_path)
            .with_context(|| format!("Failed to bind socket: {}", monitor_path.display()))?;

        tracing::info!(
            ruleset = %self.state.store.engine().ruleset_name(),
            rules = self.state.store.engine().rule_count(),
            "cmdgate listening on {} and {}",
            decision_path.display(),
            monitor_path.display()
        );

        self.spawn_reload_handler()?;

        tokio::try_join!(
            dispatcher::serve(decision_listener, self.state.clone()),
            monitor::serve(monitor_listener, self.state.clone()),
        )?;
        Ok(())
    }

    /// SIGHUP → atomic rule-set swap. Reload failure keeps the active set.
    fn spawn_reload_handler(&self) -> Result<()> {
        let mut hangup =
            signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
        let state = self.state.clone();
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                match state.store.reload() {
                    Ok(count) => {
                        tracing::info!(rules = count, "rule set reloaded");
                        state.bus.publish(MonitorEvent::log(format!(
                            "rule set reloaded: {} rules active",
                            count
                        )));
                    }
                    Err(e) => {
                        tracing::error!("rule reload failed, keeping active set: {:#}", e);
                        state.bus.publish(MonitorEvent::log(format!(
                            "rule reload rejected, previous set still active: {:#}",
                            e
                        )));
                    }
                }
            }
        });
        Ok(())
    }
}
