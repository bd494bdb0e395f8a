//! Approval coordinator — single owner of the in-flight table.
//!
//! Every pending approval lives in one mutex-guarded map. Two and only two
//! signals can finish an entry: a resolution message relayed from a monitor
//! session, or the per-request timeout timer. Both funnel through
//! `finish()`, and removal from the map is the single-assignment point —
//! whichever signal removes the entry wins, the loser finds it gone and is
//! discarded. Timeout always resolves to deny: an unanswered risky command
//! never proceeds.
//!
//! The dispatcher and the monitor sessions never touch table entries;
//! their whole interface is `submit` and `resolve`.

use crate::approval::types::*;
use crate::bus::EventBus;
use crate::daemon::protocol::{MonitorEvent, ResolveDecision};
use crate::rules::types::CommandRequest;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How many terminal ids we remember, to tell a duplicate resolution apart
/// from one that never existed.
const RESOLVED_MEMORY: usize = 256;

pub struct ApprovalCoordinator {
    bus: Arc<EventBus>,
    /// Default wait before a pending approval is denied fail-closed.
    timeout: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    pending: HashMap<String, PendingApproval>,
    recently_resolved: VecDeque<String>,
}

struct PendingApproval {
    request: ApprovalRequest,
    /// Wakes the dispatcher connection suspended on this request.
    reply: oneshot::Sender<Resolution>,
    timer: JoinHandle<()>,
}

impl ApprovalCoordinator {
    pub fn new(bus: Arc<EventBus>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            bus,
            timeout,
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                recently_resolved: VecDeque::new(),
            }),
        })
    }

    /// Build an `ApprovalRequest` with the configured deadline.
    /// `timeout_secs` overrides the daemon default (rule sets may carry one).
    pub fn make_request(
        &self,
        id: String,
        command: CommandRequest,
        timeout_secs: Option<u64>,
    ) -> ApprovalRequest {
        let now = Utc::now();
        let wait = timeout_secs.map_or(self.timeout, Duration::from_secs);
        ApprovalRequest {
            id,
            command,
            requested_at: now,
            deadline: now + chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::zero()),
        }
    }

    /// Register a request, announce it, and wait for its terminal state.
    ///
    /// Returns when a monitor resolution or the timeout finishes the entry.
    /// The caller's connection dropping does not cancel the request — it
    /// stays live until resolution so the outcome is still observed and
    /// audited.
    pub async fn submit(
        self: &Arc<Self>,
        request: ApprovalRequest,
    ) -> Result<Resolution, SubmitError> {
        let (reply, wait) = oneshot::channel();
        {
            let mut inner = self.lock();
            if inner.pending.contains_key(&request.id)
                || inner.recently_resolved.contains(&request.id)
            {
                return Err(SubmitError::DuplicateId(request.id));
            }

            let timer = {
                let coordinator = Arc::clone(self);
                let id = request.id.clone();
                let sleep = (request.deadline - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                tokio::spawn(async move {
                    tokio::time::sleep(sleep).await;
                    coordinator.expire(&id, sleep);
                })
            };

            inner.pending.insert(
                request.id.clone(),
                PendingApproval {
                    request: request.clone(),
                    reply,
                    timer,
                },
            );

            // Publish while the table lock is still held: `finish()` cannot
            // claim the entry until the lock is released, so a resolution
            // spotted via `pending_snapshot()` can never put its
            // `approval_resolved` on the bus ahead of this event. The bus
            // never takes this lock.
            tracing::info!(
                id = %request.id,
                command = %request.command.command,
                "approval requested"
            );
            self.bus.publish(approval_requested_event(&request));
        }

        match wait.await {
            Ok(resolution) => Ok(resolution),
            // The coordinator never drops a pending entry without sending,
            // but fail closed if that invariant is ever broken.
            Err(_) => Ok(Resolution {
                outcome: ResolutionOutcome::Denied,
                reason: Some("approval coordinator shut down".to_string()),
                resolved_by: None,
            }),
        }
    }

    /// Apply a human resolution relayed by a monitor session.
    pub fn resolve(
        &self,
        id: &str,
        decision: ResolveDecision,
        reason: Option<String>,
        resolved_by: Option<String>,
    ) -> Result<(), ResolveError> {
        let outcome = match decision {
            ResolveDecision::Approve => ResolutionOutcome::Approved,
            ResolveDecision::Deny => ResolutionOutcome::Denied,
        };
        self.finish(id, outcome, reason, resolved_by)
    }

    /// Timer path. Losing the race to a human resolution is the expected
    /// no-op, not an error. `wait` is the effective timeout this request
    /// was given, which may be a rule-set override rather than the daemon
    /// default.
    fn expire(&self, id: &str, wait: Duration) {
        let reason = format!(
            "approval timed out after {}s with no response",
            wait.as_secs()
        );
        if self
            .finish(id, ResolutionOutcome::TimedOut, Some(reason), None)
            .is_ok()
        {
            tracing::warn!(id = %id, "approval timed out — denied");
        }
    }

    /// The single resolution point. Removing the entry from the table is
    /// what claims the slot; the `approval_resolved` event is published
    /// before the timer or the waiting connection is released.
    fn finish(
        &self,
        id: &str,
        outcome: ResolutionOutcome,
        reason: Option<String>,
        resolved_by: Option<String>,
    ) -> Result<(), ResolveError> {
        let entry = {
            let mut inner = self.lock();
            match inner.pending.remove(id) {
                Some(entry) => {
                    inner.remember(id);
                    entry
                }
                None => {
                    if inner.recently_resolved.iter().any(|r| r == id) {
                        drop(inner);
                        tracing::info!(id = %id, "discarded late resolution for settled approval");
                        self.bus.publish(MonitorEvent::log(format!(
                            "discarded duplicate resolution for '{}'",
                            id
                        )));
                        return Err(ResolveError::AlreadyResolved(id.to_string()));
                    }
                    return Err(ResolveError::Unknown(id.to_string()));
                }
            }
        };

        self.bus.publish(MonitorEvent::ApprovalResolved {
            request_id: entry.request.id.clone(),
            decision: outcome,
            reason: reason.clone(),
        });
        entry.timer.abort();

        let resolution = Resolution {
            outcome,
            reason,
            resolved_by,
        };
        if entry.reply.send(resolution).is_err() {
            // Front-end went away mid-wait; the decision still stands and
            // has been published and audited.
            tracing::debug!(id = %id, "no front-end waiting on resolution");
        }
        Ok(())
    }

    /// `approval_requested` events for everything still pending, oldest
    /// first. Used for replay when a monitor attaches.
    pub fn pending_snapshot(&self) -> Vec<MonitorEvent> {
        let inner = self.lock();
        let mut pending: Vec<&ApprovalRequest> =
            inner.pending.values().map(|entry| &entry.request).collect();
        pending.sort_by_key(|request| request.requested_at);
        pending.into_iter().map(approval_requested_event).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn remember(&mut self, id: &str) {
        if self.recently_resolved.len() >= RESOLVED_MEMORY {
            self.recently_resolved.pop_front();
        }
        self.recently_resolved.push_back(id.to_string());
    }
}

fn approval_requested_event(request: &ApprovalRequest) -> MonitorEvent {
    MonitorEvent::ApprovalRequested {
        request_id: request.id.clone(),
        command: request.command.command.clone(),
        arguments: request.command.arguments.clone(),
        context: request.command.context.clone(),
        deadline: request.deadline,
    }
}
