//! In-process event fan-out to monitor sessions.
//!
//! Publishers never block: each subscriber gets its own bounded queue, and
//! delivery uses `try_send`. When a subscriber's queue is full, a
//! low-priority event (`command_observed`, `log`) is shed for that
//! subscriber only; a critical approval event instead detaches the
//! subscriber entirely — a monitor that falls that far behind must
//! reconnect, and the snapshot replay on attach rebuilds its view of the
//! outstanding approvals. A connected, keeping-up subscriber sees every
//! event in publish order.

use crate::daemon::protocol::MonitorEvent;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Queue depth per subscriber. Deep enough for bursts of observed
/// commands; an interactive monitor drains far faster than this fills.
const SUBSCRIBER_QUEUE: usize = 256;

/// Fan-out hub. One per daemon, shared via `Arc`.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

struct Subscriber {
    tx: mpsc::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Attach a subscriber and return its event stream.
    pub fn subscribe(&self) -> mpsc::Receiver<MonitorEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Subscriber { tx });
        rx
    }

    /// Deliver an event to every live subscriber, in publish order.
    /// Never blocks; see module docs for the overflow policy.
    pub fn publish(&self, event: MonitorEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                if event.is_critical() {
                    tracing::warn!(
                        "monitor subscriber overflowed on a critical event — detaching"
                    );
                    false
                } else {
                    tracing::debug!("dropping low-priority event for slow subscriber");
                    true
                }
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::types::ResolutionOutcome;

    fn observed(n: usize) -> MonitorEvent {
        MonitorEvent::log(format!("event {}", n))
    }

    fn resolved(id: &str) -> MonitorEvent {
        MonitorEvent::ApprovalResolved {
            request_id: id.to_string(),
            decision: ResolutionOutcome::Approved,
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        for n in 0..10 {
            bus.publish(observed(n));
        }
        for n in 0..10 {
            match rx.recv().await.unwrap() {
                MonitorEvent::Log { message } => {
                    assert_eq!(message, format!("event {}", n));
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(resolved("req-1"));

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                MonitorEvent::ApprovalResolved { request_id, .. } => {
                    assert_eq!(request_id, "req-1");
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_full_queue_sheds_low_priority_and_keeps_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        // Nobody drains — fill the queue past its bound.
        for n in 0..(SUBSCRIBER_QUEUE + 50) {
            bus.publish(observed(n));
        }
        assert_eq!(bus.subscriber_count(), 1);

        // Queued events are intact and in order; the overflow was shed.
        let mut received = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                MonitorEvent::Log { message } => {
                    assert_eq!(message, format!("event {}", received));
                }
                other => panic!("unexpected event: {:?}", other),
            }
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_QUEUE);
    }

    #[tokio::test]
    async fn test_critical_overflow_detaches_subscriber() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        for n in 0..SUBSCRIBER_QUEUE {
            bus.publish(observed(n));
        }
        // Queue is full; a critical event cannot be delivered.
        bus.publish(resolved("req-1"));
        assert_eq!(bus.subscriber_count(), 0);
        drop(rx);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);

        bus.publish(observed(0));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
