//! Observer registry and event fan-out for the Podium dashboard.
//!
//! The [`Broadcaster`] tracks the set of live observers (WebSocket
//! connections, in practice) and delivers every lifecycle event to all
//! of them with best-effort semantics: no persistence, no replay, no
//! acknowledgment. A process restart drops all observers.
//!
//! Each observer gets its own bounded queue. Delivery is a non-blocking
//! `try_send`; a full or closed queue evicts that observer instead of
//! back-pressuring the publisher, so one slow or dead connection can
//! never stall delivery to the rest.

use podium_types::LifecycleEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Handle identifying a registered observer.
pub type ObserverId = u64;

/// Default per-observer queue capacity. Enough buffer for normal
/// operation; an observer further behind than this is too slow to keep
/// and gets evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Registry of live observers with bounded per-observer delivery queues.
///
/// Cheap to clone; all clones share the same registry. There is no
/// implicit global instance — construct one at process start and pass it
/// to whoever needs it.
#[derive(Clone)]
pub struct Broadcaster {
    observers: Arc<RwLock<HashMap<ObserverId, mpsc::Sender<String>>>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a broadcaster with a custom per-observer queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            observers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity,
        }
    }

    /// Registers a new observer and returns its handle together with the
    /// receiving end of its delivery queue. Never fails.
    ///
    /// The caller owns the receiver and drains it into its transport;
    /// dropping the receiver is treated as disconnection and leads to
    /// eviction on the next publish.
    pub async fn register(&self) -> (ObserverId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);

        let count = {
            let mut observers = self.observers.write().await;
            observers.insert(id, tx);
            observers.len()
        };
        tracing::info!(observer = id, total = count, "observer registered");

        (id, rx)
    }

    /// Removes an observer from the live set. Idempotent; safe to call
    /// after the observer already disconnected uncleanly.
    pub async fn deregister(&self, id: ObserverId) {
        let removed = {
            let mut observers = self.observers.write().await;
            observers.remove(&id).is_some()
        };
        if removed {
            tracing::info!(observer = id, "observer deregistered");
        }
    }

    /// Delivers an event to the snapshot of observers live at the moment
    /// of the call.
    ///
    /// The registry lock is held only long enough to snapshot the sender
    /// handles, never across delivery, so registration and deregistration
    /// proceed concurrently with fan-out. An observer whose queue is full
    /// or closed is evicted; its failure never affects delivery to the
    /// others and is never surfaced to the caller.
    pub async fn publish(&self, event: &LifecycleEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(
                    event_type = event.event_type(),
                    "failed to serialize lifecycle event: {}",
                    e
                );
                return;
            }
        };

        let snapshot: Vec<(ObserverId, mpsc::Sender<String>)> = {
            let observers = self.observers.read().await;
            observers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut evicted = Vec::new();
        for (id, tx) in snapshot {
            if let Err(e) = tx.try_send(payload.clone()) {
                tracing::warn!(
                    observer = id,
                    event_type = event.event_type(),
                    "evicting observer after failed delivery: {}",
                    e
                );
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            let mut observers = self.observers.write().await;
            for id in evicted {
                observers.remove(&id);
            }
        }
    }

    /// Number of currently registered observers.
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_types::{Question, QuestionStatus};

    fn sample_event(id: i64) -> LifecycleEvent {
        LifecycleEvent::QuestionCreated(Question {
            id,
            user_id: None,
            username: "Guest".to_string(),
            message: "does fan-out work?".to_string(),
            category: "General".to_string(),
            status: QuestionStatus::Pending,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            answered_at: None,
        })
    }

    #[tokio::test]
    async fn delivers_to_all_observers() {
        let broadcaster = Broadcaster::new();
        let (_, mut rx_a) = broadcaster.register().await;
        let (_, mut rx_b) = broadcaster.register().await;
        let (_, mut rx_c) = broadcaster.register().await;

        broadcaster.publish(&sample_event(1)).await;

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let msg = rx.try_recv().expect("every observer should get the event");
            let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(json["type"], "new_question");
            assert_eq!(json["data"]["id"], 1);
        }
    }

    #[tokio::test]
    async fn deregistered_observer_receives_nothing() {
        let broadcaster = Broadcaster::new();
        let (id_a, mut rx_a) = broadcaster.register().await;
        let (_, mut rx_b) = broadcaster.register().await;

        broadcaster.deregister(id_a).await;
        broadcaster.publish(&sample_event(2)).await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
        assert_eq!(broadcaster.observer_count().await, 1);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.register().await;

        broadcaster.deregister(id).await;
        broadcaster.deregister(id).await;
        assert_eq!(broadcaster.observer_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_block_others() {
        let broadcaster = Broadcaster::new();
        let (_, rx_dead) = broadcaster.register().await;
        let (_, mut rx_live) = broadcaster.register().await;

        // Simulate an unclean disconnect.
        drop(rx_dead);

        broadcaster.publish(&sample_event(3)).await;

        assert!(rx_live.try_recv().is_ok());
        // The dead observer was evicted during publish.
        assert_eq!(broadcaster.observer_count().await, 1);
    }

    #[tokio::test]
    async fn slow_observer_is_evicted_when_queue_fills() {
        let broadcaster = Broadcaster::with_capacity(2);
        let (_, mut rx_slow) = broadcaster.register().await;
        let (_, mut rx_fast) = broadcaster.register().await;

        // The fast observer drains after every publish; the slow one
        // never does, so the third publish overflows its queue.
        for i in 0..3 {
            broadcaster.publish(&sample_event(i)).await;
            let msg = rx_fast.try_recv().expect("fast observer keeps receiving");
            let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(json["data"]["id"], i);
        }

        assert_eq!(broadcaster.observer_count().await, 1);

        // The slow observer's buffered events are still readable but no
        // further deliveries will be attempted.
        assert!(rx_slow.try_recv().is_ok());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let broadcaster = Broadcaster::new();
        let (_, mut rx) = broadcaster.register().await;

        for i in 0..10 {
            broadcaster.publish(&sample_event(i)).await;
        }

        for i in 0..10 {
            let msg = rx.try_recv().expect("event should be queued");
            let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(json["data"]["id"], i);
        }
    }

    #[tokio::test]
    async fn registration_after_publish_misses_earlier_events() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(&sample_event(1)).await;

        let (_, mut rx) = broadcaster.register().await;
        assert!(rx.try_recv().is_err(), "no replay of earlier events");

        broadcaster.publish(&sample_event(2)).await;
        let msg = rx.try_recv().expect("later events are delivered");
        let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(json["data"]["id"], 2);
    }
}
