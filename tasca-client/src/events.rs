//! Typed event hub
//!
//! Cross-cutting refresh signalling for table, tab and cash-session views.
//! Explicit per-topic subscriber lists with an unsubscribe handle instead of
//! a single untyped global bus.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shared::models::{SaleStatus, TableStatus};
use tokio::sync::mpsc;

/// Subscription topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Sales,
    Tables,
    Tabs,
    CashSession,
}

/// Events published on the hub
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SaleChanged {
        sale_id: String,
    },
    TableChanged {
        table_id: String,
        status: TableStatus,
    },
    TabChanged {
        tab_id: String,
        status: SaleStatus,
    },
    CashEntryRecorded {
        entry_id: String,
        sale_id: String,
    },
}

type Subscribers = HashMap<Topic, HashMap<u64, mpsc::UnboundedSender<EngineEvent>>>;

/// Per-topic publish/subscribe hub
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to a topic
    ///
    /// Dropping the returned [`Subscription`] unsubscribes; the receiver
    /// then drains and closes.
    pub fn subscribe(
        self: &Arc<Self>,
        topic: Topic,
    ) -> (Subscription, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .entry(topic)
            .or_default()
            .insert(id, tx);
        (
            Subscription {
                hub: Arc::clone(self),
                topic,
                id,
            },
            rx,
        )
    }

    /// Publish an event to all subscribers of a topic
    pub fn publish(&self, topic: Topic, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock();
        if let Some(topic_subscribers) = subscribers.get_mut(&topic) {
            // Senders whose receiver is gone are pruned on the way
            topic_subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        }
    }

    fn unsubscribe(&self, topic: Topic, id: u64) {
        if let Some(topic_subscribers) = self.subscribers.lock().get_mut(&topic) {
            topic_subscribers.remove(&id);
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .lock()
            .get(&topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Unsubscribe handle; dropping it removes the subscriber
pub struct Subscription {
    hub: Arc<EventHub>,
    topic: Topic,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.topic, self.id);
    }
}
