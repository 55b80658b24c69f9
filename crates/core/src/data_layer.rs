//! Shared append-only event log.
//!
//! The hosting page and the engine both write entries here; detectors
//! observe it either by subscription (notified on push) or by scanning the
//! backlog on an interval. Entries are never removed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// One entry in the shared log: an event name plus arbitrary payload
/// fields, mirroring the loose object shape hosting pages push.
#[derive(Debug, Clone)]
pub struct DataLayerEvent {
    pub event: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl DataLayerEvent {
    pub fn named(event: &str) -> Self {
        Self {
            event: event.to_string(),
            data: serde_json::Map::new(),
        }
    }

    pub fn with_data(event: &str, data: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

type Predicate = Arc<dyn Fn(&DataLayerEvent) -> bool + Send + Sync>;
type Callback = Arc<dyn Fn(&DataLayerEvent) + Send + Sync>;

#[derive(Clone)]
struct Subscriber {
    predicate: Predicate,
    callback: Callback,
}

/// The event log plus its subscriber table. Callbacks run on the pushing
/// thread; matching subscribers are cloned out before invocation so a
/// callback may push further entries without deadlocking.
#[derive(Default)]
pub struct DataLayer {
    entries: Mutex<Vec<DataLayerEvent>>,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and synchronously notify matching subscribers.
    pub fn push(&self, event: DataLayerEvent) {
        self.entries.lock().push(event.clone());
        let matching: Vec<Callback> = self
            .subscribers
            .lock()
            .values()
            .filter(|s| (s.predicate)(&event))
            .map(|s| s.callback.clone())
            .collect();
        for callback in matching {
            callback(&event);
        }
    }

    /// Register a subscriber; the callback runs for every future entry the
    /// predicate accepts. Returns a token for [`DataLayer::unsubscribe`].
    pub fn subscribe(
        &self,
        predicate: impl Fn(&DataLayerEvent) -> bool + Send + Sync + 'static,
        callback: impl Fn(&DataLayerEvent) + Send + Sync + 'static,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(
            id,
            Subscriber {
                predicate: Arc::new(predicate),
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Subscribe to entries with an exact event name.
    pub fn subscribe_event(
        &self,
        event_name: &str,
        callback: impl Fn(&DataLayerEvent) + Send + Sync + 'static,
    ) -> u64 {
        let wanted = event_name.to_string();
        self.subscribe(move |e| e.event == wanted, callback)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }

    /// Snapshot of every entry pushed so far, in order.
    pub fn entries(&self) -> Vec<DataLayerEvent> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscriber_sees_matching_entries_only() {
        let layer = DataLayer::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        layer.subscribe_event("purchase", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        layer.push(DataLayerEvent::named("page_view"));
        layer.push(DataLayerEvent::named("purchase"));
        layer.push(DataLayerEvent::named("purchase"));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(layer.len(), 3);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let layer = DataLayer::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = layer.subscribe_event("signup", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        layer.push(DataLayerEvent::named("signup"));
        layer.unsubscribe(id);
        layer.push(DataLayerEvent::named("signup"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_push_reentrantly() {
        let layer = Arc::new(DataLayer::new());
        let inner = layer.clone();
        layer.subscribe_event("purchase", move |_| {
            inner.push(DataLayerEvent::named("purchase_recorded"));
        });

        layer.push(DataLayerEvent::named("purchase"));

        let names: Vec<_> = layer.entries().into_iter().map(|e| e.event).collect();
        assert_eq!(names, vec!["purchase", "purchase_recorded"]);
    }

    #[test]
    fn test_entries_preserve_payload() {
        let layer = DataLayer::new();
        let mut data = serde_json::Map::new();
        data.insert("transaction_id".into(), serde_json::json!("k3x9"));
        layer.push(DataLayerEvent::with_data("mw_ecommerce_transaction", data));

        let entries = layer.entries();
        assert_eq!(entries[0].event, "mw_ecommerce_transaction");
        assert_eq!(entries[0].data["transaction_id"], "k3x9");
    }
}
