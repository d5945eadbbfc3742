//! Download progress notifications
//!
//! A `ProgressBus` lives as long as the session that owns it and is shared by
//! every `download`/`run` call made through that session. Events are
//! dispatched synchronously, in subscription order, to the subscribers
//! registered at the moment the event fires. Nothing is buffered: a
//! subscriber attached later never sees earlier events.

use crate::errors::BinWrapError;
use serde::Serialize;
use std::sync::{Arc, OnceLock, RwLock};
use tokio::sync::mpsc;

/// Snapshot of one in-flight download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRecord {
    /// Size announced by the server, `None` when unknown
    pub total_bytes: Option<u64>,
    pub completed_bytes: u64,
    pub resource_url: String,
}

impl ProgressRecord {
    pub fn is_complete(&self) -> bool {
        self.total_bytes == Some(self.completed_bytes)
    }
}

/// Events published while fetching
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A download batch is starting
    Started,
    Progress(ProgressRecord),
    /// One entry of the batch failed
    Error(BinWrapError),
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

fn remove_listener(inner: &RwLock<Subscribers>, id: SubscriptionId) -> bool {
    let mut subscribers = inner.write().unwrap_or_else(|e| e.into_inner());
    let before = subscribers.listeners.len();
    subscribers.listeners.retain(|(sub, _)| *sub != id);
    subscribers.listeners.len() != before
}

/// Multi-subscriber progress channel
#[derive(Clone, Default)]
pub struct ProgressBus {
    inner: Arc<RwLock<Subscribers>>,
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every subsequent event
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Register a channel receiving every subsequent event.
    ///
    /// The subscription is dropped from the bus once the receiver is gone.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::downgrade(&self.inner);
        let own_id = Arc::new(OnceLock::new());
        let listener_id = own_id.clone();
        let id = self.subscribe(move |event| {
            if tx.send(event.clone()).is_err() {
                if let (Some(inner), Some(id)) = (bus.upgrade(), listener_id.get()) {
                    remove_listener(&inner, *id);
                }
            }
        });
        let _ = own_id.set(id);
        rx
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_listener(&self.inner, id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .listeners
            .len()
    }

    /// Deliver `event` to the current subscribers
    pub fn emit(&self, event: ProgressEvent) {
        // Listeners may (un)subscribe while handling an event
        let listeners: Vec<Listener> = self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record(completed: u64) -> ProgressRecord {
        ProgressRecord {
            total_bytes: Some(10),
            completed_bytes: completed,
            resource_url: "https://example.com/tool.tar.gz".to_string(),
        }
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let bus = ProgressBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe(move |_| seen.lock().unwrap().push(name));
        }

        bus.emit(ProgressEvent::Started);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = ProgressBus::new();
        bus.emit(ProgressEvent::Started);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        bus.emit(ProgressEvent::Progress(record(5)));
        assert_eq!(*seen.lock().unwrap(), vec![ProgressEvent::Progress(record(5))]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = ProgressBus::new();
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let id = bus.subscribe(move |_| *counter.lock().unwrap() += 1);

        bus.emit(ProgressEvent::Started);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(ProgressEvent::Started);

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let bus = ProgressBus::new();
        let handle = bus.clone();
        let mut rx = handle.subscribe_channel();

        bus.emit(ProgressEvent::Progress(record(10)));
        let event = rx.try_recv().unwrap();
        assert_eq!(event, ProgressEvent::Progress(record(10)));
        if let ProgressEvent::Progress(progress) = event {
            assert!(progress.is_complete());
        }
    }

    #[test]
    fn test_channel_subscription_dropped_with_receiver() {
        let bus = ProgressBus::new();
        let rx = bus.subscribe_channel();
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx);
        bus.emit(ProgressEvent::Started);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
