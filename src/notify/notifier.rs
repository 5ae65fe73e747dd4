//! # Change Notifier
//!
//! Post-commit fan-out of change events to listeners.
//!
//! - `publish` never blocks the committing writer: it enqueues and returns
//! - A dedicated dispatcher thread delivers each event to every listener
//!   whose prefix matches the event URI
//! - Delivery is best effort; ordering across events is not guaranteed
//! - A panicking callback is logged and does not affect other listeners

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::event::{ChangeEvent, ChangeKind};
use crate::errors::{RegistryError, RegistryResult};
use crate::observability::{log_event, log_event_with_fields, Event, StoreMetrics};

/// Identifies one listener
pub type SubscriptionId = Uuid;

/// Receiving half of a channel subscription
pub type EventReceiver = mpsc::UnboundedReceiver<ChangeEvent>;

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<ChangeEvent>),
}

#[derive(Clone)]
struct Listener {
    id: SubscriptionId,
    prefix: String,
    sink: Sink,
}

impl Listener {
    fn matches(&self, uri: &str) -> bool {
        uri.starts_with(&self.prefix)
    }
}

type Listeners = Arc<RwLock<Vec<Listener>>>;

/// Outcome of delivering one event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    /// Listeners whose prefix matched
    pub matched: usize,
    pub delivered: usize,
    /// Callbacks that panicked or channels whose receiver was dropped
    pub failed: usize,
}

/// Fan-out point between the store and its collaborators
pub struct ChangeNotifier {
    sequence: AtomicU64,
    /// `None` when disabled or shut down
    sender: Mutex<Option<mpsc::UnboundedSender<ChangeEvent>>>,
    listeners: Listeners,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<StoreMetrics>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ChangeNotifier {
    /// Start a notifier with its dispatcher thread
    pub fn start(metrics: Arc<StoreMetrics>) -> RegistryResult<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChangeEvent>();
        let listeners: Listeners = Arc::new(RwLock::new(Vec::new()));

        let worker_listeners = Arc::clone(&listeners);
        let worker_metrics = Arc::clone(&metrics);
        let handle = thread::Builder::new()
            .name("regstore-notify".into())
            .spawn(move || {
                log_event(Event::DispatcherStarted);
                while let Some(event) = rx.blocking_recv() {
                    let result = dispatch(&worker_listeners, &event);
                    for _ in 0..result.delivered {
                        worker_metrics.increment_delivered();
                    }
                }
                log_event(Event::DispatcherStopped);
            })?;

        Ok(Self {
            sequence: AtomicU64::new(0),
            sender: Mutex::new(Some(tx)),
            listeners,
            dispatcher: Mutex::new(Some(handle)),
            metrics,
        })
    }

    /// A notifier that accepts subscriptions but never delivers
    pub fn disabled(metrics: Arc<StoreMetrics>) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            sender: Mutex::new(None),
            listeners: Arc::new(RwLock::new(Vec::new())),
            dispatcher: Mutex::new(None),
            metrics,
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Enqueue an event for `uri`. Returns the event, or `None` when the
    /// notifier is not running.
    pub fn publish(&self, uri: &str, kind: ChangeKind) -> Option<ChangeEvent> {
        let sender = self.sender.lock().ok()?;
        let tx = sender.as_ref()?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let event = ChangeEvent::new(sequence, uri, kind);
        match tx.send(event.clone()) {
            Ok(()) => {
                self.metrics.increment_published();
                Some(event)
            }
            Err(_) => None,
        }
    }

    /// Call `callback` for every event whose URI starts with `prefix`.
    ///
    /// Callbacks run on the dispatcher thread and must not block for long.
    pub fn subscribe<F>(&self, prefix: impl Into<String>, callback: F) -> RegistryResult<SubscriptionId>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.add_listener(prefix.into(), Sink::Callback(Arc::new(callback)))
    }

    /// Receive events whose URI starts with `prefix` on a channel
    pub fn subscribe_channel(
        &self,
        prefix: impl Into<String>,
    ) -> RegistryResult<(SubscriptionId, EventReceiver)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.add_listener(prefix.into(), Sink::Channel(tx))?;
        Ok((id, rx))
    }

    fn add_listener(&self, prefix: String, sink: Sink) -> RegistryResult<SubscriptionId> {
        let id = Uuid::new_v4();
        let mut listeners = self
            .listeners
            .write()
            .map_err(|_| RegistryError::internal("Lock poisoned"))?;
        listeners.push(Listener { id, prefix, sink });
        Ok(id)
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.listeners.write() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|l| l.id != id);
                listeners.len() != before
            }
            Err(_) => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Stop accepting events and wait for queued ones to be delivered
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = self.dispatcher.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Deliver one event to every matching listener
fn dispatch(listeners: &Listeners, event: &ChangeEvent) -> DispatchResult {
    let mut result = DispatchResult::default();

    // Snapshot so callbacks may subscribe or unsubscribe without deadlock
    let matching: Vec<Listener> = match listeners.read() {
        Ok(all) => all.iter().filter(|l| l.matches(&event.uri)).cloned().collect(),
        Err(_) => return result,
    };
    result.matched = matching.len();

    let mut closed = Vec::new();
    for listener in matching {
        match &listener.sink {
            Sink::Callback(callback) => {
                match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                    Ok(()) => result.delivered += 1,
                    Err(_) => {
                        result.failed += 1;
                        log_event_with_fields(
                            Event::ListenerPanicked,
                            &[("listener", &listener.id.to_string()), ("uri", &event.uri)],
                        );
                    }
                }
            }
            Sink::Channel(tx) => match tx.send(event.clone()) {
                Ok(()) => result.delivered += 1,
                Err(_) => {
                    result.failed += 1;
                    closed.push(listener.id);
                }
            },
        }
    }

    if !closed.is_empty() {
        if let Ok(mut all) = listeners.write() {
            all.retain(|l| !closed.contains(&l.id));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn notifier() -> ChangeNotifier {
        ChangeNotifier::start(Arc::new(StoreMetrics::new())).unwrap()
    }

    #[test]
    fn test_prefix_filtering() {
        let n = notifier();
        let (tx, rx) = std_mpsc::channel();
        let tx = Mutex::new(tx);
        n.subscribe("http://example.com/reg1", move |e| {
            let _ = tx.lock().unwrap().send(e.uri.clone());
        })
        .unwrap();

        n.publish("http://example.com/reg2/_x", ChangeKind::Created);
        n.publish("http://example.com/reg1/_red", ChangeKind::Updated);

        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, "http://example.com/reg1/_red");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_panicking_listener_isolated() {
        let n = notifier();
        n.subscribe("", |_| panic!("listener failure")).unwrap();
        let (tx, rx) = std_mpsc::channel();
        let tx = Mutex::new(tx);
        n.subscribe("", move |e| {
            let _ = tx.lock().unwrap().send(e.sequence);
        })
        .unwrap();

        n.publish("http://example.com/a", ChangeKind::Created);
        n.publish("http://example.com/b", ChangeKind::Created);

        let mut seen = vec![
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        ];
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let n = notifier();
        let id = n.subscribe("", |_| {}).unwrap();
        assert_eq!(n.listener_count(), 1);
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
        assert_eq!(n.listener_count(), 0);
    }

    #[test]
    fn test_dropped_channel_listener_pruned() {
        let n = notifier();
        let (_, rx) = n.subscribe_channel("").unwrap();
        drop(rx);
        n.publish("http://example.com/a", ChangeKind::Created);
        n.shutdown();
        assert_eq!(n.listener_count(), 0);
    }

    #[test]
    fn test_disabled_notifier_drops_events() {
        let n = ChangeNotifier::disabled(Arc::new(StoreMetrics::new()));
        assert!(!n.is_running());
        assert!(n.publish("http://example.com/a", ChangeKind::Created).is_none());
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let metrics = Arc::new(StoreMetrics::new());
        let n = ChangeNotifier::start(Arc::clone(&metrics)).unwrap();
        let (_, mut rx) = n.subscribe_channel("http://example.com/").unwrap();
        for i in 0..10 {
            n.publish(&format!("http://example.com/{}", i), ChangeKind::Created);
        }
        n.shutdown();
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 10);
        assert_eq!(metrics.snapshot().notifications_delivered, 10);
        assert!(n.publish("http://example.com/late", ChangeKind::Created).is_none());
    }
}
