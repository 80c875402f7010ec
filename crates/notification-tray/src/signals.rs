//! Publish/subscribe channel for tray signals.
//!
//! Handlers are keyed by [`SignalName`] and run synchronously on publish.
//! Every published signal is also forwarded to a broadcast feed for async
//! observers. Signals are dispatched strictly in publish order: a signal
//! published from inside a handler waits until the current one has reached
//! every handler and the feed.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::item::ItemSnapshot;
use crate::lock;

const EVENT_CHANNEL_CAPACITY: usize = 256;

// -- Signal names --

pub const BUSY_CHANGE: &str = "busy-change";
pub const ADD: &str = "add";
pub const REMOVE: &str = "remove";
pub const DISMISS: &str = "dismiss";

/// Key a handler subscribes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalName {
    BusyChange,
    Add,
    Remove,
    Dismiss,
}

impl SignalName {
    pub const ALL: [Self; 4] = [Self::BusyChange, Self::Add, Self::Remove, Self::Dismiss];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BusyChange => BUSY_CHANGE,
            Self::Add => ADD,
            Self::Remove => REMOVE,
            Self::Dismiss => DISMISS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum TraySignal {
    /// The busy lock toggled.
    BusyChange(bool),
    /// An add pass settled.
    Add(ItemSnapshot),
    /// A remove pass settled; the item is detached.
    Remove(ItemSnapshot),
    /// The close affordance triggered an eviction.
    Dismiss(ItemSnapshot),
}

impl TraySignal {
    pub fn name(&self) -> SignalName {
        match self {
            Self::BusyChange(_) => SignalName::BusyChange,
            Self::Add(_) => SignalName::Add,
            Self::Remove(_) => SignalName::Remove,
            Self::Dismiss(_) => SignalName::Dismiss,
        }
    }
}

type Handler = Arc<dyn Fn(&TraySignal) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<SignalName, Vec<(u64, Handler)>>,
}

/// Signals waiting for dispatch.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<TraySignal>,
    /// A publish call is currently draining the queue.
    dispatching: bool,
}

/// Clears the dispatching flag if a handler panics mid-drain, so later
/// publishes are not swallowed.
struct ResetOnPanic<'a>(&'a Mutex<Outbox>);

impl Drop for ResetOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).dispatching = false;
        }
    }
}

/// Signal channel owned by a tray.
#[derive(Clone)]
pub struct SignalBus {
    registry: Arc<Mutex<Registry>>,
    outbox: Arc<Mutex<Outbox>>,
    events: broadcast::Sender<TraySignal>,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("receivers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SignalBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            outbox: Arc::new(Mutex::new(Outbox::default())),
            events,
        }
    }

    /// Register `handler` for one signal name.
    pub fn subscribe<F>(&self, name: SignalName, handler: F) -> Subscription
    where
        F: Fn(&TraySignal) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(name)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            name,
            id,
        }
    }

    /// Deliver a signal to its handlers, then to the broadcast feed.
    ///
    /// Handlers run without any bus lock held, so they may subscribe,
    /// unsubscribe or call back into the tray. A signal published while
    /// another is being dispatched is queued behind it and delivered by the
    /// outer call before it returns.
    pub fn publish(&self, signal: &TraySignal) {
        {
            let mut outbox = lock(&self.outbox);
            outbox.queue.push_back(signal.clone());
            if outbox.dispatching {
                return;
            }
            outbox.dispatching = true;
        }

        let _reset = ResetOnPanic(&self.outbox);
        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.dispatching = false;
                        return;
                    }
                }
            };
            self.dispatch(&next);
        }
    }

    fn dispatch(&self, signal: &TraySignal) {
        let handlers: Vec<Handler> = lock(&self.registry)
            .handlers
            .get(&signal.name())
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(signal);
        }

        // No receivers is fine
        let _ = self.events.send(signal.clone());
    }

    /// Async feed of every published signal.
    pub fn events(&self) -> broadcast::Receiver<TraySignal> {
        self.events.subscribe()
    }

    pub fn handler_count(&self, name: SignalName) -> usize {
        lock(&self.registry)
            .handlers
            .get(&name)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`SignalBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    name: SignalName,
    id: u64,
}

impl Subscription {
    pub fn name(&self) -> SignalName {
        self.name
    }

    /// Remove the handler. Returns `false` if the bus is already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = lock(&registry);
        let Some(list) = registry.handlers.get_mut(&self.name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != self.id);
        list.len() < before
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[test]
    fn test_signal_names_round_trip() {
        for name in SignalName::ALL {
            assert_eq!(SignalName::from_name(name.as_str()), Some(name));
        }
        assert_eq!(SignalName::from_name("resize"), None);
        assert_eq!(TraySignal::BusyChange(true).name(), SignalName::BusyChange);
    }

    #[test]
    fn test_publish_reaches_only_matching_handlers() {
        let bus = SignalBus::new();
        let busy_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&busy_hits);
        let _busy = bus.subscribe(SignalName::BusyChange, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        let _add = bus.subscribe(SignalName::Add, |_| panic!("add handler must not run"));

        bus.publish(&TraySignal::BusyChange(true));
        bus.publish(&TraySignal::BusyChange(false));
        assert_eq!(busy_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = SignalBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = bus.subscribe(SignalName::BusyChange, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.handler_count(SignalName::BusyChange), 1);

        assert!(sub.unsubscribe());
        bus.publish(&TraySignal::BusyChange(true));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.handler_count(SignalName::BusyChange), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = SignalBus::new();
        let inner = bus.clone();
        let _sub = bus.subscribe(SignalName::BusyChange, move |_| {
            let _ = inner.subscribe(SignalName::Add, |_| {});
        });

        bus.publish(&TraySignal::BusyChange(true));
        assert_eq!(bus.handler_count(SignalName::Add), 1);
    }

    #[test]
    fn test_nested_publish_is_delivered_after_current_signal() {
        let bus = SignalBus::new();
        let mut rx = bus.events();

        let inner = bus.clone();
        let _toggle = bus.subscribe(SignalName::BusyChange, move |signal| {
            if *signal == TraySignal::BusyChange(false) {
                inner.publish(&TraySignal::BusyChange(true));
            }
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let _observer = bus.subscribe(SignalName::BusyChange, move |signal| {
            if let TraySignal::BusyChange(busy) = signal {
                lock(&record).push(*busy);
            }
        });

        bus.publish(&TraySignal::BusyChange(false));

        assert_eq!(*lock(&seen), vec![false, true]);
        assert_eq!(rx.try_recv().ok(), Some(TraySignal::BusyChange(false)));
        assert_eq!(rx.try_recv().ok(), Some(TraySignal::BusyChange(true)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_feed_receives_signals() {
        let bus = SignalBus::new();
        let mut rx = bus.events();
        bus.publish(&TraySignal::BusyChange(true));
        assert_eq!(rx.try_recv().ok(), Some(TraySignal::BusyChange(true)));
    }

    #[test]
    fn test_signal_json_shape() {
        let value = serde_json::to_value(TraySignal::BusyChange(false)).expect("serialize");
        assert_eq!(value, json!({ "type": "busy-change", "data": false }));
    }
}
