//! The authoritative state store.

use crate::error::Result;
use crate::types::{Action, ListenerId};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::reducer::Reducer;

/// Callback invoked with the new state after every dispatch.
pub type Listener = Arc<dyn Fn(&Arc<Value>) + Send + Sync>;

/// The store collaborator a mirror is installed on.
pub trait StateStore: Send + Sync {
    /// Current state tree.
    fn get_state(&self) -> Arc<Value>;

    /// Apply an action and notify listeners.
    fn dispatch(&self, action: Action) -> Result<Arc<Value>>;

    /// Validate an untyped value as an action, then dispatch it.
    fn dispatch_value(&self, value: Value) -> Result<Arc<Value>> {
        let action = Action::from_value(value)?;
        self.dispatch(action)
    }

    /// Register a listener.
    fn subscribe(&self, listener: Listener) -> ListenerId;

    /// Register a listener under `tag`, removing any listener previously
    /// registered with the same tag.
    fn subscribe_exclusive(&self, tag: &'static str, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

struct Registered {
    id: ListenerId,
    tag: Option<&'static str>,
    listener: Listener,
}

/// Single-writer state container.
///
/// The tree is immutable: each dispatch swaps in a new `Arc`, so every
/// dispatch is a change as far as listeners are concerned, whether or not
/// the reducer altered anything.
pub struct Store<R: Reducer> {
    /// Current state.
    state: RwLock<Arc<Value>>,

    /// Transition function.
    reducer: R,

    /// Listeners in registration order.
    listeners: RwLock<Vec<Registered>>,

    /// Counter for generating listener IDs.
    next_listener: AtomicU64,

    /// Number of successful dispatches.
    version: AtomicU64,

    /// Serializes dispatches so listeners observe transitions in order.
    dispatch_lock: Mutex<()>,
}

impl<R: Reducer> Store<R> {
    /// Create a store with an initial state tree.
    pub fn new(initial: Value, reducer: R) -> Self {
        Self {
            state: RwLock::new(Arc::new(initial)),
            reducer,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            version: AtomicU64::new(0),
            dispatch_lock: Mutex::new(()),
        }
    }

    /// Number of successful dispatches so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Get listener count.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn register(&self, tag: Option<&'static str>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        let mut listeners = self.listeners.write();

        if let Some(tag) = tag {
            let before = listeners.len();
            listeners.retain(|l| l.tag != Some(tag));
            if listeners.len() != before {
                trace!(tag, "replaced tagged listener");
            }
        }

        listeners.push(Registered { id, tag, listener });
        id
    }
}

impl<R: Reducer> StateStore for Store<R> {
    fn get_state(&self) -> Arc<Value> {
        Arc::clone(&self.state.read())
    }

    /// Listeners run on the dispatching thread after the state lock is
    /// released. They must not dispatch.
    fn dispatch(&self, action: Action) -> Result<Arc<Value>> {
        let _lock = self.dispatch_lock.lock();

        let current = self.get_state();
        let next = Arc::new(self.reducer.reduce(&current, &action)?);
        *self.state.write() = Arc::clone(&next);
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;

        trace!(action = %action.action_type, version, "dispatched");

        // Snapshot the listener list so listeners may unsubscribe themselves
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|l| Arc::clone(&l.listener))
            .collect();

        for listener in listeners {
            listener(&next);
        }

        Ok(next)
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        self.register(None, listener)
    }

    fn subscribe_exclusive(&self, tag: &'static str, listener: Listener) -> ListenerId {
        self.register(Some(tag), listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }
}
