//! Observer registry: endpoints, their subscriptions, and snapshot fan-out.

use crate::error::{MirrorError, Result};
use crate::protocol::Outbound;
use crate::types::{ObserverId, Selector};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::types::{DropReason, SubscriptionInfo};

/// Internal per-observer state.
struct Observer {
    sender: Sender<Outbound>,
    /// Current subscription, if any.
    selector: Option<Selector>,
    /// Bumped on every (re)subscribe so stale drops can be detected.
    generation: u64,
}

impl Observer {
    /// Try to push a snapshot. Never blocks.
    fn try_push(&self, snapshot: Value) -> std::result::Result<(), DropReason> {
        match self.sender.try_send(Outbound::StateChange { snapshot }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DropReason::BufferOverflow),
            Err(TrySendError::Disconnected(_)) => Err(DropReason::Disconnected),
        }
    }
}

/// Tracks connected observers and pushes snapshots to subscribed ones.
///
/// At most one subscription exists per observer: subscribing again replaces
/// the previous selector.
pub struct ObserverRegistry {
    /// Connected observers by ID.
    observers: RwLock<HashMap<ObserverId, Observer>>,
    /// Counter for generating observer IDs.
    next_id: AtomicU64,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer endpoint. It starts unsubscribed.
    pub fn register(&self, sender: Sender<Outbound>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let observer = Observer {
            sender,
            selector: None,
            generation: 0,
        };

        self.observers.write().insert(id, observer);
        debug!(observer = %id, "observer connected");

        id
    }

    /// Remove an observer and its subscription.
    ///
    /// Dropping the sender closes the observer's receiving end.
    pub fn remove(&self, id: ObserverId) -> bool {
        let removed = self.observers.write().remove(&id).is_some();
        if removed {
            debug!(observer = %id, "observer removed");
        }
        removed
    }

    /// Subscribe (or resubscribe) an observer and push its first snapshot.
    ///
    /// `current` is read while the registry is locked, so a store change
    /// racing with this call is either already reflected in the first
    /// snapshot or pushed after it under the new selector.
    pub fn subscribe<F>(&self, id: ObserverId, selector: Selector, current: F) -> Result<()>
    where
        F: FnOnce() -> Arc<Value>,
    {
        let mut observers = self.observers.write();
        let observer = observers
            .get_mut(&id)
            .ok_or(MirrorError::ObserverNotFound(id))?;

        if let Some(previous) = &observer.selector {
            trace!(observer = %id, from = %previous, to = %selector, "replacing subscription");
        }

        let snapshot = selector.select(&current());
        observer.selector = Some(selector);
        observer.generation += 1;

        if let Err(reason) = observer.try_push(snapshot) {
            Self::drop_locked(&mut observers, id, reason);
        }

        Ok(())
    }

    /// Drop an observer's subscription but keep its endpoint.
    pub fn unsubscribe(&self, id: ObserverId) -> Result<()> {
        let mut observers = self.observers.write();
        let observer = observers
            .get_mut(&id)
            .ok_or(MirrorError::ObserverNotFound(id))?;

        observer.selector = None;
        observer.generation += 1;
        debug!(observer = %id, "unsubscribed");

        Ok(())
    }

    /// Push the selector-scoped view of `state` to every subscribed observer.
    ///
    /// Every subscriber gets a push, whether or not its sub-tree changed.
    /// Observers whose endpoint is gone or whose buffer is full are dropped;
    /// nothing is retried.
    pub fn broadcast(&self, state: &Value) {
        let mut failed = Vec::new();

        {
            let observers = self.observers.read();
            // Observers sharing a selector share one computed snapshot
            let mut views: HashMap<&Selector, Value> = HashMap::new();

            for (id, observer) in observers.iter() {
                let Some(selector) = &observer.selector else {
                    continue;
                };

                let snapshot = views
                    .entry(selector)
                    .or_insert_with(|| selector.select(state))
                    .clone();

                if let Err(reason) = observer.try_push(snapshot) {
                    failed.push((*id, observer.generation, reason));
                }
            }
        }

        if !failed.is_empty() {
            let mut observers = self.observers.write();
            for (id, generation, reason) in failed {
                // Skip observers that resubscribed since the failed push
                let current = observers.get(&id).map(|o| o.generation);
                if current == Some(generation) {
                    Self::drop_locked(&mut observers, id, reason);
                }
            }
        }
    }

    fn drop_locked(
        observers: &mut HashMap<ObserverId, Observer>,
        id: ObserverId,
        reason: DropReason,
    ) {
        match reason {
            DropReason::Disconnected => {
                observers.remove(&id);
                debug!(observer = %id, "observer endpoint gone, pruned");
            }
            DropReason::BufferOverflow => {
                if let Some(observer) = observers.get_mut(&id) {
                    observer.selector = None;
                    observer.generation += 1;
                }
                warn!(observer = %id, "observer buffer full, subscription dropped");
            }
        }
    }

    /// Get the subscription of an observer.
    ///
    /// Returns `None` for unknown observers.
    pub fn subscription(&self, id: ObserverId) -> Option<SubscriptionInfo> {
        self.observers.read().get(&id).map(|o| SubscriptionInfo {
            observer: id,
            selector: o.selector.clone(),
        })
    }

    /// Get connected observer count.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Get count of observers with an active subscription.
    pub fn subscription_count(&self) -> usize {
        self.observers
            .read()
            .values()
            .filter(|o| o.selector.is_some())
            .count()
    }

    /// Remove every observer.
    pub fn clear(&self) {
        self.observers.write().clear();
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
