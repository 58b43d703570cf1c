//! The mirror loop: inbound handling, deferred dispatch, and lifecycle.

use crate::error::{MirrorError, Result};
use crate::protocol::{Envelope, FrameCodec, Inbound, Payload};
use crate::remote::{FramedObserver, RemoteStore};
use crate::store::StateStore;
use crate::types::{ListenerId, ObserverId, Selector};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

use super::registry::ObserverRegistry;
use super::types::{MirrorConfig, SubscriptionInfo, TurnStats};

/// Tag of the standing listener a mirror registers on its store.
///
/// Only one mirror listener exists per store: installing a new mirror
/// removes the previous one's.
pub const MIRROR_LISTENER_TAG: &str = "store-mirror";

/// Cloneable handle for attaching observers to a mirror.
#[derive(Clone)]
pub struct Connector {
    registry: Arc<ObserverRegistry>,
    inbound: Sender<Envelope>,
    buffer_size: usize,
    codec: FrameCodec,
}

impl Connector {
    /// Connect an in-process observer.
    pub fn connect(&self) -> RemoteStore {
        let (sender, receiver) = bounded(self.buffer_size);
        let id = self.registry.register(sender);
        RemoteStore::new(id, self.inbound.clone(), receiver, Arc::clone(&self.registry))
    }

    /// Connect an observer that speaks encoded frames.
    pub fn connect_framed(&self) -> FramedObserver {
        let (sender, receiver) = bounded(self.buffer_size);
        let id = self.registry.register(sender);
        FramedObserver::new(
            id,
            self.inbound.clone(),
            receiver,
            self.codec,
            Arc::clone(&self.registry),
        )
    }
}

/// Mirrors one authoritative store to any number of observers.
///
/// The mirror is driven by its owner: call [`turn`](Self::turn) from the
/// primary loop, or hand the mirror to a thread with [`spawn`](Self::spawn).
/// Each turn drains pending inbound messages, then applies the actions they
/// carried. Subscriptions take effect as soon as their message is handled.
pub struct MirrorChannel<S: StateStore + ?Sized> {
    store: Arc<S>,
    registry: Arc<ObserverRegistry>,
    connector: Connector,
    inbound: Receiver<Envelope>,
    /// Actions waiting for the idle tick.
    deferred: VecDeque<(ObserverId, Value)>,
    /// Standing listener on the store.
    listener: Option<ListenerId>,
    codec: FrameCodec,
    config: MirrorConfig,
}

impl<S: StateStore + ?Sized> MirrorChannel<S> {
    /// Install a mirror on a store.
    ///
    /// Replaces the listener of any mirror previously installed on the
    /// same store, so observers of the old mirror stop receiving snapshots.
    /// A `max_messages_per_turn` of zero is raised to one.
    pub fn install(store: Arc<S>, mut config: MirrorConfig) -> Self {
        config.max_messages_per_turn = config.max_messages_per_turn.max(1);
        let registry = Arc::new(ObserverRegistry::new());
        let (sender, receiver) = match config.inbound_buffer {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };

        let fan_out = Arc::clone(&registry);
        let listener = store.subscribe_exclusive(
            MIRROR_LISTENER_TAG,
            Arc::new(move |state: &Arc<Value>| fan_out.broadcast(state)),
        );

        let codec = FrameCodec::new(config.encoding);
        let connector = Connector {
            registry: Arc::clone(&registry),
            inbound: sender,
            buffer_size: config.buffer_size,
            codec,
        };

        debug!(listener = ?listener, "mirror installed");

        Self {
            store,
            registry,
            connector,
            inbound: receiver,
            deferred: VecDeque::new(),
            listener: Some(listener),
            codec,
            config,
        }
    }

    /// Install a mirror with default configuration.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::install(store, MirrorConfig::default())
    }

    /// Connect an in-process observer.
    pub fn connect(&self) -> RemoteStore {
        self.connector.connect()
    }

    /// Connect an observer that speaks encoded frames.
    pub fn connect_framed(&self) -> FramedObserver {
        self.connector.connect_framed()
    }

    /// Get a connector usable from other threads.
    pub fn connector(&self) -> Connector {
        self.connector.clone()
    }

    /// The mirrored store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get connected observer count.
    pub fn observer_count(&self) -> usize {
        self.registry.observer_count()
    }

    /// Get count of observers with an active subscription.
    pub fn subscription_count(&self) -> usize {
        self.registry.subscription_count()
    }

    /// Get an observer's subscription.
    pub fn subscription(&self, id: ObserverId) -> Option<SubscriptionInfo> {
        self.registry.subscription(id)
    }

    /// Actions received but not yet applied.
    pub fn pending_actions(&self) -> usize {
        self.deferred.len()
    }

    /// Run one turn: drain up to `max_messages_per_turn` inbound messages,
    /// then apply the actions they carried, in arrival order.
    pub fn turn(&mut self) -> TurnStats {
        self.run_turn(None)
    }

    /// Run turns until `shutdown` is set, waiting for inbound traffic
    /// between turns.
    pub fn run_until(&mut self, shutdown: &AtomicBool) {
        debug!("mirror loop started");

        while !shutdown.load(Ordering::SeqCst) {
            match self.inbound.recv_timeout(self.config.idle_timeout) {
                Ok(envelope) => {
                    let stats = self.run_turn(Some(envelope));
                    trace!(?stats, "turn");
                }
                // The mirror's own connector keeps the queue open, so only
                // the shutdown flag ends the loop
                Err(_) => continue,
            }
        }

        debug!("mirror loop stopped");
    }

    fn run_turn(&mut self, first: Option<Envelope>) -> TurnStats {
        let mut stats = TurnStats::default();

        if let Some(envelope) = first {
            self.handle(envelope, &mut stats);
        }

        while stats.messages < self.config.max_messages_per_turn {
            match self.inbound.try_recv() {
                Ok(envelope) => self.handle(envelope, &mut stats),
                Err(_) => break,
            }
        }

        self.flush_deferred(&mut stats);
        stats
    }

    fn handle(&mut self, envelope: Envelope, stats: &mut TurnStats) {
        stats.messages += 1;
        let Envelope { observer, payload } = envelope;

        let message = match payload {
            Payload::Message(message) => message,
            Payload::Frame(frame) => match self.codec.decode_inbound(&frame) {
                Ok(message) => message,
                Err(e) => {
                    stats.malformed += 1;
                    debug!(observer = %observer, error = %e, "dropping malformed frame");
                    return;
                }
            },
        };

        trace!(observer = %observer, kind = message.kind(), "inbound");

        match message {
            Inbound::DispatchAction { action } => {
                self.deferred.push_back((observer, action));
            }
            Inbound::SubscribeStore { sub_store_key } => {
                let selector = Selector::from_key(sub_store_key);
                let store = &self.store;
                if let Err(e) = self
                    .registry
                    .subscribe(observer, selector, || store.get_state())
                {
                    debug!(observer = %observer, error = %e, "ignoring subscribe");
                }
            }
            Inbound::Unsubscribe => {
                if let Err(e) = self.registry.unsubscribe(observer) {
                    debug!(observer = %observer, error = %e, "ignoring unsubscribe");
                }
            }
            Inbound::Disconnect => {
                self.registry.remove(observer);
            }
        }
    }

    /// Idle tick: apply deferred actions.
    ///
    /// Rejected actions are dropped; the sender is not told.
    fn flush_deferred(&mut self, stats: &mut TurnStats) {
        while let Some((observer, action)) = self.deferred.pop_front() {
            match self.store.dispatch_value(action) {
                Ok(_) => stats.dispatched += 1,
                Err(e) => {
                    stats.rejected += 1;
                    debug!(observer = %observer, error = %e, "dropping rejected action");
                }
            }
        }
    }
}

impl<S: StateStore + ?Sized + 'static> MirrorChannel<S> {
    /// Move the mirror loop onto its own thread.
    pub fn spawn(self) -> Result<MirrorHandle<S>> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let connector = self.connector();

        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("store-mirror".into())
            .spawn(move || {
                let mut mirror = self;
                mirror.run_until(&flag);
                mirror
            })?;

        Ok(MirrorHandle {
            shutdown,
            thread: Some(thread),
            connector,
        })
    }
}

impl<S: StateStore + ?Sized> Drop for MirrorChannel<S> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.store.unsubscribe(listener);
        }
        // Closes every observer's receiving end
        self.registry.clear();
    }
}

/// Handle to a mirror running on its own thread.
pub struct MirrorHandle<S: StateStore + ?Sized> {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<MirrorChannel<S>>>,
    connector: Connector,
}

impl<S: StateStore + ?Sized> MirrorHandle<S> {
    /// Connect an in-process observer.
    pub fn connect(&self) -> RemoteStore {
        self.connector.connect()
    }

    /// Connect an observer that speaks encoded frames.
    pub fn connect_framed(&self) -> FramedObserver {
        self.connector.connect_framed()
    }

    /// Get a connector usable from other threads.
    pub fn connector(&self) -> Connector {
        self.connector.clone()
    }

    /// Stop the loop and take the mirror back.
    pub fn shutdown(mut self) -> Result<MirrorChannel<S>> {
        self.shutdown.store(true, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| MirrorError::ThreadPanicked),
            None => Err(MirrorError::ThreadPanicked),
        }
    }
}

impl<S: StateStore + ?Sized> Drop for MirrorHandle<S> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
