//! Observer-side endpoints.
//!
//! A [`RemoteStore`] is what a secondary window holds instead of the store:
//! it keeps the last snapshot the primary pushed and forwards actions back
//! as `dispatchAction` messages. A [`FramedObserver`] is the same endpoint
//! for byte transports.

use crate::error::{MirrorError, Result};
use crate::mirror::ObserverRegistry;
use crate::protocol::{Envelope, FrameCodec, Inbound, Outbound, Payload};
use crate::types::{Action, ObserverId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Read-only mirror of the primary's state, plus a dispatch entry point.
pub struct RemoteStore {
    id: ObserverId,
    /// To the primary.
    outbound: Sender<Envelope>,
    /// From the primary.
    inbound: Receiver<Outbound>,
    /// Last snapshot received.
    state: Value,
    /// Registry this endpoint was registered in.
    registry: Arc<ObserverRegistry>,
}

impl RemoteStore {
    pub(crate) fn new(
        id: ObserverId,
        outbound: Sender<Envelope>,
        inbound: Receiver<Outbound>,
        registry: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            id,
            outbound,
            inbound,
            state: Value::Object(Map::new()),
            registry,
        }
    }

    /// This observer's ID.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    fn send(&self, message: Inbound) -> Result<()> {
        self.outbound
            .send(Envelope {
                observer: self.id,
                payload: Payload::Message(message),
            })
            .map_err(|_| MirrorError::Disconnected)
    }

    /// Subscribe to the whole tree (`None`) or one sub-tree.
    ///
    /// Replaces any earlier subscription of this observer.
    pub fn subscribe_store(&self, key: Option<&str>) -> Result<()> {
        self.send(Inbound::SubscribeStore {
            sub_store_key: key.map(str::to_string),
        })
    }

    /// Stop receiving snapshots.
    pub fn unsubscribe(&self) -> Result<()> {
        self.send(Inbound::Unsubscribe)
    }

    /// Forward an action to the primary.
    ///
    /// Its effect shows up only in later snapshots.
    pub fn dispatch(&self, action: &Action) -> Result<()> {
        self.send(Inbound::DispatchAction {
            action: action.to_value(),
        })
    }

    /// Forward an untyped action. The primary's store validates it.
    pub fn dispatch_value(&self, action: Value) -> Result<()> {
        self.send(Inbound::DispatchAction { action })
    }

    /// Last snapshot applied by [`sync`](Self::sync) or
    /// [`next_state`](Self::next_state). `{}` before the first one.
    pub fn get_state(&self) -> &Value {
        &self.state
    }

    /// Apply every pending snapshot. Returns how many were applied.
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(Outbound::StateChange { snapshot }) = self.inbound.try_recv() {
            self.state = snapshot;
            applied += 1;
        }
        applied
    }

    /// Wait for the next snapshot and apply it.
    pub fn next_state(&mut self, timeout: Duration) -> std::result::Result<&Value, RecvTimeoutError> {
        let Outbound::StateChange { snapshot } = self.inbound.recv_timeout(timeout)?;
        self.state = snapshot;
        Ok(&self.state)
    }

    /// Receive the next raw message (blocking). Does not touch `get_state`.
    pub fn recv(&self) -> std::result::Result<Outbound, RecvError> {
        self.inbound.recv()
    }

    /// Try to receive a raw message (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<Outbound, TryRecvError> {
        self.inbound.try_recv()
    }

    /// Receive a raw message with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Outbound, RecvTimeoutError> {
        self.inbound.recv_timeout(timeout)
    }
}

/// Leave the registry directly, then tell the primary. The message may be
/// lost when a bounded inbound queue is full; the removal is not.
fn disconnect(registry: &ObserverRegistry, outbound: &Sender<Envelope>, id: ObserverId) {
    registry.remove(id);
    let _ = outbound.try_send(Envelope {
        observer: id,
        payload: Payload::Message(Inbound::Disconnect),
    });
}

impl Drop for RemoteStore {
    fn drop(&mut self) {
        disconnect(&self.registry, &self.outbound, self.id);
    }
}

/// Observer endpoint exchanging encoded frames.
pub struct FramedObserver {
    id: ObserverId,
    outbound: Sender<Envelope>,
    inbound: Receiver<Outbound>,
    codec: FrameCodec,
    registry: Arc<ObserverRegistry>,
}

impl FramedObserver {
    pub(crate) fn new(
        id: ObserverId,
        outbound: Sender<Envelope>,
        inbound: Receiver<Outbound>,
        codec: FrameCodec,
        registry: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            id,
            outbound,
            inbound,
            codec,
            registry,
        }
    }

    /// This observer's ID.
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Codec frames must be encoded with.
    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    /// Hand a frame to the primary. It is decoded there; frames that fail
    /// to decode are dropped without reply.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        self.outbound
            .send(Envelope {
                observer: self.id,
                payload: Payload::Frame(frame),
            })
            .map_err(|_| MirrorError::Disconnected)
    }

    /// Encode and send a message.
    pub fn send(&self, message: &Inbound) -> Result<()> {
        let frame = self.codec.encode_inbound(message)?;
        self.send_frame(frame)
    }

    /// Wait for the next pushed message, encoded. `None` on timeout.
    pub fn recv_frame(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match self.inbound.recv_timeout(timeout) {
            Ok(message) => Ok(Some(self.codec.encode_outbound(&message)?)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(MirrorError::Disconnected),
        }
    }
}

impl Drop for FramedObserver {
    fn drop(&mut self) {
        disconnect(&self.registry, &self.outbound, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use serde_json::json;

    fn endpoint() -> (RemoteStore, Receiver<Envelope>, Sender<Outbound>) {
        let (to_primary, from_observer) = unbounded();
        let (to_observer, from_primary) = unbounded();
        let remote = RemoteStore::new(
            ObserverId(7),
            to_primary,
            from_primary,
            Arc::new(ObserverRegistry::new()),
        );
        (remote, from_observer, to_observer)
    }

    fn sent(rx: &Receiver<Envelope>) -> Inbound {
        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.observer, ObserverId(7));
        match envelope.payload {
            Payload::Message(message) => message,
            Payload::Frame(_) => panic!("expected a decoded message"),
        }
    }

    #[test]
    fn test_requests_are_tagged_with_observer() {
        let (remote, rx, _tx) = endpoint();

        remote.subscribe_store(Some("chat")).unwrap();
        remote.dispatch(&Action::new("SET", json!({"x": 1}))).unwrap();
        remote.dispatch_value(Value::Null).unwrap();

        assert_eq!(
            sent(&rx),
            Inbound::SubscribeStore {
                sub_store_key: Some("chat".into())
            }
        );
        assert_eq!(
            sent(&rx),
            Inbound::DispatchAction {
                action: json!({"type": "SET", "payload": {"x": 1}})
            }
        );
        assert_eq!(sent(&rx), Inbound::DispatchAction { action: Value::Null });
    }

    #[test]
    fn test_sync_keeps_latest() {
        let (mut remote, _rx, tx) = endpoint();
        assert_eq!(remote.get_state(), &json!({}));

        for n in 0..3 {
            tx.send(Outbound::StateChange {
                snapshot: json!({"n": n}),
            })
            .unwrap();
        }

        assert_eq!(remote.sync(), 3);
        assert_eq!(remote.get_state(), &json!({"n": 2}));
        assert_eq!(remote.sync(), 0);
    }

    #[test]
    fn test_drop_sends_disconnect() {
        let (remote, rx, _tx) = endpoint();
        drop(remote);
        assert_eq!(sent(&rx), Inbound::Disconnect);
    }

    #[test]
    fn test_drop_leaves_registry_when_queue_full() {
        let registry = Arc::new(ObserverRegistry::new());
        let (to_primary, from_observer) = crossbeam_channel::bounded(1);
        let (to_observer, from_primary) = unbounded();
        let id = registry.register(to_observer);
        let remote = RemoteStore::new(id, to_primary, from_primary, Arc::clone(&registry));

        remote.unsubscribe().unwrap();
        assert_eq!(from_observer.len(), 1);

        drop(remote);
        assert_eq!(registry.observer_count(), 0);
        // Only the earlier request made it into the queue
        assert_eq!(from_observer.len(), 1);
    }

    #[test]
    fn test_send_after_primary_gone() {
        let (remote, rx, _tx) = endpoint();
        drop(rx);
        assert!(matches!(
            remote.unsubscribe(),
            Err(MirrorError::Disconnected)
        ));
    }
}
