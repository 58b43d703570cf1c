//! Messages exchanged between a mirror and its observers.

use crate::types::ObserverId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent by an observer to the primary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    /// Propose an action against the store.
    ///
    /// The action is carried untyped; the store validates it.
    DispatchAction {
        #[serde(default)]
        action: Value,
    },

    /// Register (or replace) this observer's subscription.
    SubscribeStore {
        #[serde(default, rename = "subStoreKey")]
        sub_store_key: Option<String>,
    },

    /// Drop this observer's subscription.
    Unsubscribe,

    /// The observer is going away.
    Disconnect,
}

impl Inbound {
    /// Name of the message on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::DispatchAction { .. } => "dispatchAction",
            Inbound::SubscribeStore { .. } => "subscribeStore",
            Inbound::Unsubscribe => "unsubscribe",
            Inbound::Disconnect => "disconnect",
        }
    }
}

/// Messages pushed by the primary to an observer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound {
    /// Current (sub-)state for the observer's selector.
    StateChange { snapshot: Value },
}

/// What an observer endpoint puts on the shared inbound queue.
#[derive(Clone, Debug)]
pub(crate) enum Payload {
    /// Already-decoded message from an in-process endpoint.
    Message(Inbound),
    /// Encoded frame from a byte transport.
    Frame(Vec<u8>),
}

/// Inbound payload tagged with its sender.
#[derive(Clone, Debug)]
pub(crate) struct Envelope {
    pub observer: ObserverId,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_wire_names() {
        let msg = Inbound::DispatchAction {
            action: json!({"type": "SET", "payload": {"x": 1}}),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "dispatchAction", "action": {"type": "SET", "payload": {"x": 1}}})
        );

        let msg = Inbound::SubscribeStore {
            sub_store_key: Some("x".into()),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "subscribeStore", "subStoreKey": "x"})
        );
    }

    #[test]
    fn test_inbound_defaults() {
        let msg: Inbound = serde_json::from_value(json!({"type": "subscribeStore"})).unwrap();
        assert_eq!(msg, Inbound::SubscribeStore { sub_store_key: None });

        // A missing action decodes as null and is left for the store to reject
        let msg: Inbound = serde_json::from_value(json!({"type": "dispatchAction"})).unwrap();
        assert_eq!(msg, Inbound::DispatchAction { action: Value::Null });
        assert_eq!(msg.kind(), "dispatchAction");
    }

    #[test]
    fn test_outbound_wire_name() {
        let msg = Outbound::StateChange {
            snapshot: json!({"x": 1}),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "stateChange", "snapshot": {"x": 1}})
        );
    }
}
