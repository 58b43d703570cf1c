//! Core types shared by the store, the mirror and remote observers.

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier assigned to an observer when it connects to a mirror.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverId({})", self.0)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a listener registered against a store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// A tagged record describing an intended state transition.
///
/// Serialized as `{"type": ..., "payload": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,

    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Create an action with a JSON payload.
    pub fn new(action_type: impl Into<String>, payload: Value) -> Self {
        Self {
            action_type: action_type.into(),
            payload,
        }
    }

    /// Create an action by serializing a payload.
    pub fn json(
        action_type: impl Into<String>,
        payload: &impl Serialize,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            action_type: action_type.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Validate an untyped value into an action.
    ///
    /// Only objects carrying a string `type` are actions; `null`, scalars,
    /// arrays and untyped objects are rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Object(map) => match map.get("type") {
                Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(MirrorError::InvalidAction(format!(
                        "action type must be a string, got {}",
                        value_kind(other)
                    )))
                }
                None => return Err(MirrorError::InvalidAction("action has no type".into())),
            },
            other => {
                return Err(MirrorError::InvalidAction(format!(
                    "action must be an object, got {}",
                    value_kind(other)
                )))
            }
        }

        serde_json::from_value(value).map_err(|e| MirrorError::InvalidAction(e.to_string()))
    }

    /// Convert into an untyped value for the wire.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(2);
        map.insert("type".into(), Value::String(self.action_type.clone()));
        map.insert("payload".into(), self.payload.clone());
        Value::Object(map)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Which part of the state tree a subscription receives.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Selector {
    /// The whole state tree.
    #[default]
    Whole,
    /// One named top-level sub-tree.
    Key(String),
}

impl Selector {
    /// Build a selector from an optional sub-store key.
    ///
    /// An empty key selects the whole tree.
    pub fn from_key(key: Option<String>) -> Self {
        match key {
            Some(key) if !key.is_empty() => Selector::Key(key),
            _ => Selector::Whole,
        }
    }

    /// The sub-store key, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Selector::Whole => None,
            Selector::Key(key) => Some(key.as_str()),
        }
    }

    /// Compute the snapshot this selector sees.
    ///
    /// Missing or null sub-trees (and a null root) read as `{}`.
    pub fn select(&self, state: &Value) -> Value {
        let selected = match self {
            Selector::Whole => Some(state),
            Selector::Key(key) => state.get(key.as_str()),
        };

        match selected {
            Some(value) if !value.is_null() => value.clone(),
            _ => Value::Object(Map::new()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Whole => write!(f, "*"),
            Selector::Key(key) => write!(f, "{}", key),
        }
    }
}
