//! Reducers: pure state transition functions.

use crate::error::{MirrorError, Result};
use crate::types::Action;
use serde_json::{Map, Value};

/// Action type that shallow-merges an object payload into the root.
pub const SET: &str = "SET";

/// Action type that replaces the whole state tree with the payload.
pub const RESET: &str = "RESET";

/// Computes the next state tree from the current one and an action.
///
/// Reducers never mutate `state`; they return a new tree. Returning an
/// error rejects the action and leaves the store unchanged.
pub trait Reducer: Send + Sync {
    fn reduce(&self, state: &Value, action: &Action) -> Result<Value>;
}

impl<F> Reducer for F
where
    F: Fn(&Value, &Action) -> Result<Value> + Send + Sync,
{
    fn reduce(&self, state: &Value, action: &Action) -> Result<Value> {
        self(state, action)
    }
}

/// Stock reducer understanding `SET` and `RESET`.
///
/// Unknown action types leave the tree as it was.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, state: &Value, action: &Action) -> Result<Value> {
        match action.action_type.as_str() {
            SET => {
                let fields = match &action.payload {
                    Value::Object(fields) => fields,
                    _ => {
                        return Err(MirrorError::Reducer(format!(
                            "{} payload must be an object",
                            SET
                        )))
                    }
                };

                // Non-object roots are discarded
                let mut root = match state {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };

                for (key, value) in fields {
                    root.insert(key.clone(), value.clone());
                }

                Ok(Value::Object(root))
            }

            RESET => Ok(action.payload.clone()),

            _ => Ok(state.clone()),
        }
    }
}
