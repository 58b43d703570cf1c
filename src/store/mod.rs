//! Authoritative state store.
//!
//! A store owns one immutable JSON state tree. The only way to change it is
//! `dispatch`, which runs the reducer, swaps in the new tree and notifies
//! every listener with it.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(json!({}), MergeReducer);
//! store.subscribe(Arc::new(|state| println!("now {}", state)));
//! store.dispatch(Action::new("SET", json!({"x": 1})))?;
//! ```

mod manager;
mod reducer;

pub use manager::{Listener, StateStore, Store};
pub use reducer::{MergeReducer, Reducer, RESET, SET};
