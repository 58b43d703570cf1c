//! # Store Mirror
//!
//! Share one authoritative application state store with remote observers
//! (detached windows, helper processes) that may only talk to it through
//! messages.
//!
//! ## Core Concepts
//!
//! - **Store**: owns an immutable state tree; changes only via `dispatch`
//! - **Mirror**: applies observers' actions and pushes them snapshots
//! - **Remote store**: the observer's read-only copy and dispatch entry point
//! - **Selector**: optional sub-tree key narrowing what an observer receives
//!
//! ## Example
//!
//! ```ignore
//! use store_mirror::{Action, MergeReducer, MirrorChannel, StateStore, Store};
//!
//! let store = Arc::new(Store::new(json!({}), MergeReducer));
//! let handle = MirrorChannel::with_defaults(Arc::clone(&store)).spawn()?;
//!
//! // In the observer
//! let mut remote = handle.connect();
//! remote.subscribe_store(None)?;
//! remote.dispatch(&Action::new("SET", json!({"x": 1})))?;
//!
//! // In the primary
//! store.dispatch(Action::new("SET", json!({"y": 2})))?;
//! ```

pub mod error;
pub mod mirror;
pub mod protocol;
pub mod remote;
pub mod store;
pub mod types;

// Re-exports
pub use error::{MirrorError, Result};
pub use mirror::{
    Connector, DropReason, MirrorChannel, MirrorConfig, MirrorHandle, ObserverRegistry,
    SubscriptionInfo, TurnStats, MIRROR_LISTENER_TAG,
};
pub use protocol::{Encoding, FrameCodec, Inbound, Outbound};
pub use remote::{FramedObserver, RemoteStore};
pub use store::{Listener, MergeReducer, Reducer, StateStore, Store, RESET, SET};
pub use types::{Action, ListenerId, ObserverId, Selector};
