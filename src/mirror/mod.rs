//! Store mirror channel.
//!
//! Lets remote observers read one authoritative store and propose changes
//! to it through messages only:
//! - `subscribeStore` pushes the current (sub-)state right away and after
//!   every store change; resubscribing replaces the old subscription
//! - `dispatchAction` is queued and applied on the next idle tick
//! - snapshots reach each observer in store transition order
//!
//! Dead or slow observers are dropped, never retried.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(Store::new(json!({}), MergeReducer));
//! let mut mirror = MirrorChannel::with_defaults(Arc::clone(&store));
//!
//! let mut window = mirror.connect();
//! window.subscribe_store(Some("chat"))?;
//! window.dispatch(&Action::new("SET", json!({"chat": {"unread": 0}})))?;
//!
//! mirror.turn();
//! window.sync();
//! assert_eq!(window.get_state(), &json!({"unread": 0}));
//! ```

mod channel;
mod registry;
mod types;

pub use channel::{Connector, MirrorChannel, MirrorHandle, MIRROR_LISTENER_TAG};
pub use registry::ObserverRegistry;
pub use types::{DropReason, MirrorConfig, SubscriptionInfo, TurnStats};
