//! Mirror configuration and bookkeeping types.

use crate::protocol::Encoding;
use crate::types::{ObserverId, Selector};
use std::time::Duration;

/// Configuration for a mirror.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    /// Max buffered snapshots per observer before its subscription is dropped.
    /// Default: 1000
    pub buffer_size: usize,

    /// Capacity of the shared inbound queue (None = unbounded).
    pub inbound_buffer: Option<usize>,

    /// Max inbound messages handled per turn before deferred actions run.
    /// At least one message is always handled.
    /// Default: 256
    pub max_messages_per_turn: usize,

    /// How long `run` waits for inbound traffic before rechecking shutdown.
    /// Default: 50ms
    pub idle_timeout: Duration,

    /// Encoding of frames from byte transports.
    pub encoding: Encoding,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            inbound_buffer: None,
            max_messages_per_turn: 256,
            idle_timeout: Duration::from_millis(50),
            encoding: Encoding::Json,
        }
    }
}

/// Why an observer stopped receiving snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Observer endpoint is gone.
    Disconnected,
}

/// An observer's current subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub observer: ObserverId,
    /// `None` when connected but not subscribed.
    pub selector: Option<Selector>,
}

/// Counters for one turn of the mirror loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnStats {
    /// Inbound messages handled.
    pub messages: usize,
    /// Inbound frames or messages dropped as malformed.
    pub malformed: usize,
    /// Deferred actions applied to the store.
    pub dispatched: usize,
    /// Deferred actions the store rejected.
    pub rejected: usize,
}

impl TurnStats {
    /// True if the turn did nothing.
    pub fn is_idle(&self) -> bool {
        self.messages == 0 && self.dispatched == 0 && self.rejected == 0
    }
}
