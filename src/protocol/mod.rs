//! Wire protocol between a mirror and remote observers.
//!
//! Observers send `dispatchAction`, `subscribeStore`, `unsubscribe` and
//! `disconnect`; the primary answers with `stateChange`. Messages are
//! internally tagged by `type`:
//!
//! ```text
//! {"type":"subscribeStore","subStoreKey":"chat"}
//! {"type":"dispatchAction","action":{"type":"SET","payload":{"x":1}}}
//! {"type":"stateChange","snapshot":{"x":1}}
//! ```
//!
//! In-process endpoints exchange the enums directly. Byte transports go
//! through [`FrameCodec`].

mod codec;
mod messages;

pub use codec::{Encoding, FrameCodec};
pub use messages::{Inbound, Outbound};
pub(crate) use messages::{Envelope, Payload};
