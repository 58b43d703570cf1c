//! Frame codec for byte-oriented transports.

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};

use super::messages::{Inbound, Outbound};

/// Frame encoding format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Json,
    MessagePack,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Json
    }
}

/// Encodes and decodes protocol messages as single frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec {
    encoding: Encoding,
}

impl FrameCodec {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn encode_inbound(&self, message: &Inbound) -> Result<Vec<u8>> {
        self.encode(message)
    }

    pub fn decode_inbound(&self, frame: &[u8]) -> Result<Inbound> {
        self.decode(frame)
    }

    pub fn encode_outbound(&self, message: &Outbound) -> Result<Vec<u8>> {
        self.encode(message)
    }

    pub fn decode_outbound(&self, frame: &[u8]) -> Result<Outbound> {
        self.decode(frame)
    }

    fn encode<T: Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        match self.encoding {
            Encoding::Json => Ok(serde_json::to_vec(message)?),
            // Named fields: tagged enums need map encoding
            Encoding::MessagePack => Ok(rmp_serde::to_vec_named(message)?),
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, frame: &[u8]) -> Result<T> {
        match self.encoding {
            Encoding::Json => serde_json::from_slice(frame)
                .map_err(|e| MirrorError::Deserialization(e.to_string())),
            Encoding::MessagePack => Ok(rmp_serde::from_slice(frame)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_frames() {
        let codec = FrameCodec::new(Encoding::Json);

        let frame = br#"{"type":"subscribeStore","subStoreKey":"chat"}"#;
        assert_eq!(
            codec.decode_inbound(frame).unwrap(),
            Inbound::SubscribeStore {
                sub_store_key: Some("chat".into())
            }
        );

        let out = codec
            .encode_outbound(&Outbound::StateChange { snapshot: json!(1) })
            .unwrap();
        assert_eq!(out, br#"{"type":"stateChange","snapshot":1}"#.to_vec());
    }

    #[test]
    fn test_messagepack_frames() {
        let codec = FrameCodec::new(Encoding::MessagePack);

        let msg = Inbound::DispatchAction {
            action: json!({"type": "SET", "payload": {"x": 1, "tags": ["a", "b"]}}),
        };
        let frame = codec.encode_inbound(&msg).unwrap();
        assert_eq!(codec.decode_inbound(&frame).unwrap(), msg);

        let msg = Outbound::StateChange {
            snapshot: json!({"x": 1}),
        };
        let frame = codec.encode_outbound(&msg).unwrap();
        assert_eq!(codec.decode_outbound(&frame).unwrap(), msg);
    }

    #[test]
    fn test_malformed_frames() {
        let json = FrameCodec::new(Encoding::Json);
        assert!(matches!(
            json.decode_inbound(b"not json"),
            Err(MirrorError::Deserialization(_))
        ));
        assert!(matches!(
            json.decode_inbound(br#"{"type":"launchMissiles"}"#),
            Err(MirrorError::Deserialization(_))
        ));
        assert!(json.decode_inbound(b"null").is_err());

        let msgpack = FrameCodec::new(Encoding::MessagePack);
        assert!(matches!(
            msgpack.decode_inbound(&[0xc1]),
            Err(MirrorError::Deserialization(_))
        ));
    }
}
