//! Codec trait and the JSON implementation.
//!
//! A codec turns channel payloads into bytes and back. The session layer
//! only ever talks to the [`Codec`] trait, so the wire format can change
//! without touching election, queueing or sync logic. Every peer in a room
//! has to use the same codec; there is no negotiation.
//!
//! Only [`JsonCodec`] ships today. JSON keeps the opaque simulation state
//! inspectable (you can log a snapshot and read it) and is what browser
//! peers speak. The cost is size: a full-state broadcast every 100 ms is
//! noticeably larger than a binary encoding would be.
//!
//! # Exactness
//!
//! A follower's decoded snapshot must equal what the host's engine
//! returned, floats included. `serde_json` is built with
//! `float_roundtrip`, which makes parsing exact instead of best-effort, so
//! `decode(encode(x)) == x` holds for every finite `f64`.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: a session actor runs on whichever Tokio worker picks
///   it up, and the codec travels with it.
/// - `'static`: the codec lives as long as the room is open, so it cannot
///   borrow anything shorter-lived.
///
/// ## Generic methods
///
/// `encode` and `decode` are generic over the payload type, so one codec
/// handles every channel: action messages, sync messages, bare peer ids.
/// `decode` asks for `DeserializeOwned` because the transport hands over a
/// buffer that is dropped right after decoding; nothing may borrow from it.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails (for
    /// example a map with non-string keys under JSON).
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] on malformed or truncated input,
    /// or input that doesn't match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Stateless and `Copy`, so every session gets its own for free.
///
/// ```rust
/// use hostsync_protocol::{Codec, JsonCodec, PeerId};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&PeerId::new("p1")).unwrap();
/// let decoded: PeerId = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, PeerId::new("p1"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let result: Result<u64, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_map_with_non_string_keys_fails() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1u8);
        assert!(matches!(JsonCodec.encode(&map), Err(ProtocolError::Encode(_))));
    }

    #[test]
    fn test_f64_decodes_to_identical_bits() {
        for value in [0.1 + 0.2, 182.787_456_578_654_06, 5e-324, f64::MAX, -1.0 / 3.0] {
            let bytes = JsonCodec.encode(&value).unwrap();
            let decoded: f64 = JsonCodec.decode(&bytes).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits(), "{value}");
        }
    }
}
