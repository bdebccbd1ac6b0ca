//! Error types for the protocol layer.

/// Errors raised while encoding, decoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, or a
    /// payload that doesn't belong to the channel it arrived on.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The action parsed but breaks its variant's schema.
    #[error("invalid action: {0}")]
    InvalidAction(String),
}
