//! Error types for the protocol layer.
//!
//! Each crate in wordchain defines its own error enum. A `ProtocolError`
//! always means the bytes on the wire could not be turned into (or out of)
//! a typed message; it never describes a game rule.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or wrong data types.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope's `type` is not a known inbound message.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}
