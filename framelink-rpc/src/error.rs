//! RPC codec error types.

use framelink_relay::RelayError;
use thiserror::Error;

/// Marshalling failures from the payload codecs.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body's concrete type cannot carry the requested wire codec,
    /// e.g. a serde value under a protobuf frame.
    #[error("body type does not support the {codec} codec")]
    TypeMismatch { codec: &'static str },

    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("native codec error: {0}")]
    Native(#[from] bincode::Error),

    #[error("protobuf encode error: {0}")]
    ProtoEncode(#[from] prost::EncodeError),

    #[error("protobuf decode error: {0}")]
    ProtoDecode(#[from] prost::DecodeError),
}

/// Errors surfaced to the RPC dispatcher.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The frame violates the RPC layer's structure, e.g. an option count
    /// other than two.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    #[error(transparent)]
    Body(#[from] BodyError),

    /// A dispatcher-supplied error string, already forwarded to the peer
    /// as an error frame.
    #[error("{0}")]
    Service(String),
}

impl RpcError {
    /// Whether this error is a clean end-of-stream, used by dispatchers to
    /// terminate their serve loop.
    pub fn is_eof(&self) -> bool {
        matches!(self, RpcError::Relay(e) if e.is_eof())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_passes_through_the_relay_wrap() {
        let err = RpcError::from(RelayError::Eof);
        assert!(err.is_eof());
        assert!(!RpcError::InvalidFrame("x").is_eof());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = BodyError::TypeMismatch { codec: "protobuf" };
        assert!(err.to_string().contains("protobuf"));
    }
}
