//! Body marshalling across the interchangeable payload codecs.
//!
//! Which wire codec applies to a body is decided per request at runtime,
//! so bodies go through the [`Body`] trait rather than a compile-time
//! serializer choice. Three implementations cover the dispatcher-facing
//! shapes: serde values, protobuf messages, and raw byte buffers.

use crate::error::BodyError;
use bytes::BytesMut;
use framelink_protocol::PayloadCodec;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value that can cross the wire under a per-request payload codec.
pub trait Body {
    /// Serializes `self` under `codec`, appending to `buf`.
    fn encode(&self, codec: PayloadCodec, buf: &mut BytesMut) -> Result<(), BodyError>;

    /// Deserializes `bytes` under `codec` into `self`.
    ///
    /// Raw frames only land in byte buffers; other body types treat a raw
    /// read as a silent no-op.
    fn decode(&mut self, codec: PayloadCodec, bytes: &[u8]) -> Result<(), BodyError>;
}

/// Body backed by a serde-serializable value.
///
/// Handles JSON, MessagePack, and the native binary codec. Protobuf frames
/// are rejected with a type mismatch; raw frames are a no-op on read and a
/// mismatch on write (raw payloads require a byte buffer).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerdeBody<T>(pub T);

impl<T> SerdeBody<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Body for SerdeBody<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, codec: PayloadCodec, buf: &mut BytesMut) -> Result<(), BodyError> {
        match codec {
            PayloadCodec::Json => {
                buf.extend_from_slice(&serde_json::to_vec(&self.0)?);
                Ok(())
            }
            PayloadCodec::Msgpack => {
                buf.extend_from_slice(&rmp_serde::to_vec(&self.0)?);
                Ok(())
            }
            PayloadCodec::Native => {
                buf.extend_from_slice(&bincode::serialize(&self.0)?);
                Ok(())
            }
            PayloadCodec::Raw => Err(BodyError::TypeMismatch { codec: "raw" }),
            PayloadCodec::Proto => Err(BodyError::TypeMismatch { codec: "protobuf" }),
        }
    }

    fn decode(&mut self, codec: PayloadCodec, bytes: &[u8]) -> Result<(), BodyError> {
        match codec {
            PayloadCodec::Json => {
                self.0 = serde_json::from_slice(bytes)?;
                Ok(())
            }
            PayloadCodec::Msgpack => {
                self.0 = rmp_serde::from_slice(bytes)?;
                Ok(())
            }
            PayloadCodec::Native => {
                self.0 = bincode::deserialize(bytes)?;
                Ok(())
            }
            PayloadCodec::Raw => Ok(()),
            PayloadCodec::Proto => Err(BodyError::TypeMismatch { codec: "protobuf" }),
        }
    }
}

/// Body backed by a protobuf message.
///
/// Only protobuf frames decode or encode; the serde-family codecs cannot
/// see into a prost message and fail with a type mismatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtoBody<M>(pub M);

impl<M> ProtoBody<M> {
    pub fn into_inner(self) -> M {
        self.0
    }
}

impl<M> Body for ProtoBody<M>
where
    M: prost::Message + Default,
{
    fn encode(&self, codec: PayloadCodec, buf: &mut BytesMut) -> Result<(), BodyError> {
        match codec {
            PayloadCodec::Proto => {
                self.0.encode(buf)?;
                Ok(())
            }
            PayloadCodec::Raw => Err(BodyError::TypeMismatch { codec: "raw" }),
            PayloadCodec::Json => Err(BodyError::TypeMismatch { codec: "JSON" }),
            PayloadCodec::Msgpack => Err(BodyError::TypeMismatch { codec: "MessagePack" }),
            PayloadCodec::Native => Err(BodyError::TypeMismatch { codec: "native" }),
        }
    }

    fn decode(&mut self, codec: PayloadCodec, bytes: &[u8]) -> Result<(), BodyError> {
        match codec {
            PayloadCodec::Proto => {
                self.0 = M::decode(bytes)?;
                Ok(())
            }
            PayloadCodec::Raw => Ok(()),
            PayloadCodec::Json => Err(BodyError::TypeMismatch { codec: "JSON" }),
            PayloadCodec::Msgpack => Err(BodyError::TypeMismatch { codec: "MessagePack" }),
            PayloadCodec::Native => Err(BodyError::TypeMismatch { codec: "native" }),
        }
    }
}

/// Mutable byte-buffer body for raw frames.
///
/// Raw reads append to the buffer; raw writes copy it out verbatim. Under
/// the serde-family codecs the buffer round-trips as a serde byte
/// sequence. Protobuf frames are a type mismatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBody(pub BytesMut);

impl RawBody {
    pub fn new() -> Self {
        Self(BytesMut::new())
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(BytesMut::from(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Body for RawBody {
    fn encode(&self, codec: PayloadCodec, buf: &mut BytesMut) -> Result<(), BodyError> {
        match codec {
            PayloadCodec::Raw => {
                buf.extend_from_slice(&self.0);
                Ok(())
            }
            PayloadCodec::Json => {
                buf.extend_from_slice(&serde_json::to_vec(&self.0.as_ref())?);
                Ok(())
            }
            PayloadCodec::Msgpack => {
                buf.extend_from_slice(&rmp_serde::to_vec(&self.0.as_ref())?);
                Ok(())
            }
            PayloadCodec::Native => {
                buf.extend_from_slice(&bincode::serialize(&self.0.as_ref())?);
                Ok(())
            }
            PayloadCodec::Proto => Err(BodyError::TypeMismatch { codec: "protobuf" }),
        }
    }

    fn decode(&mut self, codec: PayloadCodec, bytes: &[u8]) -> Result<(), BodyError> {
        match codec {
            PayloadCodec::Raw => {
                self.0.extend_from_slice(bytes);
                Ok(())
            }
            PayloadCodec::Json => {
                let decoded: Vec<u8> = serde_json::from_slice(bytes)?;
                self.0.clear();
                self.0.extend_from_slice(&decoded);
                Ok(())
            }
            PayloadCodec::Msgpack => {
                let decoded: Vec<u8> = rmp_serde::from_slice(bytes)?;
                self.0.clear();
                self.0.extend_from_slice(&decoded);
                Ok(())
            }
            PayloadCodec::Native => {
                let decoded: Vec<u8> = bincode::deserialize(bytes)?;
                self.0.clear();
                self.0.extend_from_slice(&decoded);
                Ok(())
            }
            PayloadCodec::Proto => Err(BodyError::TypeMismatch { codec: "protobuf" }),
        }
    }
}
