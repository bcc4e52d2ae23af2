//! # framelink-rpc
//!
//! RPC codec layer for framelink.
//!
//! This crate bridges a sequence-numbered RPC dispatcher to the frame
//! relay. It provides:
//! - [`ServerCodec`]: demultiplexes concurrent in-flight requests by
//!   sequence number and answers each with the payload codec it arrived
//!   under
//! - [`ClientCodec`]: the matching request writer / response reader
//! - [`Body`] and its shipped implementations, dispatching marshalling
//!   across five interchangeable payload codecs (Protocol Buffers, JSON,
//!   MessagePack, native binary, raw bytes)
//! - Process-wide frame and byte-buffer pools

pub mod body;
pub mod client;
pub mod error;
pub(crate) mod pool;
pub mod server;

pub use body::{Body, ProtoBody, RawBody, SerdeBody};
pub use client::ClientCodec;
pub use error::{BodyError, RpcError};
pub use server::{RequestHeader, ResponseHeader, ServerCodec};
