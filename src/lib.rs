//! # framelink
//!
//! A length-prefixed framed RPC transport for byte-oriented bidirectional
//! streams (TCP sockets, Unix-domain sockets, pipe pairs).
//!
//! The workspace is split into three layers, re-exported here:
//! - [`protocol`] — the self-describing binary frame: versioned header,
//!   per-frame payload-codec selection, option words, header CRC.
//! - [`relay`] — ships whole frames across a stream and validates them,
//!   including detection of foreign diagnostic output written to the same
//!   descriptor.
//! - [`rpc`] — bridges a sequence-numbered RPC dispatcher to the relay,
//!   marshalling bodies across five interchangeable payload codecs.

pub use framelink_protocol as protocol;
pub use framelink_relay as relay;
pub use framelink_rpc as rpc;

pub use framelink_protocol::{Frame, FrameFlags, PayloadCodec, PROTOCOL_VERSION};
pub use framelink_relay::{Relay, RelayError, RelayStream};
pub use framelink_rpc::{
    Body, ClientCodec, ProtoBody, RawBody, RequestHeader, ResponseHeader, RpcError, SerdeBody,
    ServerCodec,
};
