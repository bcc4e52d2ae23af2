//! # framelink-relay
//!
//! Frame shipping layer for framelink.
//!
//! This crate provides:
//! - Whole-frame sends and receives over any `AsyncRead`/`AsyncWrite` pair
//! - Header CRC validation with diagnostic drain on mismatch
//! - Detection of foreign diagnostic text written to the frame stream
//! - A stream enum over TCP and Unix-domain sockets

pub mod error;
pub mod relay;
pub mod stream;

pub use error::RelayError;
pub use relay::{Relay, FOREIGN_OUTPUT_SENTINEL};
pub use stream::RelayStream;
