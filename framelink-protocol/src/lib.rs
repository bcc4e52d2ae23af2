//! # framelink-protocol
//!
//! Wire frame format for the framelink transport.
//!
//! This crate provides:
//! - The 12-byte fixed header with version/header-length nibbles
//! - Per-frame payload-codec and control flags
//! - Variable-length header option words
//! - Header CRC32 (IEEE) computation and verification

pub mod error;
pub mod frame;

pub use error::FrameError;
pub use frame::{Frame, FrameFlags, PayloadCodec};

/// Protocol version carried in the low nibble of header byte 0.
pub const PROTOCOL_VERSION: u8 = 1;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Size of one header word in bytes.
pub const WORD_SIZE: usize = 4;

/// Header length, in words, of a frame without options.
pub const BASE_HEADER_WORDS: u8 = 3;

/// Maximum header length in words (the HL nibble caps at 15).
pub const MAX_HEADER_WORDS: u8 = 15;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
