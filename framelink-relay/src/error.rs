//! Relay error types.

use thiserror::Error;

/// Errors surfaced while moving frames across a stream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The peer closed the stream at a frame boundary. Dispatchers use
    /// this to terminate their accept loop.
    #[error("stream closed")]
    Eof,

    /// The stream carried diagnostic text from a foreign writer instead of
    /// a frame. The message holds everything that could be read.
    #[error("foreign output on frame stream: {0}")]
    ForeignOutput(String),

    /// The header CRC did not match. `text` holds the raw header plus
    /// whatever else could be drained from the stream, since a mismatch
    /// usually means the peer wrote plain text over the frame descriptor.
    #[error("header checksum mismatch; stream contents: {text}")]
    HeaderChecksum { text: String },

    /// The header is structurally invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Whether this error is a clean end-of-stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, RelayError::Eof)
    }
}
