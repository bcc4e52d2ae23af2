//! Whole-frame transfer over a byte stream.
//!
//! A [`Relay`] owns the two halves of a bidirectional stream and moves one
//! [`Frame`] at a time across it. One receive and one send may run
//! concurrently; concurrent sends serialize on the writer lock.

use crate::error::RelayError;
use bytes::BytesMut;
use framelink_protocol::{Frame, BASE_HEADER_WORDS, HEADER_SIZE, MAX_PAYLOAD_SIZE, WORD_SIZE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// First 12 bytes of the interpreter message `"Could not open input
/// file: …"`. A header starting with these bytes means a foreign process
/// wrote diagnostic text to the frame descriptor. The check applies to the
/// header position only; payloads may contain the same bytes freely.
pub const FOREIGN_OUTPUT_SENTINEL: &[u8; HEADER_SIZE] = b"Could not op";

/// How long to keep draining the stream after a header checksum failure.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const DRAIN_CHUNK: usize = 4096;

/// Ships frames across a byte stream in both directions.
pub struct Relay<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<S> Relay<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a relay over a single bidirectional stream by splitting it
    /// into read and write halves.
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_pair(reader, writer)
    }
}

impl<R, W> Relay<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a relay from separate reader and writer halves, e.g. a pipe
    /// pair connected to a child process.
    pub fn from_pair(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    /// Writes the frame's header, options, and payload, retrying until all
    /// bytes are flushed or the stream fails.
    pub async fn send(&self, frame: &Frame) -> Result<(), RelayError> {
        let mut buf = BytesMut::with_capacity(frame.header_bytes().len() + frame.payload().len());
        buf.extend_from_slice(frame.header_bytes());
        buf.extend_from_slice(frame.payload());

        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await?;
        writer.flush().await?;
        tracing::debug!(bytes = buf.len(), "frame sent");
        Ok(())
    }

    /// Reads the next frame from the stream into `frame`, replacing its
    /// contents.
    ///
    /// A clean close at a frame boundary surfaces as [`RelayError::Eof`];
    /// a close mid-frame surfaces as an `UnexpectedEof` I/O error.
    pub async fn receive(&self, frame: &mut Frame) -> Result<(), RelayError> {
        let mut reader = self.reader.lock().await;

        let mut fixed = [0u8; HEADER_SIZE];
        read_full(&mut *reader, &mut fixed).await?;

        if &fixed == FOREIGN_OUTPUT_SENTINEL {
            let mut text = fixed.to_vec();
            let _ = reader.read_to_end(&mut text).await;
            let text = String::from_utf8_lossy(&text).into_owned();
            tracing::warn!(%text, "foreign writer polluted the frame stream");
            return Err(RelayError::ForeignOutput(text));
        }

        frame.load_header(&fixed);
        let words = frame.header_len_words();
        if words < BASE_HEADER_WORDS {
            return Err(RelayError::InvalidHeader("header length below three words"));
        }
        if words > BASE_HEADER_WORDS {
            let mut options = vec![0u8; (words - BASE_HEADER_WORDS) as usize * WORD_SIZE];
            reader.read_exact(&mut options).await?;
            frame.extend_header(&options);
        }

        if !frame.verify_crc() {
            let text = drain_after_checksum_failure(&mut *reader, frame.header_bytes()).await;
            tracing::warn!(%text, "header checksum mismatch");
            return Err(RelayError::HeaderChecksum { text });
        }

        let len = frame.payload_len();
        if len > MAX_PAYLOAD_SIZE {
            return Err(RelayError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if len > 0 {
            let payload = frame.payload_mut();
            payload.resize(len as usize, 0);
            reader.read_exact(&mut payload[..]).await?;
        }
        tracing::debug!(
            payload = len,
            options = frame.options().len(),
            "frame received"
        );
        Ok(())
    }

    /// Shuts down the write side of the stream. Idempotent.
    pub async fn close(&self) -> Result<(), RelayError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

/// Fills `buf` completely. Zero bytes before any data is a clean EOF;
/// running dry mid-buffer is an `UnexpectedEof` I/O error.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(RelayError::Eof);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        filled += n;
    }
    Ok(())
}

/// A header checksum failure usually means the peer wrote plain text
/// (errors, warnings) over the frame descriptor. Collect whatever arrives
/// within the drain deadline so the caller can surface it.
async fn drain_after_checksum_failure<R>(reader: &mut R, header: &[u8]) -> String
where
    R: AsyncRead + Unpin,
{
    let mut collected = header.to_vec();
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    let mut chunk = [0u8; DRAIN_CHUNK];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, reader.read(&mut chunk)).await {
            Ok(Ok(n)) if n > 0 => collected.extend_from_slice(&chunk[..n]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&collected).into_owned()
}
