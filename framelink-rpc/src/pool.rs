//! Process-wide pools of reusable frames and payload scratch buffers.
//!
//! Items are reset on release, so an acquired item never carries prior
//! state. The pools are bounded; beyond the cap, released items are simply
//! dropped and misses allocate fresh ones.

use bytes::BytesMut;
use framelink_protocol::Frame;
use parking_lot::Mutex;

/// Upper bound on retained items per pool.
const MAX_POOLED: usize = 64;

/// Fresh scratch buffers start at this capacity.
const MIN_BUFFER_CAPACITY: usize = 4096;

static FRAMES: Mutex<Vec<Frame>> = Mutex::new(Vec::new());
static BUFFERS: Mutex<Vec<BytesMut>> = Mutex::new(Vec::new());

pub(crate) fn frame() -> Frame {
    FRAMES.lock().pop().unwrap_or_default()
}

pub(crate) fn release_frame(mut frame: Frame) {
    frame.reset();
    let mut pool = FRAMES.lock();
    if pool.len() < MAX_POOLED {
        pool.push(frame);
    }
}

pub(crate) fn buffer(capacity: usize) -> BytesMut {
    let mut buf = BUFFERS
        .lock()
        .pop()
        .unwrap_or_else(|| BytesMut::with_capacity(MIN_BUFFER_CAPACITY.max(capacity)));
    buf.reserve(capacity);
    buf
}

pub(crate) fn release_buffer(mut buf: BytesMut) {
    buf.clear();
    let mut pool = BUFFERS.lock();
    if pool.len() < MAX_POOLED {
        pool.push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_protocol::{FrameFlags, BASE_HEADER_WORDS};

    #[test]
    fn test_released_frame_comes_back_clean() {
        let mut dirty = frame();
        dirty.or_flags(FrameFlags::from_bits(FrameFlags::ERROR));
        dirty.append_options(&[1, 2]).unwrap();
        dirty.write_payload(b"leftovers");
        release_frame(dirty);

        // Every pooled frame must look freshly constructed.
        let clean = frame();
        assert_eq!(clean.flags().bits(), 0);
        assert_eq!(clean.header_len_words(), BASE_HEADER_WORDS);
        assert!(clean.payload().is_empty());
        release_frame(clean);
    }

    #[test]
    fn test_released_buffer_comes_back_empty() {
        let mut buf = buffer(16);
        buf.extend_from_slice(b"scratch");
        release_buffer(buf);

        let buf = buffer(16);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);
        release_buffer(buf);
    }

    #[test]
    fn test_buffer_reserves_requested_capacity() {
        let buf = buffer(2 * MIN_BUFFER_CAPACITY);
        assert!(buf.capacity() >= 2 * MIN_BUFFER_CAPACITY);
        release_buffer(buf);
    }
}
