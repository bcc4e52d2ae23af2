//! Binary frame layout for the framelink transport.
//!
//! Frame layout (12-byte fixed header + option words + payload):
//!
//! ```text
//! +------------------+---------+------------+---------------+--------------+
//! | HL(4) | VER(4)   |  flags  |  reserved  |  payload_len  |  header_crc  |
//! |      byte 0      |  byte 1 | bytes 2..4 |   bytes 4..8  |  bytes 8..12 |
//! +------------------+---------+------------+---------------+--------------+
//! | options: (HL - 3) x u32    | payload: payload_len bytes               |
//! +----------------------------+------------------------------------------+
//! ```
//!
//! All multi-byte integers are little-endian. `header_crc` is the IEEE
//! CRC-32 (reversed polynomial 0xEDB88320) over header bytes 0..8 only;
//! options and payload are not covered. Reserved bytes are written as zero
//! and never interpreted on read.

use crate::error::FrameError;
use crate::{BASE_HEADER_WORDS, HEADER_SIZE, MAX_HEADER_WORDS, PROTOCOL_VERSION, WORD_SIZE};
use bytes::{BufMut, BytesMut};

/// Frame flags bitfield: one payload-codec bit plus control bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// Payload body is opaque bytes.
    pub const CODEC_RAW: u8 = 1 << 0;
    /// Payload body is JSON.
    pub const CODEC_JSON: u8 = 1 << 1;
    /// Payload body is MessagePack.
    pub const CODEC_MSGPACK: u8 = 1 << 2;
    /// Payload body is native binary serialization.
    pub const CODEC_NATIVE: u8 = 1 << 3;
    /// Payload body is Protocol Buffers.
    pub const CODEC_PROTO: u8 = 1 << 4;
    /// Payload body is an error string.
    pub const ERROR: u8 = 1 << 5;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn with(mut self, bit: u8) -> Self {
        self.0 |= bit;
        self
    }

    pub fn is_error(&self) -> bool {
        self.contains(Self::ERROR)
    }
}

/// Payload serialization format selected by the codec bits of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadCodec {
    /// Opaque byte passthrough.
    Raw,
    /// JSON.
    Json,
    /// MessagePack.
    Msgpack,
    /// Native binary serialization (the default when no codec bit is set).
    Native,
    /// Protocol Buffers.
    Proto,
}

impl PayloadCodec {
    /// Decodes the codec from a flag byte. First match wins; a frame with
    /// no codec bit falls back to [`PayloadCodec::Native`].
    pub fn from_flags(flags: FrameFlags) -> Self {
        if flags.contains(FrameFlags::CODEC_PROTO) {
            PayloadCodec::Proto
        } else if flags.contains(FrameFlags::CODEC_JSON) {
            PayloadCodec::Json
        } else if flags.contains(FrameFlags::CODEC_RAW) {
            PayloadCodec::Raw
        } else if flags.contains(FrameFlags::CODEC_MSGPACK) {
            PayloadCodec::Msgpack
        } else {
            PayloadCodec::Native
        }
    }

    /// The flag bit announcing this codec on the wire.
    pub fn bit(&self) -> u8 {
        match self {
            PayloadCodec::Raw => FrameFlags::CODEC_RAW,
            PayloadCodec::Json => FrameFlags::CODEC_JSON,
            PayloadCodec::Msgpack => FrameFlags::CODEC_MSGPACK,
            PayloadCodec::Native => FrameFlags::CODEC_NATIVE,
            PayloadCodec::Proto => FrameFlags::CODEC_PROTO,
        }
    }
}

/// A framelink wire frame: mutable header bytes plus payload.
///
/// The header is kept in wire form so reads and writes are direct byte
/// accesses. The CRC must be written after every other header mutation;
/// touching bytes 0..8 afterwards invalidates the frame.
#[derive(Debug, Clone)]
pub struct Frame {
    header: BytesMut,
    payload: BytesMut,
}

impl Frame {
    /// Creates an empty frame: `HL = 3`, current protocol version, zero
    /// flags, zero payload length, zero CRC.
    pub fn new() -> Self {
        let mut header = BytesMut::zeroed(HEADER_SIZE);
        header[0] = (BASE_HEADER_WORDS << 4) | PROTOCOL_VERSION;
        Self {
            header,
            payload: BytesMut::new(),
        }
    }

    /// Protocol version (low nibble of byte 0).
    pub fn version(&self) -> u8 {
        self.header[0] & 0x0F
    }

    pub fn set_version(&mut self, version: u8) {
        self.header[0] = (self.header[0] & 0xF0) | (version & 0x0F);
    }

    /// Header length in 32-bit words (high nibble of byte 0), including the
    /// three fixed words.
    pub fn header_len_words(&self) -> u8 {
        self.header[0] >> 4
    }

    fn set_header_len_words(&mut self, words: u8) {
        self.header[0] = (words << 4) | (self.header[0] & 0x0F);
    }

    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_bits(self.header[1])
    }

    /// Overwrites the flag byte, including any codec bits already set.
    pub fn set_flags(&mut self, flags: FrameFlags) {
        self.header[1] = flags.bits();
    }

    /// Unions flag bits into the flag byte, preserving existing bits.
    pub fn or_flags(&mut self, flags: FrameFlags) {
        self.header[1] |= flags.bits();
    }

    /// Payload length in bytes (header bytes 4..8).
    pub fn payload_len(&self) -> u32 {
        u32::from_le_bytes([
            self.header[4],
            self.header[5],
            self.header[6],
            self.header[7],
        ])
    }

    pub fn set_payload_len(&mut self, len: u32) {
        self.header[4..8].copy_from_slice(&len.to_le_bytes());
    }

    /// Appends option words to the header and grows the HL nibble.
    ///
    /// Appending is cumulative across calls; the total header length may
    /// not exceed [`MAX_HEADER_WORDS`].
    pub fn append_options(&mut self, values: &[u32]) -> Result<(), FrameError> {
        let words = self.header_len_words() as usize + values.len();
        if words > MAX_HEADER_WORDS as usize {
            return Err(FrameError::TooManyOptions { words });
        }
        for value in values {
            self.header.put_u32_le(*value);
        }
        self.set_header_len_words(words as u8);
        Ok(())
    }

    /// Decodes the trailing option words into host-endian integers.
    pub fn options(&self) -> Vec<u32> {
        self.header[HEADER_SIZE..]
            .chunks_exact(WORD_SIZE)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect()
    }

    /// Replaces the payload with a copy of `bytes`. The payload length
    /// field is set separately by the caller.
    pub fn write_payload(&mut self, bytes: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(bytes);
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable access to the payload buffer, used by the relay to read
    /// wire bytes directly into the frame.
    pub fn payload_mut(&mut self) -> &mut BytesMut {
        &mut self.payload
    }

    /// Computes the CRC32 over header bytes 0..8 and stores it in bytes
    /// 8..12. Must be the last header mutation before the frame is sent.
    pub fn write_crc(&mut self) {
        let crc = crc32fast::hash(&self.header[..8]);
        self.header[8..HEADER_SIZE].copy_from_slice(&crc.to_le_bytes());
    }

    /// Recomputes the header CRC and compares it against bytes 8..12.
    pub fn verify_crc(&self) -> bool {
        let stored = u32::from_le_bytes([
            self.header[8],
            self.header[9],
            self.header[10],
            self.header[11],
        ]);
        crc32fast::hash(&self.header[..8]) == stored
    }

    /// The header in wire form: 12 fixed bytes plus any option words.
    pub fn header_bytes(&self) -> &[u8] {
        &self.header
    }

    /// Replaces the header with the fixed 12 bytes read off the wire and
    /// clears the payload.
    pub fn load_header(&mut self, fixed: &[u8; HEADER_SIZE]) {
        self.header.clear();
        self.header.extend_from_slice(fixed);
        self.payload.clear();
    }

    /// Appends raw option bytes read off the wire. The HL nibble in the
    /// loaded header already accounts for them.
    pub fn extend_header(&mut self, raw: &[u8]) {
        self.header.extend_from_slice(raw);
    }

    /// Returns the frame to its freshly-constructed state, retaining buffer
    /// capacity for reuse.
    pub fn reset(&mut self) {
        self.header.clear();
        self.header.resize(HEADER_SIZE, 0);
        self.header[0] = (BASE_HEADER_WORDS << 4) | PROTOCOL_VERSION;
        self.payload.clear();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_frame_defaults() {
        let frame = Frame::new();
        assert_eq!(frame.version(), PROTOCOL_VERSION);
        assert_eq!(frame.header_len_words(), BASE_HEADER_WORDS);
        assert_eq!(frame.flags().bits(), 0);
        assert_eq!(frame.payload_len(), 0);
        assert_eq!(frame.header_bytes().len(), HEADER_SIZE);
        assert!(frame.options().is_empty());
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_version_nibble_isolated() {
        let mut frame = Frame::new();
        frame.set_version(0x0F);
        assert_eq!(frame.version(), 0x0F);
        assert_eq!(frame.header_len_words(), BASE_HEADER_WORDS);
    }

    #[test]
    fn test_flags_or_preserves_existing_bits() {
        let mut frame = Frame::new();
        frame.or_flags(FrameFlags::from_bits(FrameFlags::CODEC_JSON));
        frame.or_flags(FrameFlags::from_bits(FrameFlags::ERROR));
        assert!(frame.flags().contains(FrameFlags::CODEC_JSON));
        assert!(frame.flags().is_error());

        frame.set_flags(FrameFlags::from_bits(FrameFlags::ERROR));
        assert!(!frame.flags().contains(FrameFlags::CODEC_JSON));
    }

    #[test]
    fn test_payload_len_little_endian() {
        let mut frame = Frame::new();
        frame.set_payload_len(0x0102_0304);
        assert_eq!(frame.header_bytes()[4..8], [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(frame.payload_len(), 0x0102_0304);
    }

    #[test]
    fn test_append_options_is_cumulative() {
        let mut frame = Frame::new();
        frame.append_options(&[42]).unwrap();
        frame.append_options(&[8, 99]).unwrap();
        assert_eq!(frame.header_len_words(), 6);
        assert_eq!(frame.options(), vec![42, 8, 99]);
        assert_eq!(frame.header_bytes().len(), HEADER_SIZE + 3 * WORD_SIZE);
    }

    #[test]
    fn test_append_options_caps_at_max_header_words() {
        let mut frame = Frame::new();
        let twelve = [0u32; 12];
        frame.append_options(&twelve).unwrap();
        assert_eq!(frame.header_len_words(), MAX_HEADER_WORDS);

        let result = frame.append_options(&[1]);
        assert!(matches!(
            result,
            Err(FrameError::TooManyOptions { words: 16 })
        ));
        // A failed append leaves the header untouched.
        assert_eq!(frame.options().len(), 12);
    }

    #[test]
    fn test_crc_roundtrip() {
        let mut frame = Frame::new();
        frame.or_flags(FrameFlags::from_bits(FrameFlags::CODEC_MSGPACK));
        frame.set_payload_len(77);
        frame.append_options(&[3, 14]).unwrap();
        frame.write_crc();
        assert!(frame.verify_crc());
    }

    #[test]
    fn test_crc_covers_only_first_eight_bytes() {
        let mut frame = Frame::new();
        frame.append_options(&[1, 2]).unwrap();
        frame.write_crc();
        // Mutating the payload does not invalidate the header CRC.
        frame.write_payload(b"anything");
        assert!(frame.verify_crc());
    }

    #[test]
    fn test_crc_invalidated_by_header_mutation() {
        let mut frame = Frame::new();
        frame.write_crc();
        assert!(frame.verify_crc());
        frame.set_payload_len(1);
        assert!(!frame.verify_crc());
    }

    #[test]
    fn test_known_crc_value() {
        // IEEE CRC-32 of eight zero bytes, checked against the zlib variant.
        let mut frame = Frame::new();
        frame.header.clone_from(&BytesMut::zeroed(HEADER_SIZE));
        frame.write_crc();
        let stored = u32::from_le_bytes([
            frame.header_bytes()[8],
            frame.header_bytes()[9],
            frame.header_bytes()[10],
            frame.header_bytes()[11],
        ]);
        assert_eq!(stored, 0x6522_df69);
    }

    #[test]
    fn test_write_payload_replaces() {
        let mut frame = Frame::new();
        frame.write_payload(b"first");
        frame.write_payload(b"second");
        assert_eq!(frame.payload(), b"second");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut frame = Frame::new();
        frame.set_version(2);
        frame.or_flags(FrameFlags::from_bits(FrameFlags::ERROR));
        frame.append_options(&[1, 2, 3]).unwrap();
        frame.set_payload_len(10);
        frame.write_payload(b"0123456789");
        frame.write_crc();

        frame.reset();
        assert_eq!(frame.version(), PROTOCOL_VERSION);
        assert_eq!(frame.header_len_words(), BASE_HEADER_WORDS);
        assert_eq!(frame.flags().bits(), 0);
        assert_eq!(frame.payload_len(), 0);
        assert!(frame.options().is_empty());
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn test_load_and_extend_header() {
        let mut source = Frame::new();
        source.append_options(&[7, 11]).unwrap();
        source.write_crc();

        let mut fixed = [0u8; HEADER_SIZE];
        fixed.copy_from_slice(&source.header_bytes()[..HEADER_SIZE]);

        let mut frame = Frame::new();
        frame.write_payload(b"stale");
        frame.load_header(&fixed);
        frame.extend_header(&source.header_bytes()[HEADER_SIZE..]);

        assert!(frame.payload().is_empty());
        assert_eq!(frame.header_len_words(), 5);
        assert_eq!(frame.options(), vec![7, 11]);
        assert!(frame.verify_crc());
    }

    #[test]
    fn test_codec_decoding_precedence() {
        let all = FrameFlags::from_bits(
            FrameFlags::CODEC_RAW
                | FrameFlags::CODEC_JSON
                | FrameFlags::CODEC_MSGPACK
                | FrameFlags::CODEC_NATIVE
                | FrameFlags::CODEC_PROTO,
        );
        assert_eq!(PayloadCodec::from_flags(all), PayloadCodec::Proto);

        let no_proto = FrameFlags::from_bits(
            FrameFlags::CODEC_RAW | FrameFlags::CODEC_JSON | FrameFlags::CODEC_MSGPACK,
        );
        assert_eq!(PayloadCodec::from_flags(no_proto), PayloadCodec::Json);

        let raw_msgpack =
            FrameFlags::from_bits(FrameFlags::CODEC_RAW | FrameFlags::CODEC_MSGPACK);
        assert_eq!(PayloadCodec::from_flags(raw_msgpack), PayloadCodec::Raw);

        let msgpack = FrameFlags::from_bits(FrameFlags::CODEC_MSGPACK);
        assert_eq!(PayloadCodec::from_flags(msgpack), PayloadCodec::Msgpack);

        assert_eq!(
            PayloadCodec::from_flags(FrameFlags::new()),
            PayloadCodec::Native
        );
    }

    #[test]
    fn test_codec_bits_are_one_hot() {
        let codecs = [
            PayloadCodec::Raw,
            PayloadCodec::Json,
            PayloadCodec::Msgpack,
            PayloadCodec::Native,
            PayloadCodec::Proto,
        ];
        for codec in codecs {
            assert_eq!(codec.bit().count_ones(), 1);
            assert_eq!(
                PayloadCodec::from_flags(FrameFlags::from_bits(codec.bit())),
                codec
            );
        }
    }

    proptest! {
        /// Any single-bit flip in the CRC-covered region is detected.
        #[test]
        fn prop_crc_detects_single_bit_flips(
            flags in any::<u8>(),
            payload_len in any::<u32>(),
            byte in 0usize..8,
            bit in 0u8..8,
        ) {
            let mut frame = Frame::new();
            frame.set_flags(FrameFlags::from_bits(flags));
            frame.set_payload_len(payload_len);
            frame.write_crc();
            prop_assert!(frame.verify_crc());

            frame.header[byte] ^= 1 << bit;
            prop_assert!(!frame.verify_crc());
        }

        /// Option words survive the append/decode round trip.
        #[test]
        fn prop_options_roundtrip(options in proptest::collection::vec(any::<u32>(), 0..=12)) {
            let mut frame = Frame::new();
            frame.append_options(&options).unwrap();
            prop_assert_eq!(frame.options(), options);
            prop_assert_eq!(
                frame.header_len_words() as usize,
                BASE_HEADER_WORDS as usize + frame.options().len()
            );
        }
    }
}
