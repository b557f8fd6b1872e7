//! Frame header parsing.
//!
//! Every frame starts with a fixed 1024-byte little-endian header. Only a
//! handful of fields are meaningful to the analysis; the rest of the
//! record is detector housekeeping. The 12-byte `0xFF` sync marker sits at
//! the tail of the header, which is why resynchronization seeks *back* by
//! the header size after locating it.

use super::DecodeError;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 1024;

/// Number of consecutive `0xFF` bytes forming the sync marker.
pub const SYNC_MARKER_LEN: usize = 12;

// Field byte offsets within the header record.
const OFFSET_NUMBER: usize = 56;
const OFFSET_HEIGHT: usize = 108;
const OFFSET_WIDTH: usize = 112;
const OFFSET_BYTES_PER_VALUE: usize = 116;
const OFFSET_CLOCK: usize = 128;
const OFFSET_PIXEL_COUNT: usize = 152;
const OFFSET_FRAME_INDEX: usize = 160;
const OFFSET_VERSION: usize = 616;
const OFFSET_TICK: usize = 620;

/// Decoded fields of one frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    /// Per-stream frame number (single byte, wraps).
    pub number: u8,
    /// Acquisition clock.
    pub clock: f64,
    /// Frame height in pixels.
    pub height: i32,
    /// Frame width in pixels.
    pub width: i32,
    /// Bytes per stored pixel value.
    pub bytes_per_value: i32,
    /// Number of pixel values in the payload.
    pub pixel_count: i32,
    /// Physical frame index, strictly increasing through the stream.
    pub frame_index: i32,
    /// Format version byte.
    pub version: u8,
    /// Hardware tick counter.
    pub tick: i32,
}

impl FrameHeader {
    /// Parses a header from a raw 1024-byte buffer.
    pub fn parse(buffer: &[u8]) -> Result<Self, DecodeError> {
        if buffer.len() < HEADER_SIZE {
            return Err(DecodeError::TruncatedHeader {
                got: buffer.len(),
            });
        }

        Ok(Self {
            number: buffer[OFFSET_NUMBER],
            clock: LittleEndian::read_f64(&buffer[OFFSET_CLOCK..OFFSET_CLOCK + 8]),
            height: LittleEndian::read_i32(&buffer[OFFSET_HEIGHT..OFFSET_HEIGHT + 4]),
            width: LittleEndian::read_i32(&buffer[OFFSET_WIDTH..OFFSET_WIDTH + 4]),
            bytes_per_value: LittleEndian::read_i32(
                &buffer[OFFSET_BYTES_PER_VALUE..OFFSET_BYTES_PER_VALUE + 4],
            ),
            pixel_count: LittleEndian::read_i32(
                &buffer[OFFSET_PIXEL_COUNT..OFFSET_PIXEL_COUNT + 4],
            ),
            frame_index: LittleEndian::read_i32(
                &buffer[OFFSET_FRAME_INDEX..OFFSET_FRAME_INDEX + 4],
            ),
            version: buffer[OFFSET_VERSION],
            tick: LittleEndian::read_i32(&buffer[OFFSET_TICK..OFFSET_TICK + 4]),
        })
    }

    /// Reads and parses one header from the stream.
    ///
    /// A short read is a [`DecodeError::TruncatedHeader`]; the caller
    /// decides whether that is end-of-input or corruption.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut buffer = [0u8; HEADER_SIZE];
        read_fully(reader, &mut buffer)?;
        Self::parse(&buffer)
    }
}

fn read_fully<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), DecodeError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => {
                return Err(DecodeError::TruncatedHeader { got: filled });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
    Ok(())
}

/// Serializes header fields into a 1024-byte buffer.
///
/// Only used to build synthetic streams in tests, but kept public so
/// callers can fabricate fixtures the same way.
pub fn write_header(header: &FrameHeader) -> [u8; HEADER_SIZE] {
    let mut buffer = [0u8; HEADER_SIZE];
    buffer[OFFSET_NUMBER] = header.number;
    LittleEndian::write_f64(&mut buffer[OFFSET_CLOCK..OFFSET_CLOCK + 8], header.clock);
    LittleEndian::write_i32(&mut buffer[OFFSET_HEIGHT..OFFSET_HEIGHT + 4], header.height);
    LittleEndian::write_i32(&mut buffer[OFFSET_WIDTH..OFFSET_WIDTH + 4], header.width);
    LittleEndian::write_i32(
        &mut buffer[OFFSET_BYTES_PER_VALUE..OFFSET_BYTES_PER_VALUE + 4],
        header.bytes_per_value,
    );
    LittleEndian::write_i32(
        &mut buffer[OFFSET_PIXEL_COUNT..OFFSET_PIXEL_COUNT + 4],
        header.pixel_count,
    );
    LittleEndian::write_i32(
        &mut buffer[OFFSET_FRAME_INDEX..OFFSET_FRAME_INDEX + 4],
        header.frame_index,
    );
    buffer[OFFSET_VERSION] = header.version;
    LittleEndian::write_i32(&mut buffer[OFFSET_TICK..OFFSET_TICK + 4], header.tick);
    // Sync marker at the tail of the header.
    for byte in &mut buffer[HEADER_SIZE - SYNC_MARKER_LEN..] {
        *byte = 0xFF;
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FrameHeader {
        FrameHeader {
            number: 3,
            clock: 1.5,
            height: 64,
            width: 128,
            bytes_per_value: 2,
            pixel_count: 64 * 128,
            frame_index: 42,
            version: 2,
            tick: 9000,
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = sample_header();
        let buffer = write_header(&header);
        let parsed = FrameHeader::parse(&buffer).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_short_buffer_is_truncated() {
        let buffer = [0u8; 100];
        assert!(matches!(
            FrameHeader::parse(&buffer),
            Err(DecodeError::TruncatedHeader { got: 100 })
        ));
    }

    #[test]
    fn test_read_from_short_stream() {
        let bytes = vec![0u8; 512];
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(
            FrameHeader::read_from(&mut cursor),
            Err(DecodeError::TruncatedHeader { got: 512 })
        ));
    }

    #[test]
    fn test_marker_sits_at_header_tail() {
        let buffer = write_header(&sample_header());
        assert!(buffer[HEADER_SIZE - SYNC_MARKER_LEN..]
            .iter()
            .all(|&b| b == 0xFF));
        assert_ne!(buffer[HEADER_SIZE - SYNC_MARKER_LEN - 1], 0xFF);
    }
}
