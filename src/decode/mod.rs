//! Binary frame decoding and stream synchronization.
//!
//! The detector writes a stream of frames, each a 1024-byte header followed
//! by a format-dependent payload (dense, sparse-indexed or kinetics-sliced).
//! This module locates frame boundaries in an arbitrary byte range, skips
//! to the first analysed frame and decodes payloads into reusable [`Frame`]
//! buffers. Decoding the same byte range twice yields identical output,
//! which is what makes externally-retried work safe.

mod dense;
mod header;
mod kinetics;
mod sparse;
mod stream;

pub use dense::DenseFormat;
pub use header::{write_header, FrameHeader, HEADER_SIZE, SYNC_MARKER_LEN};
pub use kinetics::KineticsFormat;
pub use sparse::SparseFormat;
pub use stream::{ByteRange, FrameStream};

use byteorder::ReadBytesExt;
use std::io::{Read, Seek, SeekFrom};

/// Errors raised while synchronizing to or decoding the frame stream.
///
/// All of these are fatal for the unit of work that hit them; an external
/// scheduler may retry the identical byte range, never an altered one.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("no sync marker found before end of stream")]
    SyncNotFound,
    #[error("truncated header: got {got} of 1024 bytes")]
    TruncatedHeader { got: usize },
    #[error("truncated payload: expected {expected} bytes, got {got}")]
    TruncatedPayload { expected: usize, got: usize },
    #[error("pixel count {actual} does not match expected {expected}")]
    PixelCountMismatch { expected: u32, actual: u32 },
    #[error("pixel index {index} outside image of {limit} pixels")]
    InvalidPixelIndex { index: u32, limit: u32 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Scans forward for the 12-byte `0xFF` sync marker and realigns the
/// stream to the start of the enclosing header.
///
/// The marker sits at the tail of the 1024-byte header, so a match seeks
/// back by the full header size. Reaching end-of-stream without a match is
/// a fatal [`DecodeError::SyncNotFound`].
pub fn sync_to_marker<R: Read + Seek>(reader: &mut R) -> Result<(), DecodeError> {
    let mut consecutive = 0usize;
    loop {
        let value = match reader.read_u8() {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(DecodeError::SyncNotFound);
            }
            Err(e) => return Err(DecodeError::Io(e)),
        };

        if value == 0xFF {
            consecutive += 1;
            // The count must be checked on every byte; deferring the check
            // can skip past the header depending on the payload bytes that
            // follow the marker.
            if consecutive == SYNC_MARKER_LEN {
                reader.seek(SeekFrom::Current(-(HEADER_SIZE as i64)))?;
                return Ok(());
            }
        } else {
            consecutive = 0;
        }
    }
}

/// Skips forward to the first frame whose index is at least `target`
/// without decoding any payload.
///
/// Reads one header at a time; while the frame index is below the target
/// the payload is skipped by seeking `pixel_count * value_size` bytes. On
/// reaching the target the stream is repositioned at the start of that
/// frame's header. Returns `false` when the byte range `last_byte` is
/// exhausted before any such frame appears.
pub fn skip_to_frame<R: Read + Seek>(
    reader: &mut R,
    target: i32,
    last_byte: u64,
    value_size: u64,
) -> Result<bool, DecodeError> {
    loop {
        if reader.stream_position()? >= last_byte {
            return Ok(false);
        }

        let header = FrameHeader::read_from(reader)?;
        if header.frame_index < target {
            let payload = header.pixel_count.max(0) as u64 * value_size;
            reader.seek(SeekFrom::Current(payload as i64))?;
        } else {
            reader.seek(SeekFrom::Current(-(HEADER_SIZE as i64)))?;
            return Ok(true);
        }
    }
}

/// One decoded frame, reused across reads.
///
/// Holds a dense value image straight after payload decode; the correction
/// pipeline rewrites it in place and finally compacts it into parallel
/// (index, value) arrays covering only partition-assigned pixels.
#[derive(Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    frame_offset: i32,
    physical_index: i32,
    logical_index: i32,
    pixel_count: usize,
    indices: Vec<u32>,
    values: Vec<f32>,
    compact: bool,
    sum: f64,
    clock: f64,
    tick: f64,
}

impl Frame {
    /// Creates a reusable frame buffer for the given (effective) geometry.
    ///
    /// `frame_offset` is the first analysed frame; logical indices are
    /// physical indices minus this offset.
    pub fn new(width: u32, height: u32, frame_offset: i32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            width,
            height,
            frame_offset,
            physical_index: 0,
            logical_index: 0,
            pixel_count: 0,
            indices: Vec::with_capacity(pixels),
            values: Vec::with_capacity(pixels),
            compact: false,
            sum: 0.0,
            clock: 0.0,
            tick: 0.0,
        }
    }

    /// Installs a freshly decoded dense image.
    ///
    /// `physical_index` is the header frame index; the logical index is
    /// derived from the configured offset. Kinetics decoding overrides the
    /// logical index per slice via [`Frame::set_logical_index`].
    pub fn set_image(&mut self, physical_index: i32, clock: f64, tick: f64) {
        self.physical_index = physical_index;
        self.logical_index = physical_index - self.frame_offset;
        self.pixel_count = self.values.len();
        self.indices.clear();
        self.compact = false;
        self.sum = 0.0;
        self.clock = clock;
        self.tick = tick;
    }

    /// Overrides the logical index (kinetics slices carry their own).
    pub fn set_logical_index(&mut self, index: i32) {
        self.logical_index = index;
    }

    /// Frame width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Physical frame index from the header.
    #[inline]
    pub fn physical_index(&self) -> i32 {
        self.physical_index
    }

    /// Logical frame index (physical minus the configured offset).
    #[inline]
    pub fn logical_index(&self) -> i32 {
        self.logical_index
    }

    /// Number of live pixels (dense image size, or compacted count).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Sets the live pixel count.
    pub fn set_pixel_count(&mut self, count: usize) {
        self.pixel_count = count;
    }

    /// Pixel values; dense until compaction, compact afterwards.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Mutable pixel values for in-place correction.
    #[inline]
    pub fn values_mut(&mut self) -> &mut Vec<f32> {
        &mut self.values
    }

    /// Pixel indices parallel to [`Frame::values`] once compacted.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Mutable index buffer, used by the compaction filter.
    #[inline]
    pub fn indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.indices
    }

    /// Whether the frame has been compacted to assigned pixels.
    #[inline]
    pub fn is_compact(&self) -> bool {
        self.compact
    }

    /// Marks the frame as compacted.
    pub fn set_compact(&mut self, compact: bool) {
        self.compact = compact;
    }

    /// Sum of assigned pixel intensities (set by the compaction filter).
    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Sets the assigned-intensity sum.
    pub fn set_sum(&mut self, sum: f64) {
        self.sum = sum;
    }

    /// Acquisition clock of the frame.
    #[inline]
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Hardware tick of the frame.
    #[inline]
    pub fn tick(&self) -> f64 {
        self.tick
    }
}

pub(crate) fn read_payload<R: Read>(
    reader: &mut R,
    buffer: &mut Vec<u8>,
    expected: usize,
) -> Result<(), DecodeError> {
    buffer.resize(expected, 0);
    let mut filled = 0;
    while filled < expected {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => {
                return Err(DecodeError::TruncatedPayload {
                    expected,
                    got: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
    Ok(())
}
