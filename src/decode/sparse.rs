//! Sparse payload decoding.
//!
//! A sparse frame stores only the pixels that fired: an index block of
//! `pixel_count` little-endian i32 values followed by a value block of
//! `pixel_count` little-endian i16 values. Unlisted pixels are implicitly
//! zero; decoding expands the payload into the full dense image.

use super::{read_payload, DecodeError, Frame, FrameHeader};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek};

/// Decoder state for the sparse-indexed frame variant.
#[derive(Debug)]
pub struct SparseFormat {
    payload: Vec<u8>,
    full_frame: u32,
}

impl SparseFormat {
    /// Creates a sparse decoder for a `width` x `height` sensor.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            payload: Vec::new(),
            full_frame: width * height,
        }
    }

    /// Reads one frame (header + index/value blocks) into `frame`.
    pub fn read_frame<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        frame: &mut Frame,
    ) -> Result<(), DecodeError> {
        let header = FrameHeader::read_from(reader)?;

        if header.pixel_count < 0 || header.pixel_count as u32 > self.full_frame {
            return Err(DecodeError::PixelCountMismatch {
                expected: self.full_frame,
                actual: header.pixel_count.max(0) as u32,
            });
        }

        let count = header.pixel_count as usize;
        read_payload(reader, &mut self.payload, count * 6)?;

        let (index_block, value_block) = self.payload.split_at(count * 4);

        let values = frame.values_mut();
        values.clear();
        values.resize(self.full_frame as usize, 0.0);

        for k in 0..count {
            let index = LittleEndian::read_i32(&index_block[k * 4..k * 4 + 4]);
            let value = LittleEndian::read_i16(&value_block[k * 2..k * 2 + 2]);
            if index < 0 || index as u32 >= self.full_frame {
                return Err(DecodeError::InvalidPixelIndex {
                    index: index.max(0) as u32,
                    limit: self.full_frame,
                });
            }
            values[index as usize] = value as f32;
        }

        frame.set_image(header.frame_index, header.clock, header.tick as f64);
        Ok(())
    }
}
