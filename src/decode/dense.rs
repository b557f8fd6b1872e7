//! Dense payload decoding.
//!
//! A dense frame stores one little-endian 16-bit value per sensor pixel in
//! raster order; the pixel index is implicit. The header pixel count must
//! match the configured sensor area.

use super::{read_payload, DecodeError, Frame, FrameHeader};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek};

/// Decoder state for the dense frame variant.
#[derive(Debug)]
pub struct DenseFormat {
    payload: Vec<u8>,
    expected_pixels: u32,
}

impl DenseFormat {
    /// Creates a dense decoder for a `width` x `height` sensor.
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = width * height;
        Self {
            payload: Vec::with_capacity(pixels as usize * 2),
            expected_pixels: pixels,
        }
    }

    /// Reads one frame (header + payload) into `frame`.
    pub fn read_frame<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        frame: &mut Frame,
    ) -> Result<(), DecodeError> {
        let header = FrameHeader::read_from(reader)?;

        if header.pixel_count < 0 || header.pixel_count as u32 != self.expected_pixels {
            return Err(DecodeError::PixelCountMismatch {
                expected: self.expected_pixels,
                actual: header.pixel_count.max(0) as u32,
            });
        }

        let count = header.pixel_count as usize;
        read_payload(reader, &mut self.payload, count * 2)?;

        let values = frame.values_mut();
        values.clear();
        values.extend(
            self.payload
                .chunks_exact(2)
                .map(|pair| LittleEndian::read_i16(pair) as f32),
        );

        frame.set_image(header.frame_index, header.clock, header.tick as f64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::write_header;
    use std::io::Cursor;

    fn frame_bytes(width: i32, height: i32, frame_index: i32, values: &[i16]) -> Vec<u8> {
        let mut bytes = write_header(&FrameHeader {
            number: 0,
            clock: 2.5,
            height,
            width,
            bytes_per_value: 2,
            pixel_count: values.len() as i32,
            frame_index,
            version: 2,
            tick: 11,
        })
        .to_vec();
        for &v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_dense_decode() {
        let values: Vec<i16> = (0..16).collect();
        let mut cursor = Cursor::new(frame_bytes(4, 4, 3, &values));
        let mut format = DenseFormat::new(4, 4);
        let mut frame = Frame::new(4, 4, 0);

        format.read_frame(&mut cursor, &mut frame).unwrap();

        assert_eq!(frame.physical_index(), 3);
        assert_eq!(frame.pixel_count(), 16);
        assert_eq!(frame.values()[5], 5.0);
        assert_eq!(frame.clock(), 2.5);
        assert_eq!(frame.tick(), 11.0);
    }

    #[test]
    fn test_pixel_count_mismatch_is_surfaced() {
        let values: Vec<i16> = (0..12).collect();
        let mut cursor = Cursor::new(frame_bytes(4, 4, 0, &values));
        let mut format = DenseFormat::new(4, 4);
        let mut frame = Frame::new(4, 4, 0);

        assert!(matches!(
            format.read_frame(&mut cursor, &mut frame),
            Err(DecodeError::PixelCountMismatch {
                expected: 16,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let values: Vec<i16> = (0..16).collect();
        let mut bytes = frame_bytes(4, 4, 0, &values);
        bytes.truncate(bytes.len() - 10);
        let mut cursor = Cursor::new(bytes);
        let mut format = DenseFormat::new(4, 4);
        let mut frame = Frame::new(4, 4, 0);

        assert!(matches!(
            format.read_frame(&mut cursor, &mut frame),
            Err(DecodeError::TruncatedPayload {
                expected: 32,
                got: 22
            })
        ));
    }
}
