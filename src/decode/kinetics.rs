//! Kinetics-sliced payload decoding.
//!
//! In kinetics mode the sensor accumulates several exposures into one
//! physical readout, stacked vertically as row slices. One physical frame
//! is buffered once; each logical read reinterprets a shifted row range of
//! that buffer as one slice until the per-frame countdown is exhausted,
//! then the next physical frame is read from the stream.
//!
//! The slice-to-row arithmetic is kept exactly as the detector defines it:
//! `first_pixel = (slice_top - ordinal * slice_height) * width`, with the
//! ordinal starting at 2 for the first usable slice. The geometry test
//! below pins this mapping on a small synthetic layout.

use super::{read_payload, DecodeError, Frame, FrameHeader};
use crate::config::KineticsGeometry;
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek};

/// Decoder state for the kinetics frame variant.
///
/// The slice scan state (countdown, ordinal, running logical index) is
/// explicit here rather than hidden behind the shared decoding path.
#[derive(Debug)]
pub struct KineticsFormat {
    width: u32,
    slice_top: u32,
    slice_height: u32,
    slices_per_frame: u32,
    sensor_pixels: u32,
    first_frame: i32,
    payload: Vec<u8>,
    full_values: Vec<f32>,
    physical_index: i32,
    logical_index: i32,
    clock: f64,
    tick: f64,
    countdown: u32,
    ordinal: u32,
    buffered: bool,
}

impl KineticsFormat {
    /// Creates a kinetics decoder for a `width` x `height` sensor with the
    /// given slice geometry. `first_frame` anchors logical slice indices.
    pub fn new(width: u32, height: u32, geometry: &KineticsGeometry, first_frame: i32) -> Self {
        Self {
            width,
            slice_top: geometry.slice_top,
            slice_height: geometry.slice_height,
            slices_per_frame: geometry.slices_per_frame(),
            sensor_pixels: width * height,
            first_frame,
            payload: Vec::with_capacity((width * height) as usize * 2),
            full_values: Vec::with_capacity((width * height) as usize),
            physical_index: 0,
            logical_index: 0,
            clock: 0.0,
            tick: 0.0,
            countdown: 0,
            ordinal: 0,
            buffered: false,
        }
    }

    /// Number of pixels in one slice.
    #[inline]
    pub fn slice_pixels(&self) -> usize {
        (self.slice_height * self.width) as usize
    }

    /// Whether the buffered physical frame still has slices to hand out.
    ///
    /// A physical frame that began inside a byte range is drained fully
    /// even when the range boundary has been passed.
    #[inline]
    pub fn has_slices_in_frame(&self) -> bool {
        self.countdown != 0
    }

    /// Reads the next logical slice into `frame`, pulling a new physical
    /// frame from the stream when the current one is exhausted.
    pub fn read_frame<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        frame: &mut Frame,
    ) -> Result<(), DecodeError> {
        if !self.buffered || self.countdown == 0 {
            let header = FrameHeader::read_from(reader)?;

            if header.pixel_count <= 0 || header.pixel_count as u32 > self.sensor_pixels {
                return Err(DecodeError::PixelCountMismatch {
                    expected: self.sensor_pixels,
                    actual: header.pixel_count.max(0) as u32,
                });
            }

            let count = header.pixel_count as usize;
            read_payload(reader, &mut self.payload, count * 2)?;

            self.full_values.clear();
            self.full_values.extend(
                self.payload
                    .chunks_exact(2)
                    .map(|pair| LittleEndian::read_i16(pair) as f32),
            );

            self.physical_index = header.frame_index;
            self.clock = header.clock;
            self.tick = header.tick as f64;
            // First usable slice of this frame; subsequent slices advance
            // the countdown and ordinal until the frame is drained.
            self.logical_index =
                (header.frame_index - self.first_frame) * self.slices_per_frame as i32;
            self.countdown = self.slices_per_frame - 1;
            self.ordinal = 2;
            self.buffered = true;
        } else {
            self.countdown -= 1;
            self.logical_index += 1;
            self.ordinal += 1;
        }

        let first_pixel = (self.slice_top as i64 - (self.ordinal * self.slice_height) as i64)
            * self.width as i64;
        let slice_pixels = self.slice_pixels();
        if first_pixel < 0 || first_pixel as usize + slice_pixels > self.full_values.len() {
            return Err(DecodeError::InvalidPixelIndex {
                index: first_pixel.max(0) as u32,
                limit: self.full_values.len() as u32,
            });
        }

        let start = first_pixel as usize;
        let values = frame.values_mut();
        values.clear();
        values.extend_from_slice(&self.full_values[start..start + slice_pixels]);

        frame.set_image(self.physical_index, self.clock, self.tick);
        frame.set_logical_index(self.logical_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::write_header;
    use std::io::Cursor;

    const WIDTH: u32 = 4;
    const HEIGHT: u32 = 16;

    fn geometry() -> KineticsGeometry {
        KineticsGeometry {
            slice_top: 10,
            slice_height: 2,
            first_slice: 1,
            last_slice: 3,
        }
    }

    fn frame_bytes(frame_index: i32) -> Vec<u8> {
        let pixels = (WIDTH * HEIGHT) as i32;
        let mut bytes = write_header(&FrameHeader {
            number: 0,
            clock: 0.0,
            height: HEIGHT as i32,
            width: WIDTH as i32,
            bytes_per_value: 2,
            pixel_count: pixels,
            frame_index,
            version: 2,
            tick: 0,
        })
        .to_vec();
        // Pixel value = linear sensor index, so row origins are visible.
        for i in 0..pixels {
            bytes.extend_from_slice(&(i as i16).to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_slice_row_geometry() {
        let mut cursor = Cursor::new(frame_bytes(0));
        let mut format = KineticsFormat::new(WIDTH, HEIGHT, &geometry(), 0);
        let mut frame = Frame::new(WIDTH, 2, 0);

        // Ordinals 2, 3, 4 with slice_top 10 and slice height 2 give row
        // origins 6, 4 and 2: the slice window walks up the sensor.
        let expected_starts = [6 * WIDTH, 4 * WIDTH, 2 * WIDTH];
        for (slice, &start) in expected_starts.iter().enumerate() {
            format.read_frame(&mut cursor, &mut frame).unwrap();
            assert_eq!(frame.logical_index(), slice as i32);
            assert_eq!(frame.pixel_count(), 8);
            assert_eq!(frame.values()[0], start as f32);
            assert_eq!(frame.values()[7], (start + 7) as f32);
        }
        assert!(!format.has_slices_in_frame());
    }

    #[test]
    fn test_logical_indices_continue_across_frames() {
        let mut bytes = frame_bytes(5);
        bytes.extend_from_slice(&frame_bytes(6));
        let mut cursor = Cursor::new(bytes);
        let mut format = KineticsFormat::new(WIDTH, HEIGHT, &geometry(), 5);
        let mut frame = Frame::new(WIDTH, 2, 0);

        for expected in 0..6 {
            format.read_frame(&mut cursor, &mut frame).unwrap();
            assert_eq!(frame.logical_index(), expected);
        }
    }

    #[test]
    fn test_single_read_buffers_physical_frame() {
        // After the first slice the remaining reads touch no stream bytes.
        let bytes = frame_bytes(0);
        let total = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        let mut format = KineticsFormat::new(WIDTH, HEIGHT, &geometry(), 0);
        let mut frame = Frame::new(WIDTH, 2, 0);

        format.read_frame(&mut cursor, &mut frame).unwrap();
        assert_eq!(cursor.position(), total);
        assert!(format.has_slices_in_frame());

        format.read_frame(&mut cursor, &mut frame).unwrap();
        format.read_frame(&mut cursor, &mut frame).unwrap();
        assert_eq!(cursor.position(), total);
    }
}
