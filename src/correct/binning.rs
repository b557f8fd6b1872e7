//! Spatial binning filter.
//!
//! Collapses blocks of `bin_x` x `bin_y` pixels into single block sums,
//! writing the binned image into the prefix of the frame's value buffer.
//! Output dimensions are `floor(width/bin_x)` x `floor(height/bin_y)`;
//! trailing partial rows and columns are discarded.

use super::FrameFilter;
use crate::decode::Frame;

/// Sums pixel blocks into a reduced image.
pub struct BinningFilter {
    bin_x: u32,
    bin_y: u32,
}

impl BinningFilter {
    pub fn new(bin_x: u32, bin_y: u32) -> Self {
        Self { bin_x, bin_y }
    }
}

impl FrameFilter for BinningFilter {
    fn apply(&self, frame: &mut Frame) {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let bin_x = self.bin_x as usize;
        let bin_y = self.bin_y as usize;
        let xbins = width / bin_x;
        let ybins = height / bin_y;

        let values = frame.values_mut();
        // Each output slot precedes the first pixel of its source block,
        // so writing into the prefix never clobbers unread input.
        for by in 0..ybins {
            for bx in 0..xbins {
                let mut sum = 0.0f32;
                for row in 0..bin_y {
                    let base = (by * bin_y + row) * width + bx * bin_x;
                    for col in 0..bin_x {
                        sum += values[base + col];
                    }
                }
                values[by * xbins + bx] = sum;
            }
        }

        values.truncate(xbins * ybins);
        frame.set_pixel_count(xbins * ybins);
    }

    fn name(&self) -> &'static str {
        "binning"
    }
}
