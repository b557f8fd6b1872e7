//! Per-frame global intensity sums.
//!
//! Two-time normalization divides every pixel value by the total intensity
//! of its frame. The sums come either from a side file written by a prior
//! pass (little-endian f64, with a leading index row that is skipped) or
//! straight from the frame records of the decode phase.

use super::{read_map_file, DataError};
use crate::records::FrameRecord;
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;

/// Per-frame intensity sums, indexed by logical frame.
#[derive(Debug, Clone)]
pub struct FrameSums {
    sums: Vec<f64>,
}

impl FrameSums {
    /// Loads sums for `total_frames` frames from a side file.
    ///
    /// The file holds `2 * total_frames` little-endian doubles; the first
    /// half is a frame-index row and carries no intensity data.
    pub fn from_file(path: impl AsRef<Path>, total_frames: usize) -> Result<Self, DataError> {
        let bytes = read_map_file(path)?;
        let expected = 2 * total_frames * 8;
        if bytes.len() < expected {
            return Err(DataError::LengthMismatch {
                what: "frame sums",
                expected: 2 * total_frames,
                actual: bytes.len() / 8,
            });
        }
        let sums = bytes[total_frames * 8..expected]
            .chunks_exact(8)
            .map(LittleEndian::read_f64)
            .collect();
        Ok(Self { sums })
    }

    /// Builds sums from decoded frame records.
    pub fn from_records(
        records: impl IntoIterator<Item = FrameRecord>,
        total_frames: usize,
    ) -> Self {
        let mut sums = vec![0.0; total_frames];
        for record in records {
            let index = record.frame_index;
            if index >= 0 && (index as usize) < total_frames {
                sums[index as usize] = record.sum;
            }
        }
        Self { sums }
    }

    /// Sum of the given logical frame; zero when out of range.
    #[inline]
    pub fn get(&self, frame_index: i32) -> f64 {
        if frame_index < 0 {
            return 0.0;
        }
        self.sums.get(frame_index as usize).copied().unwrap_or(0.0)
    }

    /// Number of frames covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    /// Whether no frames are covered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }
}
