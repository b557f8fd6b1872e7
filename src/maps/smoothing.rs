//! Spatial smoothing divisor for two-time normalization.

use super::{read_map_file, DataError};
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;

/// Precomputed per-pixel smoothing values, little-endian f64 on disk.
///
/// Pixels with a zero smoothing value cannot be normalized; the two-time
/// engine leaves their entries untouched.
#[derive(Debug, Clone)]
pub struct SmoothingMap {
    values: Vec<f64>,
}

impl SmoothingMap {
    /// Wraps an in-memory grid.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Loads the grid from a little-endian f64 file of `pixels` values.
    pub fn from_file(path: impl AsRef<Path>, pixels: usize) -> Result<Self, DataError> {
        let bytes = read_map_file(path)?;
        if bytes.len() < pixels * 8 {
            return Err(DataError::LengthMismatch {
                what: "smoothing map",
                expected: pixels,
                actual: bytes.len() / 8,
            });
        }
        let values = bytes[..pixels * 8]
            .chunks_exact(8)
            .map(LittleEndian::read_f64)
            .collect();
        Ok(Self { values })
    }

    /// Smoothing value of one pixel; zero when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    /// Number of pixels covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the grid is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
