//! Flat-field sensitivity correction.

use super::{read_map_file, DataError};
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;

/// Per-pixel sensitivity multipliers, little-endian f64 on disk.
#[derive(Debug, Clone)]
pub struct FlatFieldMap {
    values: Vec<f64>,
}

impl FlatFieldMap {
    /// Wraps an in-memory field.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Loads the field from a little-endian f64 file of `pixels` values.
    pub fn from_file(path: impl AsRef<Path>, pixels: usize) -> Result<Self, DataError> {
        let bytes = read_map_file(path)?;
        if bytes.len() < pixels * 8 {
            return Err(DataError::LengthMismatch {
                what: "flat field",
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

    /// Number of pixels covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the field is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Multiplies an image by the field, pixel by pixel.
    pub fn apply(&self, image: &mut [f32]) {
        for (pixel, factor) in image.iter_mut().zip(self.values.iter()) {
            *pixel *= *factor as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_apply_multiplies() {
        let field = FlatFieldMap::from_values(vec![2.0, 0.5, 1.0]);
        let mut image = [3.0f32, 8.0, 5.0];
        field.apply(&mut image);
        assert_eq!(image, [6.0, 4.0, 5.0]);
    }

    #[test]
    fn test_from_file_little_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatfield");
        let mut file = std::fs::File::create(&path).unwrap();
        for v in [1.25f64, 0.75] {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        drop(file);

        let field = FlatFieldMap::from_file(&path, 2).unwrap();
        let mut image = [4.0f32, 4.0];
        field.apply(&mut image);
        assert_eq!(image, [5.0, 3.0]);
    }
}
