//! Dark-image statistics for background subtraction.
//!
//! A dark map carries the per-pixel mean and standard deviation of the
//! configured dark-frame range. It can be loaded from a precomputed file
//! pair or accumulated directly from the raw stream before analysis
//! starts. The file pair is big-endian, the one exception in an otherwise
//! little-endian format family.

use super::{read_map_file, DataError};
use crate::config::AnalysisConfig;
use crate::decode::{read_payload, DecodeError, HEADER_SIZE};
use crate::maps::FlatFieldMap;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Per-pixel dark mean and standard deviation.
#[derive(Debug, Clone)]
pub struct DarkMap {
    avg: Vec<f64>,
    std: Vec<f64>,
}

impl DarkMap {
    /// Wraps precomputed average/deviation images.
    pub fn from_parts(avg: Vec<f64>, std: Vec<f64>) -> Self {
        Self { avg, std }
    }

    /// Loads the big-endian f64 average/deviation file pair.
    pub fn from_files(
        avg_path: impl AsRef<Path>,
        std_path: impl AsRef<Path>,
        pixels: usize,
    ) -> Result<Self, DataError> {
        let avg = read_dark_file(avg_path, pixels)?;
        let std = read_dark_file(std_path, pixels)?;
        Ok(Self { avg, std })
    }

    /// Accumulates dark statistics from the dark-frame range of a raw
    /// dense stream.
    ///
    /// Seeks directly to the first dark frame (dark frames are dense and
    /// contiguous, so their offset is a plain product), applies the flat
    /// field when enabled, and keeps a running mean plus incremental
    /// variance, square-rooted after the last frame.
    pub fn from_stream<R: Read + Seek>(
        reader: &mut R,
        config: &AnalysisConfig,
        flat: Option<&FlatFieldMap>,
    ) -> Result<Self, DecodeError> {
        let pixels = (config.width * config.height) as usize;
        let bytes_in_image = pixels * 2;
        let bytes_in_frame = (HEADER_SIZE + bytes_in_image) as u64;

        let first = config.first_dark_frame;
        let last = config.last_dark_frame;

        let offset = first as u64 * bytes_in_frame;
        if offset > 0 {
            reader.seek(SeekFrom::Start(offset))?;
        }

        let mut avg = vec![0.0f64; pixels];
        let mut std = vec![0.0f64; pixels];
        let mut buffer = Vec::with_capacity(bytes_in_frame as usize);
        let mut image = vec![0.0f32; pixels];

        let mut samples = 1.0f64;
        for frame in first..=last {
            read_payload(reader, &mut buffer, bytes_in_frame as usize)?;
            for (i, pair) in buffer[HEADER_SIZE..].chunks_exact(2).enumerate() {
                image[i] = LittleEndian::read_i16(pair) as f32;
            }

            if let Some(field) = flat {
                field.apply(&mut image);
            }

            for i in 0..pixels {
                let value = image[i] as f64;
                let previous = avg[i];
                avg[i] += (value - previous) / samples;
                std[i] += (value - avg[i]) * (value - previous);

                if frame == last {
                    std[i] = (std[i] / samples).sqrt();
                }
            }
            samples += 1.0;
        }

        tracing::info!(
            frames = last - first + 1,
            pixels,
            "Accumulated dark image from stream"
        );

        Ok(Self { avg, std })
    }

    /// Dark mean of one pixel.
    #[inline]
    pub fn avg(&self, index: usize) -> f64 {
        self.avg[index]
    }

    /// Dark standard deviation of one pixel.
    #[inline]
    pub fn std(&self, index: usize) -> f64 {
        self.std[index]
    }

    /// Number of pixels covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.avg.len()
    }

    /// Whether the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.avg.is_empty()
    }

    /// Subtracts the dark level from one pixel value.
    ///
    /// The result is clamped at zero, and anything at or below
    /// `threshold + sigma * std` is squelched entirely.
    pub fn subtract(&self, value: f32, index: usize, threshold: f32, sigma: f32) -> f32 {
        let subtracted = (value as f64 - self.avg[index]).max(0.0);
        let cutoff = threshold as f64 + sigma as f64 * self.std[index];
        if subtracted <= cutoff {
            0.0
        } else {
            subtracted as f32
        }
    }
}

fn read_dark_file(path: impl AsRef<Path>, pixels: usize) -> Result<Vec<f64>, DataError> {
    let bytes = read_map_file(path)?;
    if bytes.len() < pixels * 8 {
        return Err(DataError::LengthMismatch {
            what: "dark image",
            expected: pixels,
            actual: bytes.len() / 8,
        });
    }
    Ok(bytes[..pixels * 8]
        .chunks_exact(8)
        .map(BigEndian::read_f64)
        .collect())
}
