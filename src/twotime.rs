//! Two-time correlation engine.
//!
//! For non-stationary dynamics the full frame-by-frame correlation matrix
//! of one dynamic bin is accumulated instead of a τ-averaged curve. The
//! engine consumes the bin's samples ordered pixel-major, normalizes each
//! pixel's series by its spatial smoothing value and the per-frame global
//! sum, and accumulates every pixel into one shared upper triangle.
//!
//! One engine instance owns exactly one bin; per-pixel-count
//! normalization of the triangle happens downstream.

use crate::config::{AnalysisConfig, ConfigError};
use crate::maps::{FrameSums, SmoothingMap};
use crate::multitau::TemporalPixelFilter;
use crate::records::BinSample;
use std::sync::Arc;

/// Errors raised during two-time accumulation.
#[derive(Debug, thiserror::Error)]
pub enum CorrelateError {
    #[error("two-time engine for bin {expected} received bin {actual}")]
    MixedBins { expected: i16, actual: i16 },
}

/// Linearized upper-triangular correlation matrix of one dynamic bin.
///
/// `data[0]` carries the bin id; the remaining `N(N-1)/2` entries hold the
/// accumulated products for frame pairs (i, j), i < j, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoTimeMatrix {
    /// Dynamic bin the matrix belongs to.
    pub bin: i16,
    /// Bin-id header followed by the linearized triangle.
    pub data: Vec<f64>,
}

impl TwoTimeMatrix {
    /// Number of frames the triangle spans.
    pub fn frame_count(&self) -> usize {
        // data holds 1 + N(N-1)/2 entries.
        let pairs = self.data.len() - 1;
        (1 + ((1 + 8 * pairs) as f64).sqrt() as usize) / 2
    }

    /// Accumulated product for the frame pair (i, j) with i < j.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let n = self.frame_count();
        debug_assert!(i < j && j < n);
        // Entries for row i start after the rows above it.
        let row_start = i * n - (i * (i + 1)) / 2;
        self.data[1 + row_start + (j - i - 1)]
    }
}

/// Per-bin two-time reducer.
pub struct TwoTimeEngine {
    frame_count: usize,
    smoothing: Arc<SmoothingMap>,
    frame_sums: Arc<FrameSums>,
    filter: TemporalPixelFilter,
    series: Vec<f64>,
    triangle: Vec<f64>,
    bin: Option<i16>,
}

impl TwoTimeEngine {
    /// Builds an engine from a validated configuration and the shared
    /// normalization inputs.
    pub fn from_config(
        config: &AnalysisConfig,
        smoothing: Arc<SmoothingMap>,
        frame_sums: Arc<FrameSums>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let raw = config.logical_frame_count() as usize;
        if raw < 1 {
            return Err(ConfigError::InvalidFrameRange);
        }

        let filter = TemporalPixelFilter::new(
            config.pixel_filter_stride,
            config.pixel_filter_sum,
        );
        // The triangle spans the series after temporal down-sampling.
        let frame_count = filter.output_len(raw).max(1);

        Ok(Self {
            frame_count,
            smoothing,
            frame_sums,
            filter,
            series: vec![0.0; raw],
            triangle: vec![0.0; 1 + frame_count * (frame_count - 1) / 2],
            bin: None,
        })
    }

    /// Number of frames the output triangle spans.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Accumulates one group of samples and returns the current matrix.
    ///
    /// Samples must arrive ordered by pixel, then frame; pixel boundaries
    /// are detected by index change. Receiving a bin id different from the
    /// one this engine already owns is an invariant violation.
    pub fn reduce_bin(
        &mut self,
        bin: i16,
        samples: impl IntoIterator<Item = BinSample>,
    ) -> Result<TwoTimeMatrix, CorrelateError> {
        match self.bin {
            None => self.bin = Some(bin),
            Some(expected) if expected != bin => {
                return Err(CorrelateError::MixedBins {
                    expected,
                    actual: bin,
                });
            }
            Some(_) => {}
        }

        let mut current_pixel: Option<u32> = None;
        for sample in samples {
            if current_pixel != Some(sample.pixel_index) {
                if current_pixel.is_some() {
                    self.accumulate_run();
                }
                current_pixel = Some(sample.pixel_index);
                self.series.iter_mut().for_each(|v| *v = 0.0);
            }

            let frame = sample.frame_index;
            if frame < 0 || frame as usize >= self.series.len() {
                tracing::warn!(frame, "Two-time sample outside frame window dropped");
                continue;
            }

            // Entries that cannot be normalized keep the prior value.
            let smoothing = self.smoothing.get(sample.pixel_index as usize);
            let frame_sum = self.frame_sums.get(frame);
            if sample.intensity != 0.0 && smoothing != 0.0 && frame_sum != 0.0 {
                self.series[frame as usize] = sample.intensity / smoothing / frame_sum;
            }
        }
        if current_pixel.is_some() {
            self.accumulate_run();
        }

        self.triangle[0] = bin as f64;
        tracing::debug!(bin, frames = self.frame_count, "Two-time bin reduced");

        Ok(TwoTimeMatrix {
            bin,
            data: self.triangle.clone(),
        })
    }

    fn accumulate_run(&mut self) {
        let filtered = self.filter.apply(&self.series);
        let n = filtered.len().min(self.frame_count);

        let mut index = 1usize;
        for i in 0..n {
            // A frame with no signal contributes nothing to its row.
            if filtered[i] == 0.0 {
                index += (n - 1) - i;
                continue;
            }
            for j in (i + 1)..n {
                self.triangle[index] += filtered[i] * filtered[j];
                index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    fn config(frames: i32) -> AnalysisConfig {
        AnalysisConfig {
            width: 4,
            height: 4,
            first_frame: 0,
            last_frame: frames - 1,
            ..Default::default()
        }
    }

    fn unit_maps(pixels: usize, frames: usize) -> (Arc<SmoothingMap>, Arc<FrameSums>) {
        let smoothing = Arc::new(SmoothingMap::from_values(vec![1.0; pixels]));
        let sums = Arc::new(FrameSums::from_records(
            (0..frames).map(|i| crate::records::FrameRecord {
                frame_index: i as i32,
                sum: 1.0,
                clock: 0.0,
                tick: 0.0,
            }),
            frames,
        ));
        (smoothing, sums)
    }

    fn sample(pixel: u32, frame: i32, intensity: f64) -> BinSample {
        BinSample {
            pixel_index: pixel,
            frame_index: frame,
            intensity,
        }
    }

    #[test]
    fn test_triangle_size() {
        let (smoothing, sums) = unit_maps(16, 5);
        let engine = TwoTimeEngine::from_config(&config(5), smoothing, sums).unwrap();
        // 5 frames: 10 pairs plus the bin-id header.
        assert_eq!(engine.triangle.len(), 11);
    }

    #[test]
    fn test_single_pixel_products() {
        let (smoothing, sums) = unit_maps(16, 3);
        let mut engine = TwoTimeEngine::from_config(&config(3), smoothing, sums).unwrap();

        let matrix = engine
            .reduce_bin(
                2,
                vec![
                    sample(0, 0, 1.0),
                    sample(0, 1, 2.0),
                    sample(0, 2, 3.0),
                ],
            )
            .unwrap();

        assert_eq!(matrix.bin, 2);
        assert_eq!(matrix.data[0], 2.0);
        assert_eq!(matrix.frame_count(), 3);
        assert_eq!(matrix.get(0, 1), 2.0);
        assert_eq!(matrix.get(0, 2), 3.0);
        assert_eq!(matrix.get(1, 2), 6.0);
    }

    #[test]
    fn test_pixels_accumulate_into_one_triangle() {
        let (smoothing, sums) = unit_maps(16, 3);
        let mut engine = TwoTimeEngine::from_config(&config(3), smoothing, sums).unwrap();

        let matrix = engine
            .reduce_bin(
                1,
                vec![
                    sample(0, 0, 1.0),
                    sample(0, 1, 1.0),
                    sample(0, 2, 1.0),
                    sample(7, 0, 2.0),
                    sample(7, 1, 2.0),
                    sample(7, 2, 2.0),
                ],
            )
            .unwrap();

        // Each pair gets 1*1 from pixel 0 and 2*2 from pixel 7.
        assert_eq!(matrix.get(0, 1), 5.0);
        assert_eq!(matrix.get(1, 2), 5.0);
    }

    #[test]
    fn test_normalization_divides_by_smoothing_and_frame_sum() {
        let smoothing = Arc::new(SmoothingMap::from_values(vec![2.0; 16]));
        let sums = Arc::new(FrameSums::from_records(
            (0..2).map(|i| crate::records::FrameRecord {
                frame_index: i,
                sum: 5.0,
                clock: 0.0,
                tick: 0.0,
            }),
            2,
        ));
        let mut engine = TwoTimeEngine::from_config(&config(2), smoothing, sums).unwrap();

        let matrix = engine
            .reduce_bin(1, vec![sample(0, 0, 10.0), sample(0, 1, 20.0)])
            .unwrap();

        // 10/2/5 = 1 and 20/2/5 = 2.
        assert_eq!(matrix.get(0, 1), 2.0);
    }

    #[test]
    fn test_unnormalizable_entries_stay_zero() {
        let smoothing = Arc::new(SmoothingMap::from_values(vec![0.0; 16]));
        let (_, sums) = unit_maps(16, 2);
        let mut engine = TwoTimeEngine::from_config(&config(2), smoothing, sums).unwrap();

        let matrix = engine
            .reduce_bin(1, vec![sample(0, 0, 10.0), sample(0, 1, 20.0)])
            .unwrap();

        assert_eq!(matrix.get(0, 1), 0.0);
    }

    #[test]
    fn test_mixed_bins_rejected() {
        let (smoothing, sums) = unit_maps(16, 2);
        let mut engine = TwoTimeEngine::from_config(&config(2), smoothing, sums).unwrap();

        engine.reduce_bin(1, vec![sample(0, 0, 1.0)]).unwrap();
        let result = engine.reduce_bin(3, vec![sample(0, 0, 1.0)]);
        assert!(matches!(
            result,
            Err(CorrelateError::MixedBins {
                expected: 1,
                actual: 3
            })
        ));
    }
}
