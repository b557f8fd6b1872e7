//! Multi-tau correlation engine.
//!
//! Reduces one pixel's grouped samples into logarithmically spaced G2
//! values. The engine owns all scratch buffers and reuses them across
//! groups; callers feed it one finite, single-pass sample iterator per
//! pixel and collect the emitted records.
//!
//! Kinetics-mode series get three extra treatments before the standard
//! schedule: slice-level lags inside each physical frame, one cross-frame
//! slice-overlap point, and frame-level correlation over slice averages.
//! Slice-level lags are tagged with negative sentinel values so they never
//! collide with standard lags.

pub mod g2;
mod pixel_filter;

pub use pixel_filter::TemporalPixelFilter;

use crate::config::{AnalysisConfig, ConfigError};
use crate::records::{CorrelationPoint, PixelKey, PixelSample, PixelSumRecord};

/// Records produced by one pixel reduction.
#[derive(Debug, Default)]
pub struct PixelOutput {
    /// Correlation values, one per supported (pixel, τ).
    pub points: Vec<CorrelationPoint>,
    /// Whole-series and windowed intensity sums.
    pub sums: Vec<PixelSumRecord>,
}

/// Per-worker multi-tau reducer.
pub struct MultiTauEngine {
    dpl: u32,
    frame_count: usize,
    static_window: usize,
    slices_per_frame: Option<usize>,
    filter: TemporalPixelFilter,
    scratch: Vec<f64>,
    work: Vec<f64>,
}

impl MultiTauEngine {
    /// Builds an engine from a validated configuration.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let frame_count = config.logical_frame_count() as usize;
        if frame_count < 1 {
            return Err(ConfigError::InvalidFrameRange);
        }

        Ok(Self {
            dpl: config.delays_per_level,
            frame_count,
            static_window: config.static_window as usize,
            slices_per_frame: config
                .kinetics
                .as_ref()
                .map(|k| k.slices_per_frame() as usize),
            filter: TemporalPixelFilter::new(
                config.pixel_filter_stride,
                config.pixel_filter_sum,
            ),
            scratch: vec![0.0; frame_count],
            work: Vec::with_capacity(frame_count),
        })
    }

    /// Reduces one pixel's samples into correlation points and pixel sums.
    ///
    /// Samples may arrive in any order; frames without a sample contribute
    /// zero intensity. Lags with no contributing pair are suppressed
    /// rather than emitted as an undefined quotient.
    pub fn reduce_pixel(
        &mut self,
        key: PixelKey,
        samples: impl IntoIterator<Item = PixelSample>,
    ) -> PixelOutput {
        self.scratch.iter_mut().for_each(|v| *v = 0.0);
        for sample in samples {
            let index = sample.frame_index;
            if index < 0 || index as usize >= self.frame_count {
                tracing::warn!(
                    frame = index,
                    frames = self.frame_count,
                    "Sample outside the configured frame window dropped"
                );
                continue;
            }
            self.scratch[index as usize] = sample.intensity as f64;
        }

        let filtered = self.filter.apply(&self.scratch);
        self.work.clear();
        self.work.extend_from_slice(filtered);

        let mut out = PixelOutput::default();
        match self.slices_per_frame {
            None => {
                push_pixel_sums(&self.work, key, self.static_window, &mut out.sums);
                multitau_schedule(&mut self.work, self.dpl, key, &mut out.points);
            }
            Some(spf) => {
                for tau in 1..spf {
                    if let Some(avg) = g2::correlate_slices(&self.work, tau, spf) {
                        out.points.push(point(key, -(tau as i32), avg));
                    }
                }
                if let Some(avg) = g2::correlate_slice_overlap(&self.work, spf) {
                    out.points.push(point(key, -(spf as i32), avg));
                }

                // Kinetics pixel sums are per slice, before averaging.
                push_pixel_sums(&self.work, key, self.static_window, &mut out.sums);

                let frames = g2::average_slices(&mut self.work, spf);
                self.work.truncate(frames);
                multitau_schedule(&mut self.work, self.dpl, key, &mut out.points);
            }
        }

        tracing::trace!(
            x = key.x,
            y = key.y,
            points = out.points.len(),
            "Pixel reduced"
        );
        out
    }
}

fn point(key: PixelKey, tau: i32, avg: g2::LagAverages) -> CorrelationPoint {
    CorrelationPoint {
        key,
        tau,
        g2: avg.g2,
        i_past: avg.i_past,
        i_future: avg.i_future,
    }
}

/// Runs the standard multi-tau schedule over a working series.
fn multitau_schedule(
    work: &mut [f64],
    dpl: u32,
    key: PixelKey,
    out: &mut Vec<CorrelationPoint>,
) {
    let n = work.len();
    let max_level = g2::level_max(n, dpl);

    let mut tau = 1usize;
    for level in 0..=max_level {
        let step = 1usize << level;
        g2::smooth(work, n, step);
        let usable = g2::usable_length(n, level);

        for _ in 0..g2::delay_count(dpl, level) {
            match g2::correlate_at(work, usable, tau, step) {
                Some(avg) => out.push(point(key, tau as i32, avg)),
                // Lags only grow within a level, so the first unsupported
                // one ends the level.
                None => break,
            }
            tau += step;
        }
    }
}

/// Emits the whole-series sum plus windowed partial sums.
fn push_pixel_sums(
    series: &[f64],
    key: PixelKey,
    window: usize,
    out: &mut Vec<PixelSumRecord>,
) {
    let mut total = 0.0;
    let mut partial = 0.0;
    let mut window_id: i16 = 1;

    for (i, &value) in series.iter().enumerate() {
        total += value;
        partial += value;

        if window > 0 && window != series.len() && i != 0 && i % window == 0 {
            if partial != 0.0 {
                out.push(PixelSumRecord {
                    key,
                    window: window_id,
                    sum: partial,
                });
            }
            partial = 0.0;
            window_id += 1;
        }
    }

    if total != 0.0 {
        out.push(PixelSumRecord {
            key,
            window: 0,
            sum: total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KineticsGeometry;

    fn key() -> PixelKey {
        PixelKey { x: 3, y: 5 }
    }

    fn samples(intensities: &[f32]) -> Vec<PixelSample> {
        intensities
            .iter()
            .enumerate()
            .map(|(i, &intensity)| PixelSample {
                key: key(),
                intensity,
                frame_index: i as i32,
            })
            .collect()
    }

    fn config(frames: i32) -> AnalysisConfig {
        AnalysisConfig {
            width: 8,
            height: 8,
            first_frame: 0,
            last_frame: frames - 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_short_series_stays_at_level_zero() {
        // Four frames with dpl 4 cannot leave level 0; lags 1..3 are the
        // only supported ones and lag 1 matches the hand computation.
        let mut engine = MultiTauEngine::from_config(&config(4)).unwrap();
        let out = engine.reduce_pixel(key(), samples(&[1.0, 2.0, 3.0, 4.0]));

        let taus: Vec<i32> = out.points.iter().map(|p| p.tau).collect();
        assert_eq!(taus, vec![1, 2, 3]);

        let tau1 = &out.points[0];
        assert!((tau1.g2 - 20.0 / 3.0).abs() < 1e-12);
        assert_eq!(tau1.i_past, 2.0);
        assert_eq!(tau1.i_future, 3.0);
    }

    #[test]
    fn test_constant_series_g2_is_square() {
        let mut engine = MultiTauEngine::from_config(&config(16)).unwrap();
        let out = engine.reduce_pixel(key(), samples(&[3.0; 16]));

        let tau1 = out.points.iter().find(|p| p.tau == 1).unwrap();
        assert_eq!(tau1.g2, 9.0);
        assert_eq!(tau1.i_past, 3.0);
        assert_eq!(tau1.i_future, 3.0);
    }

    #[test]
    fn test_level_one_lags_use_smoothed_series() {
        // 16 frames, dpl 4: level 0 emits lags 1..7, level 1 emits
        // 8, 10, 12, 14 on the once-smoothed series.
        let mut engine = MultiTauEngine::from_config(&config(16)).unwrap();
        let out = engine.reduce_pixel(key(), samples(&[2.0; 16]));

        let taus: Vec<i32> = out.points.iter().map(|p| p.tau).collect();
        assert_eq!(taus, vec![1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14]);
        // Constant series smooths to itself.
        assert!(out.points.iter().all(|p| p.g2 == 4.0));
    }

    #[test]
    fn test_missing_frames_read_as_zero() {
        let mut engine = MultiTauEngine::from_config(&config(4)).unwrap();
        // Only frames 0 and 2 carry samples.
        let sparse_samples = vec![
            PixelSample {
                key: key(),
                intensity: 2.0,
                frame_index: 0,
            },
            PixelSample {
                key: key(),
                intensity: 4.0,
                frame_index: 2,
            },
        ];
        let out = engine.reduce_pixel(key(), sparse_samples);

        // tau 2 pairs (2,4) and (0,0): g2 = 8/2 = 4.
        let tau2 = out.points.iter().find(|p| p.tau == 2).unwrap();
        assert_eq!(tau2.g2, 4.0);
    }

    #[test]
    fn test_engine_scratch_clears_between_groups() {
        let mut engine = MultiTauEngine::from_config(&config(4)).unwrap();
        let first = engine.reduce_pixel(key(), samples(&[5.0, 5.0, 5.0, 5.0]));
        let second = engine.reduce_pixel(key(), samples(&[0.0, 0.0, 0.0, 0.0]));

        assert!(!first.points.is_empty());
        // An all-zero series still emits points (all zero), but no sums.
        assert!(second.sums.is_empty());
        assert!(second.points.iter().all(|p| p.g2 == 0.0));
    }

    #[test]
    fn test_stride_filter_shortens_series() {
        let mut cfg = config(8);
        cfg.pixel_filter_stride = 2;
        let mut engine = MultiTauEngine::from_config(&cfg).unwrap();
        let out = engine.reduce_pixel(
            key(),
            samples(&[1.0, 9.0, 1.0, 9.0, 1.0, 9.0, 1.0, 9.0]),
        );

        // The filtered series is [1, 1, 1, 1]: supported lags are 1..3.
        let taus: Vec<i32> = out.points.iter().map(|p| p.tau).collect();
        assert_eq!(taus, vec![1, 2, 3]);
        assert!(out.points.iter().all(|p| p.g2 == 1.0));
    }

    #[test]
    fn test_whole_series_pixel_sum() {
        let mut engine = MultiTauEngine::from_config(&config(4)).unwrap();
        let out = engine.reduce_pixel(key(), samples(&[1.0, 2.0, 3.0, 4.0]));

        assert_eq!(out.sums.len(), 1);
        assert_eq!(out.sums[0].window, 0);
        assert_eq!(out.sums[0].sum, 10.0);
    }

    #[test]
    fn test_windowed_pixel_sums_flush_at_boundaries() {
        let mut cfg = config(5);
        cfg.static_window = 2;
        let mut engine = MultiTauEngine::from_config(&cfg).unwrap();
        let out = engine.reduce_pixel(key(), samples(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        let windows: Vec<(i16, f64)> = out.sums.iter().map(|s| (s.window, s.sum)).collect();
        // Window 1 flushes at index 2 (1+2+3), window 2 at index 4 (4+5),
        // then the whole-series sum under window 0.
        assert_eq!(windows, vec![(1, 6.0), (2, 9.0), (0, 15.0)]);
    }

    fn kinetics_config() -> AnalysisConfig {
        AnalysisConfig {
            width: 8,
            height: 16,
            first_frame: 0,
            last_frame: 1,
            kinetics: Some(KineticsGeometry {
                slice_top: 8,
                slice_height: 2,
                first_slice: 1,
                last_slice: 2,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_kinetics_slice_and_overlap_lags() {
        // Two physical frames of two slices: series [1, 2, 3, 4].
        let mut engine = MultiTauEngine::from_config(&kinetics_config()).unwrap();
        let out = engine.reduce_pixel(key(), samples(&[1.0, 2.0, 3.0, 4.0]));

        let taus: Vec<i32> = out.points.iter().map(|p| p.tau).collect();
        // Sentinel slice lag -1, overlap -2, then frame-level lag 1.
        assert_eq!(taus, vec![-1, -2, 1]);

        let slice = &out.points[0];
        // In-frame pairs (1,2) and (3,4).
        assert_eq!(slice.g2, 7.0);
        assert_eq!(slice.i_past, 2.0);
        assert_eq!(slice.i_future, 3.0);

        let overlap = &out.points[1];
        // Last slice of frame 0 with first slice of frame 1: (2,3).
        assert_eq!(overlap.g2, 6.0);

        let frame_level = &out.points[2];
        // Averaged frames [1.5, 3.5].
        assert_eq!(frame_level.g2, 1.5 * 3.5);
        assert_eq!(frame_level.i_past, 1.5);
        assert_eq!(frame_level.i_future, 3.5);
    }

    #[test]
    fn test_out_of_window_sample_dropped() {
        let mut engine = MultiTauEngine::from_config(&config(4)).unwrap();
        let mut all = samples(&[1.0, 1.0, 1.0, 1.0]);
        all.push(PixelSample {
            key: key(),
            intensity: 99.0,
            frame_index: 9,
        });
        let out = engine.reduce_pixel(key(), all);

        let tau1 = out.points.iter().find(|p| p.tau == 1).unwrap();
        assert_eq!(tau1.g2, 1.0);
    }
}
