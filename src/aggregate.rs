//! Partition-level normalization and error estimation.
//!
//! Collects every pixel's correlation value for one (dynamic bin, τ)
//! group, normalizes per static sub-bin by the running means of the
//! leading and trailing intensities, and reduces the group to one mean
//! with a standard error. Sub-bins whose mean intensities are zero would
//! normalize to an undefined quotient; they are excluded silently, as a
//! matter of policy rather than error.

use crate::maps::PartitionIndex;
use crate::records::{PartitionResult, PartitionSample};

/// Per-worker reducer for (dynamic bin, τ) groups.
///
/// Scratch buffers are sized once from the partition index (total static
/// bins, largest dynamic-bin population) and cleared between groups.
pub struct PartitionAggregator {
    i_past_avg: Vec<f64>,
    i_future_avg: Vec<f64>,
    g2_sum: Vec<f64>,
    counts: Vec<u32>,
    included: Vec<bool>,
    samples: Vec<(f64, usize)>,
}

impl PartitionAggregator {
    /// Builds an aggregator sized for the given partition index.
    pub fn new(index: &PartitionIndex) -> Self {
        let bins = index.total_static_bins();
        Self {
            i_past_avg: vec![0.0; bins],
            i_future_avg: vec![0.0; bins],
            g2_sum: vec![0.0; bins],
            counts: vec![0; bins],
            included: vec![false; bins],
            samples: Vec::with_capacity(index.max_dynamic_population() as usize),
        }
    }

    /// Reduces one group into a normalized mean and standard error.
    ///
    /// Returns `None` when every static sub-bin was excluded; such a group
    /// produces no record at all.
    pub fn reduce_group(
        &mut self,
        dynamic_bin: i16,
        tau: i32,
        values: impl IntoIterator<Item = PartitionSample>,
    ) -> Option<PartitionResult> {
        self.clear();

        for value in values {
            let s = value.static_bin as usize;
            if value.static_bin <= 0 || s >= self.counts.len() {
                tracing::warn!(
                    static_bin = value.static_bin,
                    "Sample with invalid static bin dropped"
                );
                continue;
            }

            let next = (self.counts[s] + 1) as f64;
            self.i_past_avg[s] += (value.i_past - self.i_past_avg[s]) / next;
            self.i_future_avg[s] += (value.i_future - self.i_future_avg[s]) / next;
            self.g2_sum[s] += value.g2;
            self.counts[s] += 1;
            self.included[s] = true;

            self.samples.push((value.g2, s));
        }

        // First pass: normalized mean per included sub-bin.
        let mut sum = 0.0;
        let mut included_bins = 0usize;
        for s in 0..self.counts.len() {
            if !self.included[s] {
                continue;
            }
            // Zero mean intensities cannot normalize; drop the sub-bin
            // from both passes.
            if self.i_past_avg[s] == 0.0 || self.i_future_avg[s] == 0.0 {
                self.included[s] = false;
                continue;
            }
            sum += self.normalize(self.g2_sum[s] / self.counts[s] as f64, s);
            included_bins += 1;
        }

        if included_bins == 0 {
            tracing::debug!(
                bin = dynamic_bin,
                tau,
                "Every static sub-bin excluded; group suppressed"
            );
            return None;
        }
        let mean = sum / included_bins as f64;

        // Second pass: incremental mean/variance over each individual
        // sample, skipping the excluded sub-bins.
        let mut avg = 0.0;
        let mut m2 = 0.0;
        let mut n = 0.0f64;
        for &(g2, s) in &self.samples {
            if !self.included[s] {
                continue;
            }
            let normalized = self.normalize(g2, s);
            let previous = avg;
            n += 1.0;
            avg += (normalized - previous) / n;
            m2 += (normalized - previous) * (normalized - avg);
        }

        let stderr = (1.0 / n).sqrt() * (m2 / n).sqrt();

        Some(PartitionResult {
            dynamic_bin,
            tau,
            mean,
            stderr,
        })
    }

    fn clear(&mut self) {
        self.i_past_avg.iter_mut().for_each(|v| *v = 0.0);
        self.i_future_avg.iter_mut().for_each(|v| *v = 0.0);
        self.g2_sum.iter_mut().for_each(|v| *v = 0.0);
        self.counts.iter_mut().for_each(|v| *v = 0);
        self.included.iter_mut().for_each(|v| *v = false);
        self.samples.clear();
    }

    fn normalize(&self, g2: f64, static_bin: usize) -> f64 {
        g2 / (self.i_future_avg[static_bin] * self.i_past_avg[static_bin])
    }
}
