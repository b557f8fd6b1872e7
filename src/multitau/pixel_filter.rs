//! Temporal down-sampling of per-pixel series.
//!
//! Two optional reductions applied before correlation: stride decimation
//! (keep every k-th point) followed by block averaging (collapse runs of k
//! points into their mean). Both shorten the series by their factor;
//! trailing remainders are dropped.

/// Reusable stride/block down-sampler scoped to one worker.
#[derive(Debug)]
pub struct TemporalPixelFilter {
    stride: usize,
    block: usize,
    stride_buf: Vec<f64>,
    block_buf: Vec<f64>,
}

impl TemporalPixelFilter {
    /// Creates a filter with the given factors; a factor of 1 disables
    /// that reduction.
    pub fn new(stride: u32, block: u32) -> Self {
        Self {
            stride: stride.max(1) as usize,
            block: block.max(1) as usize,
            stride_buf: Vec::new(),
            block_buf: Vec::new(),
        }
    }

    /// Whether the filter changes the series at all.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.stride > 1 || self.block > 1
    }

    /// Length of the filtered series for a given input length.
    #[inline]
    pub fn output_len(&self, input_len: usize) -> usize {
        input_len / self.stride / self.block
    }

    /// Down-samples the series, returning a slice owned by the filter's
    /// scratch buffers (valid until the next call).
    pub fn apply<'a>(&'a mut self, input: &'a [f64]) -> &'a [f64] {
        let after_stride: &[f64] = if self.stride > 1 {
            self.stride_buf.clear();
            self.stride_buf
                .extend(input.iter().copied().step_by(self.stride));
            self.stride_buf.truncate(input.len() / self.stride);
            &self.stride_buf
        } else {
            input
        };

        if self.block > 1 {
            let blocks = after_stride.len() / self.block;
            self.block_buf.clear();
            self.block_buf.extend(
                after_stride[..blocks * self.block]
                    .chunks_exact(self.block)
                    .map(|chunk| chunk.iter().sum::<f64>() / self.block as f64),
            );
            &self.block_buf
        } else {
            after_stride
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_filter_passes_through() {
        let mut filter = TemporalPixelFilter::new(1, 1);
        let series = [1.0, 2.0, 3.0];
        assert_eq!(filter.apply(&series), &series);
        assert!(!filter.is_active());
    }

    #[test]
    fn test_stride_decimation() {
        let mut filter = TemporalPixelFilter::new(2, 1);
        let series = [1.0, 9.0, 2.0, 9.0, 3.0, 9.0];
        assert_eq!(filter.apply(&series), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_stride_drops_remainder() {
        let mut filter = TemporalPixelFilter::new(2, 1);
        let series = [1.0, 9.0, 2.0, 9.0, 3.0];
        // 5 / 2 = 2 points; the trailing element is dropped.
        assert_eq!(filter.apply(&series), &[1.0, 2.0]);
    }

    #[test]
    fn test_block_mean() {
        let mut filter = TemporalPixelFilter::new(1, 2);
        let series = [1.0, 3.0, 5.0, 7.0, 9.0];
        assert_eq!(filter.apply(&series), &[2.0, 6.0]);
    }

    #[test]
    fn test_stride_then_block() {
        let mut filter = TemporalPixelFilter::new(2, 2);
        let series = [1.0, 0.0, 3.0, 0.0, 5.0, 0.0, 7.0, 0.0];
        // Stride keeps 1, 3, 5, 7; blocks of two average to 2 and 6.
        assert_eq!(filter.apply(&series), &[2.0, 6.0]);
        assert_eq!(filter.output_len(series.len()), 2);
    }
}
