//! Dark-subtraction filter.

use super::FrameFilter;
use crate::decode::Frame;
use crate::maps::DarkMap;
use std::sync::Arc;

/// Subtracts the per-pixel dark level and squelches values inside the
/// noise threshold.
pub struct DarkFilter {
    map: Arc<DarkMap>,
    threshold: f32,
    sigma: f32,
}

impl DarkFilter {
    pub fn new(map: Arc<DarkMap>, threshold: f32, sigma: f32) -> Self {
        Self {
            map,
            threshold,
            sigma,
        }
    }
}

impl FrameFilter for DarkFilter {
    fn apply(&self, frame: &mut Frame) {
        let threshold = self.threshold;
        let sigma = self.sigma;
        for (index, value) in frame.values_mut().iter_mut().enumerate() {
            *value = self.map.subtract(*value, index, threshold, sigma);
        }
    }

    fn name(&self) -> &'static str {
        "dark"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dark_filter_subtracts_per_pixel() {
        let map = Arc::new(DarkMap::from_parts(vec![5.0, 5.0], vec![0.0, 0.0]));
        let filter = DarkFilter::new(map, 0.0, 0.0);

        let mut frame = Frame::new(2, 1, 0);
        frame.values_mut().extend_from_slice(&[12.0, 3.0]);
        frame.set_image(0, 0.0, 0.0);

        filter.apply(&mut frame);
        assert_eq!(frame.values(), &[7.0, 0.0]);
    }
}
