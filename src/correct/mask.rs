//! Partition-mask compaction filter.
//!
//! The last step of every correction chain: drops pixels that belong to no
//! partition, rewrites the frame into parallel (index, value) arrays and
//! records the frame's assigned-intensity sum. Runs after binning, so
//! linear indices line up with the partition grid.

use super::FrameFilter;
use crate::decode::Frame;
use crate::maps::PartitionIndex;
use std::sync::Arc;

/// Compacts a dense frame down to its partition-assigned pixels.
pub struct PartitionMaskFilter {
    index: Arc<PartitionIndex>,
}

impl PartitionMaskFilter {
    pub fn new(index: Arc<PartitionIndex>) -> Self {
        Self { index }
    }
}

impl FrameFilter for PartitionMaskFilter {
    fn apply(&self, frame: &mut Frame) {
        let count = frame.pixel_count();
        let mut sum = 0.0f64;
        let mut kept = 0usize;

        let mut indices = std::mem::take(frame.indices_mut());
        indices.clear();

        {
            let values = frame.values_mut();
            for i in 0..count.min(values.len()) {
                if !self.index.is_assigned(i) {
                    continue;
                }
                let value = values[i];
                sum += value as f64;
                values[kept] = value;
                indices.push(i as u32);
                kept += 1;
            }
            values.truncate(kept);
        }

        *frame.indices_mut() = indices;
        frame.set_pixel_count(kept);
        frame.set_sum(sum);
        frame.set_compact(true);
    }

    fn name(&self) -> &'static str {
        "partition-mask"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_compacts_assigned_pixels() {
        // 2x2 grid with pixel 2 unassigned.
        let static_grid = vec![1, 1, 0, 2];
        let dynamic_grid = vec![1, 1, 0, 1];
        let index =
            Arc::new(PartitionIndex::from_grids(&static_grid, &dynamic_grid, 2, 2).unwrap());

        let mut frame = Frame::new(2, 2, 0);
        frame.values_mut().extend_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        frame.set_image(0, 0.0, 0.0);

        PartitionMaskFilter::new(index).apply(&mut frame);

        assert!(frame.is_compact());
        assert_eq!(frame.pixel_count(), 3);
        assert_eq!(frame.indices(), &[0, 1, 3]);
        assert_eq!(frame.values(), &[1.0, 2.0, 4.0]);
        assert_eq!(frame.sum(), 7.0);
    }
}
