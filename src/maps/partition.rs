//! Pixel-to-partition lookup.
//!
//! Two raster-order grids assign every binned pixel a static bin (fine
//! geometric sector) and a dynamic bin (coarser statistical grouping).
//! Bin id 0 means unassigned and must be skipped by every consumer. The
//! index is built once per run and shared read-only.

use super::{read_map_file, DataError};
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;

/// Immutable pixel→(static bin, dynamic bin) lookup with derived counts.
#[derive(Debug, Clone)]
pub struct PartitionIndex {
    width: u32,
    height: u32,
    static_map: Vec<i16>,
    dynamic_map: Vec<i16>,
    static_counts: Vec<u32>,
    dynamic_counts: Vec<u32>,
    max_dynamic_population: u32,
}

impl PartitionIndex {
    /// Builds the index from two equal-dimension raster-order grids.
    ///
    /// One linear scan derives the per-bin pixel counts, the total bins
    /// per axis (1 + maximum observed id) and the population of the
    /// largest dynamic bin, which sizes downstream accumulators.
    pub fn from_grids(
        static_grid: &[i32],
        dynamic_grid: &[i32],
        width: u32,
        height: u32,
    ) -> Result<Self, DataError> {
        if static_grid.len() != dynamic_grid.len() {
            return Err(DataError::GridMismatch {
                static_len: static_grid.len(),
                dynamic_len: dynamic_grid.len(),
            });
        }
        let expected = (width * height) as usize;
        if static_grid.len() != expected {
            return Err(DataError::LengthMismatch {
                what: "partition grid",
                expected,
                actual: static_grid.len(),
            });
        }

        // Bin ids increase linearly from 1, so the maximum id doubles as
        // the bin count per axis (slot 0 stays reserved for unassigned).
        let total_static = static_grid.iter().copied().max().unwrap_or(0).max(0) as usize + 1;
        let total_dynamic = dynamic_grid.iter().copied().max().unwrap_or(0).max(0) as usize + 1;

        let mut static_counts = vec![0u32; total_static];
        let mut dynamic_counts = vec![0u32; total_dynamic];
        let mut max_dynamic_population = 0u32;
        let mut static_map = Vec::with_capacity(expected);
        let mut dynamic_map = Vec::with_capacity(expected);

        for (&s, &d) in static_grid.iter().zip(dynamic_grid.iter()) {
            static_map.push(s as i16);
            dynamic_map.push(d as i16);

            if s > 0 {
                static_counts[s as usize] += 1;
            }
            if d > 0 {
                dynamic_counts[d as usize] += 1;
                max_dynamic_population = max_dynamic_population.max(dynamic_counts[d as usize]);
            }
        }

        tracing::info!(
            width,
            height,
            static_bins = total_static - 1,
            dynamic_bins = total_dynamic - 1,
            max_dynamic_population,
            "Built partition index"
        );

        Ok(Self {
            width,
            height,
            static_map,
            dynamic_map,
            static_counts,
            dynamic_counts,
            max_dynamic_population,
        })
    }

    /// Parses two little-endian i32 grid buffers and builds the index.
    pub fn from_bytes(
        static_bytes: &[u8],
        dynamic_bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Self, DataError> {
        let static_grid = parse_i32_grid(static_bytes);
        let dynamic_grid = parse_i32_grid(dynamic_bytes);
        Self::from_grids(&static_grid, &dynamic_grid, width, height)
    }

    /// Loads the static and dynamic grid files and builds the index.
    pub fn from_files(
        static_path: impl AsRef<Path>,
        dynamic_path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> Result<Self, DataError> {
        let static_bytes = read_map_file(static_path)?;
        let dynamic_bytes = read_map_file(dynamic_path)?;
        Self::from_bytes(&static_bytes, &dynamic_bytes, width, height)
    }

    /// Grid width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Static bin of the pixel at the given linear index.
    #[inline]
    pub fn static_bin(&self, index: usize) -> i16 {
        self.static_map[index]
    }

    /// Dynamic bin of the pixel at the given linear index.
    #[inline]
    pub fn dynamic_bin(&self, index: usize) -> i16 {
        self.dynamic_map[index]
    }

    /// Whether the pixel belongs to both a static and a dynamic bin.
    #[inline]
    pub fn is_assigned(&self, index: usize) -> bool {
        self.static_map[index] > 0 && self.dynamic_map[index] > 0
    }

    /// Total static bins including the reserved unassigned slot 0.
    #[inline]
    pub fn total_static_bins(&self) -> usize {
        self.static_counts.len()
    }

    /// Total dynamic bins including the reserved unassigned slot 0.
    #[inline]
    pub fn total_dynamic_bins(&self) -> usize {
        self.dynamic_counts.len()
    }

    /// Pixel count per static bin, indexed by bin id.
    #[inline]
    pub fn static_counts(&self) -> &[u32] {
        &self.static_counts
    }

    /// Pixel count per dynamic bin, indexed by bin id.
    #[inline]
    pub fn dynamic_counts(&self) -> &[u32] {
        &self.dynamic_counts
    }

    /// Population of the largest dynamic bin.
    #[inline]
    pub fn max_dynamic_population(&self) -> u32 {
        self.max_dynamic_population
    }

    /// Number of pixels assigned to some dynamic bin.
    pub fn assigned_pixels(&self) -> u32 {
        self.dynamic_counts[1..].iter().sum()
    }

    /// Linear indices of pixels outside every partition.
    pub fn mask(&self) -> Vec<u32> {
        (0..self.static_map.len())
            .filter(|&i| !self.is_assigned(i))
            .map(|i| i as u32)
            .collect()
    }
}

fn parse_i32_grid(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(LittleEndian::read_i32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x2 layout: one unassigned pixel, two static bins, two dynamic bins.
    fn sample_grids() -> (Vec<i32>, Vec<i32>) {
        let static_grid = vec![0, 1, 1, 2, 2, 2, 1, 1];
        let dynamic_grid = vec![0, 1, 1, 1, 2, 2, 2, 1];
        (static_grid, dynamic_grid)
    }

    #[test]
    fn test_counts_and_totals() {
        let (s, d) = sample_grids();
        let index = PartitionIndex::from_grids(&s, &d, 4, 2).unwrap();

        assert_eq!(index.total_static_bins(), 3);
        assert_eq!(index.total_dynamic_bins(), 3);
        assert_eq!(index.static_counts(), &[0, 4, 3]);
        assert_eq!(index.dynamic_counts(), &[0, 4, 3]);
        assert_eq!(index.max_dynamic_population(), 4);
    }

    #[test]
    fn test_dynamic_counts_cover_assigned_pixels() {
        let (s, d) = sample_grids();
        let index = PartitionIndex::from_grids(&s, &d, 4, 2).unwrap();

        let assigned = d.iter().filter(|&&v| v >= 1).count() as u32;
        assert_eq!(index.assigned_pixels(), assigned);
    }

    #[test]
    fn test_unassigned_pixel_is_skipped() {
        let (s, d) = sample_grids();
        let index = PartitionIndex::from_grids(&s, &d, 4, 2).unwrap();

        assert!(!index.is_assigned(0));
        assert!(index.is_assigned(1));
    }

    #[test]
    fn test_grid_length_mismatch_rejected() {
        let result = PartitionIndex::from_grids(&[1, 1], &[1, 1, 1], 3, 1);
        assert!(matches!(result, Err(DataError::GridMismatch { .. })));
    }

    #[test]
    fn test_bytes_round_trip() {
        let (s, d) = sample_grids();
        let to_bytes = |grid: &[i32]| -> Vec<u8> {
            grid.iter().flat_map(|v| v.to_le_bytes()).collect()
        };
        let index =
            PartitionIndex::from_bytes(&to_bytes(&s), &to_bytes(&d), 4, 2).unwrap();
        assert_eq!(index.static_bin(3), 2);
        assert_eq!(index.dynamic_bin(4), 2);
    }

    #[test]
    fn test_missing_file_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PartitionIndex::from_files(
            dir.path().join("sqmap"),
            dir.path().join("dqmap"),
            4,
            2,
        );
        assert!(matches!(result, Err(DataError::MapFileMissing(_))));
    }
}
