//! Per-frame pixel corrections.
//!
//! Corrections compose as an ordered filter chain applied to each decoded
//! frame: flat-field multiply (when enabled), dark subtraction (dense and
//! kinetics streams only), spatial binning (when a factor exceeds 1) and
//! finally compaction to partition-assigned pixels. The chain is built
//! once per worker from the configuration and the shared reference maps.

mod binning;
mod dark;
mod flat;
mod mask;

pub use binning::BinningFilter;
pub use dark::DarkFilter;
pub use flat::FlatFieldFilter;
pub use mask::PartitionMaskFilter;

use crate::config::AnalysisConfig;
use crate::decode::Frame;
use crate::maps::{DarkMap, FlatFieldMap, PartitionIndex};
use std::sync::Arc;

/// One step of the correction chain.
pub trait FrameFilter: Send + Sync {
    /// Applies the correction to the frame in place.
    fn apply(&self, frame: &mut Frame);

    /// Short name for build-time diagnostics.
    fn name(&self) -> &'static str;
}

/// Ordered chain of frame corrections.
pub struct CorrectionPipeline {
    filters: Vec<Box<dyn FrameFilter>>,
}

impl CorrectionPipeline {
    /// Builds the chain the configuration calls for.
    pub fn from_config(
        config: &AnalysisConfig,
        flat: Option<Arc<FlatFieldMap>>,
        dark: Option<Arc<DarkMap>>,
        index: Arc<PartitionIndex>,
    ) -> Self {
        let mut filters: Vec<Box<dyn FrameFilter>> = Vec::new();

        if config.flatfield_enabled {
            match flat {
                Some(field) => filters.push(Box::new(FlatFieldFilter::new(field))),
                None => tracing::warn!("flat field enabled but no field supplied"),
            }
        }

        // Sparse streams are already background-suppressed by the detector.
        if !config.sparse {
            if let Some(map) = dark {
                filters.push(Box::new(DarkFilter::new(
                    map,
                    config.dark_threshold,
                    config.dark_sigma,
                )));
            }
        }

        if config.bin_x > 1 || config.bin_y > 1 {
            filters.push(Box::new(BinningFilter::new(config.bin_x, config.bin_y)));
        }

        filters.push(Box::new(PartitionMaskFilter::new(index)));

        for filter in &filters {
            tracing::debug!(filter = filter.name(), "Correction filter added");
        }

        Self { filters }
    }

    /// Builds a chain from explicit filters (test and tooling hook).
    pub fn from_filters(filters: Vec<Box<dyn FrameFilter>>) -> Self {
        Self { filters }
    }

    /// Runs every filter over the frame, in order.
    pub fn apply(&self, frame: &mut Frame) {
        for filter in &self.filters {
            filter.apply(frame);
        }
    }

    /// Number of filters in the chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
