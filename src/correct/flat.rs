//! Flat-field correction filter.

use super::FrameFilter;
use crate::decode::Frame;
use crate::maps::FlatFieldMap;
use std::sync::Arc;

/// Multiplies every pixel by its flat-field sensitivity factor.
pub struct FlatFieldFilter {
    field: Arc<FlatFieldMap>,
}

impl FlatFieldFilter {
    pub fn new(field: Arc<FlatFieldMap>) -> Self {
        Self { field }
    }
}

impl FrameFilter for FlatFieldFilter {
    fn apply(&self, frame: &mut Frame) {
        self.field.apply(frame.values_mut());
    }

    fn name(&self) -> &'static str {
        "flatfield"
    }
}
