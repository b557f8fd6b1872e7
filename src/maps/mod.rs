//! Run-lifetime reference inputs.
//!
//! Partition maps, dark images, flat fields, frame sums and the spatial
//! smoothing grid are loaded once at the job entry point and passed
//! explicitly to every consumer. All of them are immutable after
//! construction and safe to share across workers.

mod dark;
mod flat;
mod frame_sums;
mod partition;
mod smoothing;

pub use dark::DarkMap;
pub use flat::FlatFieldMap;
pub use frame_sums::FrameSums;
pub use partition::PartitionIndex;
pub use smoothing::SmoothingMap;

use std::path::Path;

/// Errors raised while loading or validating reference inputs.
///
/// All of these are fatal during aggregation setup, before any group is
/// reduced.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("map file not found: {0}")]
    MapFileMissing(String),
    #[error("{what}: expected {expected} values, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("partition grids disagree: static {static_len} vs dynamic {dynamic_len} values")]
    GridMismatch {
        static_len: usize,
        dynamic_len: usize,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) fn read_map_file(path: impl AsRef<Path>) -> Result<Vec<u8>, DataError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::MapFileMissing(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Loaded map file");
    Ok(bytes)
}
