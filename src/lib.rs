//! Photon Correlation Library
//!
//! Decoding and correlation analysis for time-resolved X-ray scattering
//! data: a binary detector-frame decoder with stream resynchronization,
//! per-pixel correction filters, q-bin partition lookup, and three
//! correlation reducers (multi-tau, its kinetics specialization and the
//! full two-time matrix) with partition-level normalization.
//!
//! # Architecture
//!
//! The crate exposes pure, deterministic reduction stages; grouping,
//! sorting and scheduling belong to an external substrate:
//!
//! ```text
//! decode → correct → (keyed by pixel) → multitau → aggregate
//!    ↓                                → twotime
//!  maps (partition / dark / flat / sums, shared read-only)
//! ```
//!
//! # Design Principles
//!
//! - **Deterministic re-decode**: the same byte range always yields the
//!   same samples, so externally retried work is safe.
//! - **Shared inputs are immutable**: partition and correction maps are
//!   built once and passed explicitly to every consumer.
//! - **Scratch is owned, not shared**: every engine reuses its own
//!   buffers between groups; the hot path takes no locks.
//! - **Numerical edge cases are policy**: unsupported lags and zero-mean
//!   sub-bins are suppressed, never emitted as undefined quotients.
//!
//! # Example
//!
//! ```no_run
//! use photon_corr::{
//!     AnalysisConfig, ByteRange, CorrectionPipeline, FrameStream,
//!     MultiTauEngine, PartitionIndex,
//! };
//! use std::fs::File;
//! use std::io::BufReader;
//! use std::sync::Arc;
//!
//! let config = AnalysisConfig::from_file("analysis.toml").unwrap();
//! let index = Arc::new(
//!     PartitionIndex::from_files("sqmap", "dqmap",
//!         config.binned_width(), config.binned_height()).unwrap(),
//! );
//!
//! let pipeline = CorrectionPipeline::from_config(&config, None, None, index);
//! let reader = BufReader::new(File::open("frames.imm").unwrap());
//! let split = ByteRange { start: 0, end: u64::MAX };
//!
//! let mut samples: Vec<_> = FrameStream::new(reader, &config, pipeline, split)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! // Group by pixel (normally done by the external substrate).
//! samples.sort_by_key(|s| s.key);
//!
//! let mut engine = MultiTauEngine::from_config(&config).unwrap();
//! for group in samples.chunk_by(|a, b| a.key == b.key) {
//!     let out = engine.reduce_pixel(group[0].key, group.iter().copied());
//!     for point in &out.points {
//!         println!("({}, {}) tau {}: {}", point.key.x, point.key.y, point.tau, point.g2);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod config;
pub mod correct;
pub mod decode;
pub mod maps;
pub mod multitau;
pub mod records;
pub mod twotime;

// Re-export commonly used types at crate root
pub use aggregate::PartitionAggregator;
pub use config::{AnalysisConfig, ConfigError, CorrelationMode, KineticsGeometry};
pub use correct::{CorrectionPipeline, FrameFilter};
pub use decode::{ByteRange, DecodeError, FrameHeader, FrameStream};
pub use maps::{DarkMap, DataError, FlatFieldMap, FrameSums, PartitionIndex, SmoothingMap};
pub use multitau::{MultiTauEngine, TemporalPixelFilter};
pub use records::{
    BinSample, CorrelationPoint, FrameRecord, PartitionResult, PartitionSample, PixelKey,
    PixelSample, PixelSumRecord,
};
pub use twotime::{CorrelateError, TwoTimeEngine, TwoTimeMatrix};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
