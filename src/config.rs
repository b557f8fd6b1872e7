//! Analysis configuration.
//!
//! All parameters are supplied by the external job driver (metadata
//! extraction, scheduling and result packaging live outside this crate).
//! Validation happens once at worker startup, before any decoding.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bytes per pixel value in dense and kinetics payloads.
pub const BYTES_PER_PIXEL_VALUE: u64 = 2;

/// Bytes per pixel index in sparse payloads.
pub const BYTES_PER_PIXEL_INDEX: u64 = 4;

/// Bytes per pixel in a sparse payload (index block + value block).
pub const BYTES_PER_SPARSE_PIXEL: u64 = BYTES_PER_PIXEL_VALUE + BYTES_PER_PIXEL_INDEX;

/// Row-slice geometry for kinetics-mode acquisitions.
///
/// A kinetics detector exposes several vertically stacked slices of the
/// sensor per physical readout; each slice is one logical time point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KineticsGeometry {
    /// Row number anchoring the slice stack (top row of the stack).
    pub slice_top: u32,
    /// Height of one slice in rows.
    pub slice_height: u32,
    /// First usable slice, 1-based.
    pub first_slice: u32,
    /// Last usable slice, 1-based.
    pub last_slice: u32,
}

impl KineticsGeometry {
    /// Number of usable slices in each physical frame.
    #[inline]
    pub fn slices_per_frame(&self) -> u32 {
        self.last_slice - self.first_slice + 1
    }
}

/// Correlation analysis selected for a run.
///
/// The decode and correction stages are shared; the mode picks the
/// reducer applied to each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Logarithmic G2(τ) per pixel, aggregated per partition.
    MultiTau,
    /// Multi-tau with the kinetics slice treatments.
    Kinetics,
    /// Full pairwise frame-correlation matrix per dynamic bin.
    TwoTime,
}

/// Configuration for one correlation analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Detector frame width in pixels (before binning).
    pub width: u32,
    /// Detector frame height in pixels (before binning).
    pub height: u32,
    /// First frame included in the analysis (physical frame index).
    pub first_frame: i32,
    /// Last frame included in the analysis (physical frame index).
    pub last_frame: i32,
    /// First dark frame, 1-based; 0 disables dark accumulation.
    #[serde(default)]
    pub first_dark_frame: i32,
    /// Last dark frame, 1-based.
    #[serde(default)]
    pub last_dark_frame: i32,
    /// Delays per multi-tau level.
    #[serde(default = "default_dpl")]
    pub delays_per_level: u32,
    /// Static window size for partial pixel sums; 0 disables windows.
    #[serde(default)]
    pub static_window: u32,
    /// Payload uses the sparse (index + value) encoding.
    #[serde(default)]
    pub sparse: bool,
    /// Kinetics slice geometry; `None` for plain full-frame acquisitions.
    #[serde(default)]
    pub kinetics: Option<KineticsGeometry>,
    /// Horizontal binning factor.
    #[serde(default = "default_bin")]
    pub bin_x: u32,
    /// Vertical binning factor.
    #[serde(default = "default_bin")]
    pub bin_y: u32,
    /// Temporal stride-decimation factor; 1 disables.
    #[serde(default = "default_filter")]
    pub pixel_filter_stride: u32,
    /// Temporal block-mean factor; 1 disables.
    #[serde(default = "default_filter")]
    pub pixel_filter_sum: u32,
    /// Constant part of the dark-subtraction threshold.
    #[serde(default)]
    pub dark_threshold: f32,
    /// Per-pixel standard-deviation multiplier of the threshold.
    #[serde(default)]
    pub dark_sigma: f32,
    /// Apply the flat-field sensitivity correction.
    #[serde(default)]
    pub flatfield_enabled: bool,
    /// Run the two-time analysis instead of multi-tau.
    #[serde(default)]
    pub two_time: bool,
}

fn default_dpl() -> u32 {
    4
}

fn default_bin() -> u32 {
    1
}

fn default_filter() -> u32 {
    1
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            first_frame: 0,
            last_frame: 0,
            first_dark_frame: 0,
            last_dark_frame: 0,
            delays_per_level: default_dpl(),
            static_window: 0,
            sparse: false,
            kinetics: None,
            bin_x: default_bin(),
            bin_y: default_bin(),
            pixel_filter_stride: default_filter(),
            pixel_filter_sum: default_filter(),
            dark_threshold: 0.0,
            dark_sigma: 0.0,
            flatfield_enabled: false,
            two_time: false,
        }
    }
}

impl AnalysisConfig {
    /// Frame width after binning.
    #[inline]
    pub fn binned_width(&self) -> u32 {
        self.width / self.bin_x
    }

    /// Frame height after binning. In kinetics mode the effective frame is
    /// one slice tall.
    #[inline]
    pub fn binned_height(&self) -> u32 {
        match &self.kinetics {
            Some(k) => k.slice_height / self.bin_y,
            None => self.height / self.bin_y,
        }
    }

    /// Number of physical frames in the analysed range.
    #[inline]
    pub fn frame_count(&self) -> u32 {
        (self.last_frame - self.first_frame + 1).max(0) as u32
    }

    /// Number of logical time points: physical frames, multiplied by the
    /// usable slice count in kinetics mode.
    pub fn logical_frame_count(&self) -> u32 {
        match &self.kinetics {
            Some(k) => self.frame_count() * k.slices_per_frame(),
            None => self.frame_count(),
        }
    }

    /// Correlation mode this configuration selects.
    pub fn correlation_mode(&self) -> CorrelationMode {
        if self.two_time {
            CorrelationMode::TwoTime
        } else if self.kinetics.is_some() {
            CorrelationMode::Kinetics
        } else {
            CorrelationMode::MultiTau
        }
    }

    /// Bytes occupied by one pixel in the payload, used when skipping
    /// frames without reading them.
    #[inline]
    pub fn payload_value_size(&self) -> u64 {
        if self.sparse {
            BYTES_PER_SPARSE_PIXEL
        } else {
            BYTES_PER_PIXEL_VALUE
        }
    }

    /// Validates the configuration.
    ///
    /// Called once at worker startup; every failure here is fatal before
    /// any byte of the stream is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.last_frame < self.first_frame {
            return Err(ConfigError::InvalidFrameRange);
        }
        if self.first_dark_frame != 0 && self.last_dark_frame < self.first_dark_frame {
            return Err(ConfigError::InvalidDarkRange);
        }
        if self.delays_per_level == 0 {
            return Err(ConfigError::InvalidDelays);
        }
        if self.bin_x == 0 || self.bin_y == 0 {
            return Err(ConfigError::InvalidBinning);
        }
        if self.pixel_filter_stride == 0 || self.pixel_filter_sum == 0 {
            return Err(ConfigError::InvalidPixelFilter);
        }
        if self.sparse && self.kinetics.is_some() {
            return Err(ConfigError::SparseKineticsConflict);
        }
        if let Some(k) = &self.kinetics {
            if k.slice_height == 0 || k.slice_height > self.height {
                return Err(ConfigError::InvalidKineticsGeometry);
            }
            if k.first_slice == 0 || k.last_slice < k.first_slice {
                return Err(ConfigError::InvalidKineticsGeometry);
            }
            if k.last_slice > self.height / k.slice_height {
                return Err(ConfigError::InvalidKineticsGeometry);
            }
            // The slice row offset is (slice_top - ordinal * slice_height)
            // with ordinals 2..=slices_per_frame+1; the smallest offset
            // must stay inside the sensor.
            let max_ordinal = k.slices_per_frame() + 1;
            if k.slice_top < max_ordinal * k.slice_height {
                return Err(ConfigError::InvalidKineticsGeometry);
            }
        }
        Ok(())
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: AnalysisConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("last frame precedes first frame")]
    InvalidFrameRange,
    #[error("last dark frame precedes first dark frame")]
    InvalidDarkRange,
    #[error("delays-per-level must be at least 1")]
    InvalidDelays,
    #[error("binning factors must be at least 1")]
    InvalidBinning,
    #[error("pixel filter factors must be at least 1")]
    InvalidPixelFilter,
    #[error("sparse and kinetics formats are mutually exclusive")]
    SparseKineticsConflict,
    #[error("kinetics slice geometry does not fit the frame")]
    InvalidKineticsGeometry,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}
