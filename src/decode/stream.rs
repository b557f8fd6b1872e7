//! Split-scoped frame stream.
//!
//! A [`FrameStream`] owns one byte range of the input file: it syncs to the
//! first header, skips to the first analysed frame and then yields one
//! [`PixelSample`] per assigned pixel, frame by frame, until the range or
//! the configured frame window is exhausted. Per-frame summaries are
//! collected as [`FrameRecord`]s on the side.
//!
//! Ranges decode independently with no shared mutable state, so an
//! external scheduler can hand out splits in parallel and retry any of
//! them verbatim.

use super::{
    skip_to_frame, sync_to_marker, DecodeError, DenseFormat, Frame, KineticsFormat, SparseFormat,
};
use crate::config::AnalysisConfig;
use crate::correct::CorrectionPipeline;
use crate::records::{FrameRecord, PixelKey, PixelSample};
use std::io::{Read, Seek, SeekFrom};

/// Half-open byte range `[start, end)` of the input assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte of the range.
    pub start: u64,
    /// One past the last byte of the range.
    pub end: u64,
}

/// Payload decoder for one of the three frame variants.
enum FormatState {
    Dense(DenseFormat),
    Sparse(SparseFormat),
    Kinetics(KineticsFormat),
}

impl FormatState {
    fn read_frame<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        frame: &mut Frame,
    ) -> Result<(), DecodeError> {
        match self {
            FormatState::Dense(format) => format.read_frame(reader, frame),
            FormatState::Sparse(format) => format.read_frame(reader, frame),
            FormatState::Kinetics(format) => format.read_frame(reader, frame),
        }
    }

    fn has_slices_in_frame(&self) -> bool {
        match self {
            FormatState::Kinetics(format) => format.has_slices_in_frame(),
            _ => false,
        }
    }
}

/// Streaming decoder over one byte range of the input.
pub struct FrameStream<R: Read + Seek> {
    reader: R,
    format: FormatState,
    pipeline: CorrectionPipeline,
    frame: Frame,
    binned_width: u32,
    last_byte: u64,
    logical_end: i32,
    cursor: usize,
    started: bool,
    has_frames: bool,
    frame_records: Vec<FrameRecord>,
}

impl<R: Read + Seek> FrameStream<R> {
    /// Opens a stream over `split`, syncs to the first header and skips to
    /// the first analysed frame.
    ///
    /// Returns a stream that yields nothing when the range holds no
    /// analysed frame; failing to find a sync marker at all is fatal.
    pub fn new(
        mut reader: R,
        config: &AnalysisConfig,
        pipeline: CorrectionPipeline,
        split: ByteRange,
    ) -> Result<Self, DecodeError> {
        reader.seek(SeekFrom::Start(split.start))?;
        sync_to_marker(&mut reader)?;

        let found = skip_to_frame(
            &mut reader,
            config.first_frame,
            split.end,
            config.payload_value_size(),
        )?;

        let (format, frame_height) = match &config.kinetics {
            Some(geometry) => (
                FormatState::Kinetics(KineticsFormat::new(
                    config.width,
                    config.height,
                    geometry,
                    config.first_frame,
                )),
                geometry.slice_height,
            ),
            None if config.sparse => (
                FormatState::Sparse(SparseFormat::new(config.width, config.height)),
                config.height,
            ),
            None => (
                FormatState::Dense(DenseFormat::new(config.width, config.height)),
                config.height,
            ),
        };

        let mut stream = Self {
            reader,
            format,
            pipeline,
            frame: Frame::new(config.width, frame_height, config.first_frame),
            binned_width: config.binned_width(),
            last_byte: split.end,
            logical_end: config.logical_frame_count() as i32 - 1,
            cursor: 0,
            started: false,
            has_frames: found,
            frame_records: Vec::new(),
        };

        if stream.has_frames {
            stream.advance_frame()?;
        }

        tracing::debug!(
            start = split.start,
            end = split.end,
            has_frames = stream.has_frames,
            "Frame stream opened"
        );

        Ok(stream)
    }

    /// Per-frame summaries collected so far.
    pub fn frame_records(&self) -> &[FrameRecord] {
        &self.frame_records
    }

    /// Consumes the stream, returning the collected frame summaries.
    pub fn into_frame_records(self) -> Vec<FrameRecord> {
        self.frame_records
    }

    fn advance_frame(&mut self) -> Result<(), DecodeError> {
        if !self.has_frames {
            return Ok(());
        }

        let exhausted = self.reader.stream_position()? >= self.last_byte
            || (self.started && self.frame.logical_index() >= self.logical_end);
        if exhausted && !self.format.has_slices_in_frame() {
            // A kinetics physical frame that began inside the range is
            // drained fully; everything else stops at the boundary.
            self.has_frames = false;
            return Ok(());
        }

        self.format.read_frame(&mut self.reader, &mut self.frame)?;
        self.started = true;

        if self.frame.logical_index() > self.logical_end {
            self.has_frames = false;
            return Ok(());
        }

        self.pipeline.apply(&mut self.frame);

        self.frame_records.push(FrameRecord {
            frame_index: self.frame.logical_index(),
            sum: self.frame.sum(),
            clock: self.frame.clock(),
            tick: self.frame.tick(),
        });

        self.cursor = 0;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for FrameStream<R> {
    type Item = Result<PixelSample, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.has_frames {
                return None;
            }

            if self.cursor < self.frame.pixel_count() {
                let index = self.frame.indices()[self.cursor];
                let intensity = self.frame.values()[self.cursor];
                self.cursor += 1;

                return Some(Ok(PixelSample {
                    key: PixelKey::from_linear(index, self.binned_width),
                    intensity,
                    frame_index: self.frame.logical_index(),
                }));
            }

            if let Err(e) = self.advance_frame() {
                self.has_frames = false;
                return Some(Err(e));
            }
        }
    }
}
