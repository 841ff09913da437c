//! Error types for the `chapterize` crate.
//!
//! This module defines [`ChapterizeError`], the unified error type returned by
//! all fallible operations in the crate, and [`PipelineStage`], which names the
//! step of per-video processing a failure happened in.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    path::PathBuf,
};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The step of per-video processing a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Opening the video and reading its frame rate and frame count.
    Open,
    /// Sampling frames and writing them to the frame sink.
    Sample,
    /// Handing sampled frames to the classifier.
    Classify,
    /// Merging classification results into chapters.
    Merge,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PipelineStage::Open => "open",
            PipelineStage::Sample => "sample",
            PipelineStage::Classify => "classify",
            PipelineStage::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// The unified error type for all `chapterize` operations.
///
/// Every public method that can fail returns `Result<T, ChapterizeError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChapterizeError {
    /// The video could not be opened or decoded.
    #[error("Failed to open video at {path}: {reason}")]
    FileOpen {
        /// Path or URI passed to [`crate::MediaFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The frame rate is below one frame per second (or not a number), so no
    /// sampling step can be derived from it.
    #[error("Invalid frame rate {0}: at least 1 frame per second is required")]
    InvalidFrameRate(f64),

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// A frame index divided by the frame rate does not fit in a
    /// [`Duration`](std::time::Duration).
    #[error("Frame {frame_index} at {frames_per_second} fps is outside the representable time range")]
    TimestampOutOfRange {
        /// The frame being converted.
        frame_index: u64,
        /// The frame rate used for the conversion.
        frames_per_second: f64,
    },

    /// Two videos in one batch derive the same identity, so their frames
    /// and predictions would share storage keys.
    #[error("Video {uri} has identity {video_id:?}, already used by an earlier video in the batch")]
    DuplicateVideo {
        /// The identity both videos map to.
        video_id: String,
        /// The later of the two videos, which is not processed.
        uri: String,
    },

    /// No classification results were supplied to the merger.
    #[error("No classification results to merge")]
    EmptyInput,

    /// A classification result cannot be used for merging.
    #[error("Malformed classification result{}: {reason}", frame_suffix(.frame_index))]
    MalformedResult {
        /// Frame the result belongs to, when known.
        frame_index: Option<u64>,
        /// What is wrong with the result.
        reason: String,
    },

    /// A frame reference does not end in a numeric frame index.
    #[error("Cannot derive a frame index from reference {0:?}")]
    InvalidFrameReference(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A manifest or prediction record could not be (de)serialized.
    #[error("JSON error: {0}")]
    JsonError(#[from] JsonError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// Processing of one video failed during the given stage.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// The stage that failed.
        stage: PipelineStage,
        /// The underlying failure.
        #[source]
        source: Box<ChapterizeError>,
    },
}

impl ChapterizeError {
    /// Tag this error with the pipeline stage it occurred in.
    ///
    /// Errors that already carry a stage are returned unchanged.
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            ChapterizeError::Stage { .. } => self,
            other => ChapterizeError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The pipeline stage this error was tagged with, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ChapterizeError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<FfmpegError> for ChapterizeError {
    fn from(error: FfmpegError) -> Self {
        ChapterizeError::FfmpegError(error.to_string())
    }
}

fn frame_suffix(frame_index: &Option<u64>) -> String {
    frame_index
        .map(|index| format!(" for frame {index}"))
        .unwrap_or_default()
}
