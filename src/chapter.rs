//! Chapter merging.
//!
//! Classification results are sorted by frame index, reduced to their top
//! label, and folded into run-length blocks: a new [`ChapterBlock`] starts
//! whenever the top label differs from the previous frame's, otherwise the
//! current block is extended. Runs are defined purely by adjacency in sorted
//! order, so two blocks with the same label separated by another label are
//! never fused.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use chapterize::{ClassificationResult, LabelScore, MergeOptions};
//!
//! let result = |index, label: &str| {
//!     ClassificationResult::new(index, vec![LabelScore::new(label, 0.9)])
//! };
//! let results = vec![result(3, "slides"), result(1, "speaker"), result(2, "speaker")];
//!
//! let chapters = chapterize::merge_chapters(&results, 1.0, &MergeOptions::new())?;
//! assert_eq!(chapters.len(), 2);
//! assert_eq!(chapters[0].display_name, "speaker");
//! assert_eq!(chapters[0].end, Duration::from_secs(2));
//! # Ok::<(), chapterize::ChapterizeError>(())
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};

use crate::{classification::ClassificationResult, conversion, error::ChapterizeError};

/// A run of consecutive sampled frames sharing one top label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBlock {
    /// The shared top label.
    pub label: String,
    /// Index of the first frame in the run.
    pub start_frame: u64,
    /// Index of the last frame in the run (`>= start_frame`).
    pub end_frame: u64,
}

impl ChapterBlock {
    fn to_chapter(&self, frames_per_second: f64) -> Result<Chapter, ChapterizeError> {
        Ok(Chapter {
            display_name: self.label.clone(),
            start: conversion::frame_index_to_duration(self.start_frame, frames_per_second)?,
            end: conversion::frame_index_to_duration(self.end_frame, frames_per_second)?,
        })
    }
}

/// A chapter block with its frame range converted to time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// The chapter's label.
    pub display_name: String,
    /// Time of the first frame (`start_frame / fps`).
    pub start: Duration,
    /// Time of the last frame (`end_frame / fps`).
    pub end: Duration,
}

impl Display for Chapter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}: {} - {}",
            self.display_name,
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Merge behavior.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub(crate) allow_empty: bool,
}

impl MergeOptions {
    /// Default options: an empty result set is an error.
    pub fn new() -> Self {
        Self::default()
    }

    /// When `true`, merging zero results yields zero blocks instead of
    /// [`ChapterizeError::EmptyInput`].
    #[must_use]
    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }
}

/// Folds top labels in frame order into blocks. The label of the last block
/// is the previous frame's label.
#[derive(Debug, Default)]
struct RunAccumulator {
    blocks: Vec<ChapterBlock>,
}

impl RunAccumulator {
    fn push(mut self, frame_index: u64, label: &str) -> Self {
        match self.blocks.last_mut() {
            Some(block) if block.label == label => block.end_frame = frame_index,
            _ => self.blocks.push(ChapterBlock {
                label: label.to_string(),
                start_frame: frame_index,
                end_frame: frame_index,
            }),
        }
        self
    }
}

/// Sort `results` by frame index and merge runs of equal top labels.
///
/// The input may be in any order. Every input frame index is covered by
/// exactly one block, blocks are ordered by `start_frame`, and no two
/// adjacent blocks share a label.
///
/// # Errors
///
/// - [`ChapterizeError::EmptyInput`] if `results` is empty (unless
///   [`MergeOptions::with_allow_empty`] is set).
/// - [`ChapterizeError::MalformedResult`] if a result has no labels, a NaN
///   confidence, or shares its frame index with another result.
pub fn merge_blocks(
    results: &[ClassificationResult],
    options: &MergeOptions,
) -> Result<Vec<ChapterBlock>, ChapterizeError> {
    if results.is_empty() {
        return if options.allow_empty {
            Ok(Vec::new())
        } else {
            Err(ChapterizeError::EmptyInput)
        };
    }

    let mut ordered: Vec<&ClassificationResult> = results.iter().collect();
    ordered.sort_by_key(|result| result.frame_index);

    if let Some(pair) = ordered
        .windows(2)
        .find(|pair| pair[0].frame_index == pair[1].frame_index)
    {
        return Err(ChapterizeError::MalformedResult {
            frame_index: Some(pair[0].frame_index),
            reason: "frame classified more than once".to_string(),
        });
    }

    let accumulator = ordered
        .into_iter()
        .try_fold(RunAccumulator::default(), |accumulator, result| {
            let label = result.top_label()?;
            Ok::<_, ChapterizeError>(accumulator.push(result.frame_index, &label.name))
        })?;

    log::debug!(
        "Merged {} results into {} blocks",
        results.len(),
        accumulator.blocks.len()
    );

    Ok(accumulator.blocks)
}

/// Convert blocks to chapters using the video's frame rate.
///
/// # Errors
///
/// - [`ChapterizeError::InvalidFrameRate`] if `frames_per_second` is not a
///   positive finite number.
/// - [`ChapterizeError::TimestampOutOfRange`] if a block boundary divided by
///   `frames_per_second` is too large for a [`Duration`].
pub fn to_chapters(
    blocks: &[ChapterBlock],
    frames_per_second: f64,
) -> Result<Vec<Chapter>, ChapterizeError> {
    if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
        return Err(ChapterizeError::InvalidFrameRate(frames_per_second));
    }
    blocks
        .iter()
        .map(|block| block.to_chapter(frames_per_second))
        .collect()
}

/// [`merge_blocks`] followed by [`to_chapters`].
pub fn merge_chapters(
    results: &[ClassificationResult],
    frames_per_second: f64,
    options: &MergeOptions,
) -> Result<Vec<Chapter>, ChapterizeError> {
    let blocks = merge_blocks(results, options)?;
    to_chapters(&blocks, frames_per_second)
}

/// Render a duration as `H:MM:SS`, with a six-digit microsecond suffix when
/// the duration is not a whole number of seconds.
///
/// ```
/// use std::time::Duration;
///
/// assert_eq!(chapterize::format_timestamp(Duration::from_secs(3725)), "1:02:05");
/// assert_eq!(chapterize::format_timestamp(Duration::from_millis(5500)), "0:00:05.500000");
/// ```
pub fn format_timestamp(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let micros = duration.subsec_micros();

    if micros == 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}
