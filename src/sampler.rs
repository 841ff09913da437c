//! Frame sampling.
//!
//! The sampler visits one frame per second of video: starting at frame 1 it
//! steps `floor(fps)` frames at a time while the index stays below the frame
//! count. Frames that fail to decode are skipped and logged; they never abort
//! the run.
//!
//! # Example
//!
//! ```no_run
//! use chapterize::{ChapterizeError, DirectorySink, FrameSampler, MediaFile, SampleOptions};
//!
//! let mut media = MediaFile::open("talk_part_4.ogv")?;
//! let sink = DirectorySink::new("frames");
//! let options = SampleOptions::new();
//! let frames = FrameSampler::new(&options).sample_to_sink(&mut media, &sink, "talk_part_4")?;
//! println!("wrote {} frames", frames.len());
//! # Ok::<(), ChapterizeError>(())
//! ```

use std::time::Duration;

use image::DynamicImage;

use crate::{
    configuration::SampleOptions,
    conversion,
    error::ChapterizeError,
    progress::{OperationType, ProgressTracker},
    sink::{FrameSink, frame_key},
    source::VideoSource,
};

/// One decoded frame picked by the sampler.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Position of the frame in the video (`1 <= index < frame_count`).
    pub index: u64,
    /// The instant the frame represents (`index / fps`).
    pub timestamp: Duration,
    /// Decoded pixel data.
    pub image: DynamicImage,
}

/// A sampled frame that has been written to a [`FrameSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReference {
    /// Position of the frame in the video.
    pub index: u64,
    /// Where the sink stored the frame (a path or URI).
    pub uri: String,
}

/// Which target indices were decoded and which were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingReport {
    /// Indices that produced a frame, in increasing order.
    pub sampled: Vec<u64>,
    /// Indices whose decode failed, in increasing order.
    pub skipped: Vec<u64>,
}

/// The sampling step for a frame rate: `floor(fps)`.
///
/// # Errors
///
/// [`ChapterizeError::InvalidFrameRate`] if `fps` is below 1 or not finite,
/// since the step would be zero.
pub fn sampling_step(frames_per_second: f64) -> Result<u64, ChapterizeError> {
    if !frames_per_second.is_finite() || frames_per_second < 1.0 {
        return Err(ChapterizeError::InvalidFrameRate(frames_per_second));
    }
    Ok(frames_per_second.floor() as u64)
}

/// Every index the sampler will visit: `1, 1 + step, 1 + 2 * step, ...`
/// below `frame_count`.
///
/// # Example
///
/// ```
/// let indices = chapterize::sample_indices(301, 30.0).unwrap();
/// assert_eq!(indices, vec![1, 31, 61, 91, 121, 151, 181, 211, 241, 271]);
/// ```
pub fn sample_indices(
    frame_count: u64,
    frames_per_second: f64,
) -> Result<Vec<u64>, ChapterizeError> {
    let step = sampling_step(frames_per_second)?;
    Ok((1..frame_count).step_by(step as usize).collect())
}

/// Samples one frame per second from a [`VideoSource`].
///
/// Borrows its [`SampleOptions`] so one set of options can drive many runs.
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler<'a> {
    options: &'a SampleOptions,
}

impl<'a> FrameSampler<'a> {
    /// Create a sampler using `options`.
    pub fn new(options: &'a SampleOptions) -> Self {
        Self { options }
    }

    /// Decode each target frame and pass it to `callback` in index order.
    ///
    /// Frames the source cannot produce are logged at `warn` level, recorded
    /// in [`SamplingReport::skipped`], and otherwise ignored. Sampling stops
    /// at the first error returned by `callback`.
    ///
    /// # Errors
    ///
    /// - [`ChapterizeError::InvalidFrameRate`] if the source's fps is below 1.
    /// - [`ChapterizeError::Cancelled`] if the cancellation token fires.
    /// - Any error returned by `callback`.
    pub fn for_each_frame<S, F>(
        &self,
        source: &mut S,
        mut callback: F,
    ) -> Result<SamplingReport, ChapterizeError>
    where
        S: VideoSource + ?Sized,
        F: FnMut(SampledFrame) -> Result<(), ChapterizeError>,
    {
        let frames_per_second = source.frames_per_second();
        let indices = sample_indices(source.frame_count(), frames_per_second)?;

        log::debug!(
            "Sampling {} of {} frames (step {})",
            indices.len(),
            source.frame_count(),
            frames_per_second.floor(),
        );

        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::FrameSampling,
            Some(indices.len() as u64),
            self.options.batch_size,
        );
        let mut report = SamplingReport::default();

        for index in indices {
            if self.options.is_cancelled() {
                log::info!("Sampling cancelled before frame {index}");
                return Err(ChapterizeError::Cancelled);
            }

            match source.read_frame(index) {
                Ok(Some(image)) => {
                    callback(SampledFrame {
                        index,
                        timestamp: conversion::frame_index_to_duration(index, frames_per_second)?,
                        image,
                    })?;
                    report.sampled.push(index);
                }
                Ok(None) => {
                    log::warn!("Could not read frame {index}");
                    report.skipped.push(index);
                }
                Err(error) => {
                    log::warn!("Could not read frame {index}: {error}");
                    report.skipped.push(index);
                }
            }

            tracker.advance(Some(index));
        }

        tracker.finish();

        log::info!(
            "Sampled {} frames, skipped {}",
            report.sampled.len(),
            report.skipped.len(),
        );

        Ok(report)
    }

    /// Decode every target frame into memory.
    pub fn sample_frames<S>(&self, source: &mut S) -> Result<Vec<SampledFrame>, ChapterizeError>
    where
        S: VideoSource + ?Sized,
    {
        let mut frames = Vec::new();
        self.for_each_frame(source, |frame| {
            frames.push(frame);
            Ok(())
        })?;
        Ok(frames)
    }

    /// Decode every target frame and write it to `sink` under
    /// `<video_id>/<index>.<ext>`.
    ///
    /// Returns the references of the written frames in increasing index
    /// order. A failed write aborts sampling; frames written before it stay
    /// in the sink.
    pub fn sample_to_sink<S, K>(
        &self,
        source: &mut S,
        sink: &K,
        video_id: &str,
    ) -> Result<Vec<FrameReference>, ChapterizeError>
    where
        S: VideoSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        self.sample_to_sink_with_report(source, sink, video_id)
            .map(|(references, _)| references)
    }

    /// Like [`sample_to_sink`](FrameSampler::sample_to_sink), also returning
    /// the [`SamplingReport`].
    pub fn sample_to_sink_with_report<S, K>(
        &self,
        source: &mut S,
        sink: &K,
        video_id: &str,
    ) -> Result<(Vec<FrameReference>, SamplingReport), ChapterizeError>
    where
        S: VideoSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let image_format = self.options.image_format;
        let mut references = Vec::new();

        let report = self.for_each_frame(source, |frame| {
            let key = frame_key(video_id, frame.index, image_format);
            let uri = sink.put(&key, &frame.image, image_format)?;
            references.push(FrameReference {
                index: frame.index,
                uri,
            });
            Ok(())
        })?;

        Ok((references, report))
    }
}
