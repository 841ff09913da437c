//! The video source seam used by the frame sampler.
//!
//! [`VideoSource`] is everything the sampler needs from a decoder: the frame
//! count, the frame rate, and random access to individual frames.
//! [`MediaFile`](crate::MediaFile) implements it on top of FFmpeg; tests and
//! callers with their own decoders can implement it directly.

use image::DynamicImage;

use crate::error::ChapterizeError;

/// A finite, seekable sequence of decodable frames.
pub trait VideoSource {
    /// Total number of frames in the video.
    fn frame_count(&self) -> u64;

    /// Frames per second.
    fn frames_per_second(&self) -> f64;

    /// Seek to `index` and decode the frame there.
    ///
    /// Returns `Ok(None)` when the decoder has no frame at that position.
    /// The sampler treats both `Ok(None)` and `Err` as a skipped frame.
    fn read_frame(&mut self, index: u64) -> Result<Option<DynamicImage>, ChapterizeError>;
}

impl<S: VideoSource + ?Sized> VideoSource for &mut S {
    fn frame_count(&self) -> u64 {
        (**self).frame_count()
    }

    fn frames_per_second(&self) -> f64 {
        (**self).frames_per_second()
    }

    fn read_frame(&mut self, index: u64) -> Result<Option<DynamicImage>, ChapterizeError> {
        (**self).read_frame(index)
    }
}
