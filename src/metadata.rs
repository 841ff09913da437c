//! Video metadata types.
//!
//! [`VideoMetadata`] is read once when a [`MediaFile`](crate::MediaFile) is
//! opened and cached for the lifetime of the handle.

use std::time::Duration;

/// Metadata for the video stream being sampled.
///
/// # Example
///
/// ```no_run
/// use chapterize::MediaFile;
///
/// let media = MediaFile::open("talk.mp4").unwrap();
/// let metadata = media.metadata();
/// println!("{} frames @ {:.2} fps", metadata.frame_count, metadata.frames_per_second);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (average rate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Total number of frames. Taken from the container when it records one,
    /// otherwise estimated from duration and frame rate.
    pub frame_count: u64,
    /// Container-level duration.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"theora"`, `"vp9"`).
    pub codec: String,
    /// Container format name (e.g. `"mp4"`, `"ogg"`).
    pub format: String,
}
