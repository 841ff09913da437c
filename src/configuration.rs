//! Sampling configuration.
//!
//! [`SampleOptions`] is a builder that threads progress callbacks,
//! cancellation tokens, and frame output settings through the
//! [`FrameSampler`](crate::FrameSampler) without widening every signature.
//!
//! # Example
//!
//! ```
//! use chapterize::{CancellationToken, PixelFormat, SampleOptions};
//! use image::ImageFormat;
//!
//! // Small JPEG thumbnails are plenty for most image classifiers.
//! let stop = CancellationToken::new();
//! let options = SampleOptions::new()
//!     .with_cancellation(stop.clone())
//!     .with_pixel_format(PixelFormat::Rgb8)
//!     .with_resolution(Some(224), None)
//!     .with_image_format(ImageFormat::Jpeg);
//! assert_eq!(options.frame_output().resolve_dimensions(1280, 720), (224, 126));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use ffmpeg_next::format::Pixel;
use image::ImageFormat;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Pixel layout of sampled frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Packed RGB, 3 bytes per pixel. The default.
    #[default]
    Rgb8,
    /// 8-bit RGBA with alpha set to 255 (32 bpp).
    Rgba8,
    /// Single-channel luma.
    Gray8,
}

impl PixelFormat {
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rgb8" | "rgb" => Ok(PixelFormat::Rgb8),
            "rgba8" | "rgba" => Ok(PixelFormat::Rgba8),
            "gray8" | "gray" | "greyscale" | "grayscale" => Ok(PixelFormat::Gray8),
            other => Err(format!("unsupported pixel format: {other}")),
        }
    }
}

/// Frame output settings: pixel format and resolution.
///
/// When no dimensions are set the source resolution is used. Setting one
/// dimension together with `maintain_aspect_ratio` derives the other.
#[derive(Debug, Clone)]
pub struct FrameOutputOptions {
    /// Output pixel format.
    pub pixel_format: PixelFormat,
    /// Output width, or the source width.
    pub width: Option<u32>,
    /// Output height, or the source height.
    pub height: Option<u32>,
    /// Preserve the source aspect ratio when only one dimension is given.
    pub maintain_aspect_ratio: bool,
}

impl Default for FrameOutputOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Rgb8,
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }
}

impl FrameOutputOptions {
    /// The `(width, height)` frames are scaled to for a source of the given
    /// size.
    pub fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        let keep_ratio = self.maintain_aspect_ratio;
        match (self.width, self.height) {
            (Some(width), Some(height)) => (width, height),
            (Some(width), None) if keep_ratio && source_width > 0 => {
                (width, scale_axis(source_height, width, source_width))
            }
            (None, Some(height)) if keep_ratio && source_height > 0 => {
                (scale_axis(source_width, height, source_height), height)
            }
            (width, height) => (
                width.unwrap_or(source_width),
                height.unwrap_or(source_height),
            ),
        }
    }
}

/// `length * numerator / denominator`, rounded, never below 1.
fn scale_axis(length: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = f64::from(length) * f64::from(numerator) / f64::from(denominator);
    (scaled.round() as u32).max(1)
}

/// Options for a sampling run.
///
/// A default-constructed value samples at source resolution in RGB8, writes
/// PNG files, reports no progress, and is never cancelled.
#[derive(Clone)]
pub struct SampleOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) batch_size: u64,
    pub(crate) frame_output: FrameOutputOptions,
    pub(crate) image_format: ImageFormat,
}

impl Debug for SampleOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SampleOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("frame_output", &self.frame_output)
            .field("image_format", &self.image_format)
            .finish_non_exhaustive()
    }
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
            frame_output: FrameOutputOptions::default(),
            image_format: ImageFormat::Png,
        }
    }

    /// Attach a progress callback, invoked every
    /// [`batch_size`](SampleOptions::with_batch_size) target frames.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Stop sampling when `token` is cancelled.
    ///
    /// Once cancelled, sampling stops before the next target frame and
    /// returns [`ChapterizeError::Cancelled`](crate::ChapterizeError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the pixel format of sampled frames.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.frame_output.pixel_format = format;
        self
    }

    /// Scale sampled frames. `None` keeps the source value for that axis.
    #[must_use]
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.frame_output.width = width;
        self.frame_output.height = height;
        self
    }

    /// Derive the missing dimension from the source aspect ratio when only
    /// one is set. On by default.
    #[must_use]
    pub fn with_maintain_aspect_ratio(mut self, maintain: bool) -> Self {
        self.frame_output.maintain_aspect_ratio = maintain;
        self
    }

    /// Set the encoding used when frames are written to a sink.
    #[must_use]
    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }

    /// The frame output settings.
    pub fn frame_output(&self) -> &FrameOutputOptions {
        &self.frame_output
    }

    /// The encoding used when frames are written to a sink.
    pub fn image_format(&self) -> ImageFormat {
        self.image_format
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
