//! FFmpeg-backed video source.
//!
//! [`MediaFile`] opens a video file or URL, caches its [`VideoMetadata`], and
//! implements [`VideoSource`] by seeking to the nearest keyframe before each
//! requested index and decoding forward. The demuxer is released when the
//! `MediaFile` is dropped.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::{
    configuration::{FrameOutputOptions, PixelFormat},
    conversion,
    error::ChapterizeError,
    metadata::VideoMetadata,
    source::VideoSource,
};

/// An open video file.
///
/// # Example
///
/// ```no_run
/// use chapterize::{ChapterizeError, MediaFile, VideoSource};
///
/// let mut media = MediaFile::open("talk.mp4")?;
/// println!("{:?}", media.metadata());
/// if let Some(frame) = media.read_frame(31)? {
///     frame.save("frame_31.png")?;
/// }
/// # Ok::<(), ChapterizeError>(())
/// ```
pub struct MediaFile {
    input_context: Input,
    metadata: VideoMetadata,
    video_stream_index: usize,
    frame_output: FrameOutputOptions,
    file_path: PathBuf,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("frame_output", &self.frame_output)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open a video for sampling.
    ///
    /// Initializes FFmpeg (idempotent), opens the input, and reads frame
    /// rate and frame count from the best video stream. `path` may be a
    /// local path or any URL FFmpeg can read.
    ///
    /// # Errors
    ///
    /// - [`ChapterizeError::FileOpen`] if the input cannot be opened or its
    ///   video codec cannot be decoded.
    /// - [`ChapterizeError::NoVideoStream`] if there is no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChapterizeError> {
        let file_path = path.as_ref().to_path_buf();
        let open_error = |reason: String| ChapterizeError::FileOpen {
            path: file_path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", file_path.display());

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| open_error(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(ChapterizeError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| open_error(format!("Failed to create video decoder: {error}")))?;

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 && frame_rate.numerator() != 0 {
            f64::from(frame_rate)
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                f64::from(rate)
            } else {
                0.0
            }
        };

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else if stream.duration() > 0 {
            Duration::from_secs_f64(conversion::pts_to_seconds(
                stream.duration(),
                stream.time_base(),
            ))
        } else {
            Duration::ZERO
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        log::info!(
            "Opened video: {} ({}x{}, {:.3} fps, {} frames, {:.2}s, codec={})",
            file_path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.duration.as_secs_f64(),
            metadata.codec,
        );

        Ok(Self {
            input_context,
            metadata,
            video_stream_index,
            frame_output: FrameOutputOptions::default(),
            file_path,
        })
    }

    /// The cached video metadata.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// The path or URL this file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Set the pixel format and resolution of frames returned by
    /// [`read_frame`](VideoSource::read_frame).
    pub fn set_frame_output(&mut self, frame_output: FrameOutputOptions) {
        self.frame_output = frame_output;
    }

    fn decoder(&self) -> Result<(VideoDecoder, ffmpeg_next::Rational), ChapterizeError> {
        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(ChapterizeError::NoVideoStream)?;
        let time_base = stream.time_base();
        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        Ok((decoder, time_base))
    }
}

impl VideoSource for MediaFile {
    fn frame_count(&self) -> u64 {
        self.metadata.frame_count
    }

    fn frames_per_second(&self) -> f64 {
        self.metadata.frames_per_second
    }

    fn read_frame(&mut self, index: u64) -> Result<Option<DynamicImage>, ChapterizeError> {
        let frames_per_second = self.metadata.frames_per_second;
        if frames_per_second <= 0.0 {
            return Err(ChapterizeError::InvalidFrameRate(frames_per_second));
        }

        // A fresh decoder per read keeps no state from the previous seek.
        let (mut decoder, time_base) = self.decoder()?;
        let pixel_format = self.frame_output.pixel_format;
        let (width, height) = self
            .frame_output
            .resolve_dimensions(decoder.width(), decoder.height());

        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            pixel_format.to_ffmpeg_pixel(),
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let seek_timestamp = conversion::frame_index_to_seek_timestamp(index, frames_per_second);
        self.input_context.seek(seek_timestamp, ..seek_timestamp)?;

        let video_stream_index = self.video_stream_index;
        let mut decoded_frame = VideoFrame::empty();
        let mut scaled_frame = VideoFrame::empty();

        for (stream, packet) in self.input_context.packets() {
            if stream.index() != video_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                let pts = decoded_frame.timestamp().or(decoded_frame.pts()).unwrap_or(0);
                let current = conversion::pts_to_frame_index(pts, time_base, frames_per_second);
                if current >= index {
                    scaler.run(&decoded_frame, &mut scaled_frame)?;
                    return frame_to_image(&scaled_frame, width, height, pixel_format).map(Some);
                }
            }
        }

        decoder.send_eof()?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            let pts = decoded_frame.timestamp().or(decoded_frame.pts()).unwrap_or(0);
            let current = conversion::pts_to_frame_index(pts, time_base, frames_per_second);
            if current >= index {
                scaler.run(&decoded_frame, &mut scaled_frame)?;
                return frame_to_image(&scaled_frame, width, height, pixel_format).map(Some);
            }
        }

        Ok(None)
    }
}

impl Drop for MediaFile {
    fn drop(&mut self) {
        log::debug!("Releasing video: {}", self.file_path.display());
    }
}

/// Convert a scaled video frame to an [`image::DynamicImage`].
fn frame_to_image(
    frame: &VideoFrame,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Result<DynamicImage, ChapterizeError> {
    let buffer = conversion::frame_to_buffer(frame, width, height, pixel_format.bytes_per_pixel());
    let image = match pixel_format {
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(width, height, buffer).map(DynamicImage::ImageLuma8)
        }
    };
    image.ok_or_else(|| {
        ChapterizeError::VideoDecodeError(
            "Failed to construct image from decoded frame data".to_string(),
        )
    })
}
