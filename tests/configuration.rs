//! SampleOptions, FrameOutputOptions, PixelFormat, and FFmpeg log level tests.
//!
//! Tests that decode require `tests/fixtures/sample_video.mp4` and are
//! skipped when it is absent.

use std::path::Path;

use chapterize::{
    FfmpegLogLevel, FrameOutputOptions, FrameSampler, MediaFile, PipelineOptions, PixelFormat,
    SampleOptions,
};
use image::{DynamicImage, ImageFormat};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

// ── SampleOptions builder ──────────────────────────────────────────

#[test]
fn options_defaults() {
    let options = SampleOptions::new();
    let debug = format!("{options:?}");
    assert!(debug.contains("SampleOptions"));
    assert!(debug.contains("has_cancellation: false"));
    assert!(debug.contains("batch_size: 1"));
    assert_eq!(options.image_format(), ImageFormat::Png);
    assert_eq!(options.frame_output().pixel_format, PixelFormat::Rgb8);
}

#[test]
fn options_with_batch_size_clamps_zero() {
    let options = SampleOptions::new().with_batch_size(0);
    assert!(format!("{options:?}").contains("batch_size: 1"));
}

#[test]
fn options_carry_frame_output_settings() {
    let options = SampleOptions::new()
        .with_pixel_format(PixelFormat::Gray8)
        .with_resolution(Some(320), None)
        .with_maintain_aspect_ratio(false);
    let output = options.frame_output();
    assert_eq!(output.pixel_format, PixelFormat::Gray8);
    assert_eq!(output.width, Some(320));
    assert_eq!(output.height, None);
    assert!(!output.maintain_aspect_ratio);
}

#[test]
fn pipeline_options_clamp_parallelism() {
    let options = PipelineOptions::new()
        .with_parallelism(0)
        .with_sample_options(SampleOptions::new().with_image_format(ImageFormat::Jpeg));
    assert_eq!(options.sample_options().image_format(), ImageFormat::Jpeg);
    assert!(format!("{options:?}").contains("parallelism: 1"));
}

// ── FrameOutputOptions ─────────────────────────────────────────────

#[test]
fn resolve_keeps_source_size_by_default() {
    let output = FrameOutputOptions::default();
    assert_eq!(output.resolve_dimensions(1920, 1080), (1920, 1080));
}

#[test]
fn resolve_derives_missing_dimension() {
    let output = FrameOutputOptions {
        width: Some(640),
        ..FrameOutputOptions::default()
    };
    assert_eq!(output.resolve_dimensions(1920, 1080), (640, 360));

    let output = FrameOutputOptions {
        height: Some(540),
        ..FrameOutputOptions::default()
    };
    assert_eq!(output.resolve_dimensions(1920, 1080), (960, 540));
}

#[test]
fn resolve_without_aspect_ratio_keeps_other_axis() {
    let output = FrameOutputOptions {
        width: Some(640),
        maintain_aspect_ratio: false,
        ..FrameOutputOptions::default()
    };
    assert_eq!(output.resolve_dimensions(1920, 1080), (640, 1080));
}

// ── String parsing ─────────────────────────────────────────────────

#[test]
fn pixel_format_from_str() {
    assert_eq!("rgb8".parse::<PixelFormat>(), Ok(PixelFormat::Rgb8));
    assert_eq!("RGBA".parse::<PixelFormat>(), Ok(PixelFormat::Rgba8));
    assert_eq!("grayscale".parse::<PixelFormat>(), Ok(PixelFormat::Gray8));
    assert!("yuv420p".parse::<PixelFormat>().is_err());
}

#[test]
fn ffmpeg_log_level_from_str() {
    assert_eq!("quiet".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Quiet));
    assert_eq!("Warning".parse::<FfmpegLogLevel>(), Ok(FfmpegLogLevel::Warning));
    assert!("loud".parse::<FfmpegLogLevel>().is_err());
}

// ── Decoded pixel formats ──────────────────────────────────────────

fn pixel_format_of(image: &DynamicImage) -> Option<PixelFormat> {
    match image {
        DynamicImage::ImageRgb8(_) => Some(PixelFormat::Rgb8),
        DynamicImage::ImageRgba8(_) => Some(PixelFormat::Rgba8),
        DynamicImage::ImageLuma8(_) => Some(PixelFormat::Gray8),
        _ => None,
    }
}

#[test]
fn sampled_frames_use_requested_pixel_format() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    for format in [PixelFormat::Rgb8, PixelFormat::Rgba8, PixelFormat::Gray8] {
        let options = SampleOptions::new()
            .with_pixel_format(format)
            .with_resolution(Some(160), None);
        let mut media = MediaFile::open(path).expect("Failed to open fixture");
        media.set_frame_output(options.frame_output().clone());

        let frames = FrameSampler::new(&options)
            .sample_frames(&mut media)
            .expect("Failed to sample");
        assert!(!frames.is_empty());
        assert_eq!(pixel_format_of(&frames[0].image), Some(format));
        assert_eq!(frames[0].image.width(), 160);
    }
}
