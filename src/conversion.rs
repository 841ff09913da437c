//! Internal conversion helpers.
//!
//! Pixel-data copying and frame/time conversions shared by the FFmpeg-backed
//! source and the chapter merger.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

use crate::error::ChapterizeError;

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer,
/// dropping any per-row stride padding.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a frame index.
///
/// Rounds to the nearest frame so that timestamps stored with limited
/// precision do not land one frame early.
pub(crate) fn pts_to_frame_index(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts_to_seconds(pts, time_base);
    (seconds * frames_per_second).round().max(0.0) as u64
}

/// Convert a frame index to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `Input::seek` with no stream selected expects container-level
/// timestamps, so the stream time base is bypassed entirely.
pub(crate) fn frame_index_to_seek_timestamp(frame_index: u64, frames_per_second: f64) -> i64 {
    let seconds = frame_index as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// The instant a frame index represents: `index / fps` seconds.
///
/// Very small frame rates push the quotient past what a [`Duration`] can
/// hold; that is reported instead of panicking.
pub(crate) fn frame_index_to_duration(
    frame_index: u64,
    frames_per_second: f64,
) -> Result<Duration, ChapterizeError> {
    Duration::try_from_secs_f64(frame_index as f64 / frames_per_second).map_err(|_| {
        ChapterizeError::TimestampOutOfRange {
            frame_index,
            frames_per_second,
        }
    })
}
