//! # chapterize
//!
//! Turn long-form video into labeled chapters.
//!
//! `chapterize` samples one frame per second of video, hands the sampled
//! frames to a classifier of your choice, and merges consecutive frames that
//! share a top label into chapters with start and end times. Decoding is
//! powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Sample Frames
//!
//! ```no_run
//! use chapterize::{DirectorySink, FrameSampler, MediaFile, SampleOptions};
//!
//! let mut media = MediaFile::open("talk_part_4.ogv").unwrap();
//! let options = SampleOptions::new();
//! let frames = FrameSampler::new(&options)
//!     .sample_to_sink(&mut media, &DirectorySink::new("frames"), "talk_part_4")
//!     .unwrap();
//! ```
//!
//! ### Merge Classifier Output Into Chapters
//!
//! ```no_run
//! use chapterize::MergeOptions;
//!
//! let results = chapterize::read_predictions("predictions/talk_part_4").unwrap();
//! let chapters = chapterize::merge_chapters(&results, 29.97, &MergeOptions::new()).unwrap();
//! for chapter in &chapters {
//!     println!("{chapter}");
//! }
//! ```
//!
//! ### Run Everything For Several Videos
//!
//! ```no_run
//! use chapterize::{ChapterPipeline, DirectorySink, PredictionDirectory};
//!
//! let pipeline = ChapterPipeline::new(
//!     DirectorySink::new("frames"),
//!     PredictionDirectory::new("predictions"),
//! );
//! let results = pipeline.process_many(&["part_1.ogv", "part_2.ogv", "part_3.ogv"]);
//! ```
//!
//! ## Features
//!
//! - **Deterministic sampling**: frame 1, then every `floor(fps)` frames;
//!   undecodable frames are skipped and logged, never fatal
//! - **Pluggable storage and classification**: [`FrameSink`] and
//!   [`Classifier`] traits, with directory, in-memory, and prediction-replay
//!   implementations
//! - **Batch job records**: JSONL manifests in, JSONL prediction records out
//! - **Run-length merge**: order-independent input, first-match tie-break
//! - **Stage-tagged errors**: every per-video failure names the stage
//!   (open, sample, classify, merge) it came from
//! - **Progress & cancellation**: cooperative callbacks and
//!   [`CancellationToken`]
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | `process_many()` runs videos on a bounded rayon pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod chapter;
pub mod classification;
pub mod configuration;
mod conversion;
pub mod error;
pub mod ffmpeg;
pub mod manifest;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod sampler;
pub mod sink;
pub mod source;

pub use chapter::{
    Chapter, ChapterBlock, MergeOptions, format_timestamp, merge_blocks, merge_chapters,
    to_chapters,
};
pub use classification::{
    ClassificationRequest, ClassificationResult, Classifier, LabelScore, PredictionDirectory,
};
pub use configuration::{FrameOutputOptions, PixelFormat, SampleOptions};
pub use error::{ChapterizeError, PipelineStage};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use manifest::{
    ManifestEntry, Prediction, PredictionInstance, PredictionRecord, frame_index_from_reference,
    parse_predictions, read_predictions, write_manifest,
};
pub use media::MediaFile;
pub use metadata::VideoMetadata;
pub use pipeline::{ChapterPipeline, PipelineOptions, VideoChapters, manifest_key};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use sampler::{
    FrameReference, FrameSampler, SampledFrame, SamplingReport, sample_indices, sampling_step,
};
pub use sink::{DirectorySink, FrameSink, MemorySink, frame_key, video_identity};
pub use source::VideoSource;
