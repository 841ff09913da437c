//! Per-video chapter identification.
//!
//! [`ChapterPipeline`] runs the four stages for one video (open, sample,
//! classify, merge) and tags any failure with the stage it happened in.
//! [`process_many`](ChapterPipeline::process_many) fans out over several
//! videos; each video's state is private to its run, so one failure never
//! affects the others.
//!
//! # Example
//!
//! ```no_run
//! use chapterize::{ChapterPipeline, DirectorySink, PredictionDirectory};
//!
//! let pipeline = ChapterPipeline::new(
//!     DirectorySink::new("frames"),
//!     PredictionDirectory::new("predictions"),
//! );
//!
//! for result in pipeline.process_many(&["talk_part_1.ogv", "talk_part_2.ogv"]) {
//!     match result {
//!         Ok(video) => {
//!             for chapter in &video.chapters {
//!                 println!("{chapter}");
//!             }
//!         }
//!         Err(error) => eprintln!("{error}"),
//!     }
//! }
//! ```

use std::{
    collections::HashSet,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    chapter::{Chapter, ChapterBlock, MergeOptions, merge_blocks, to_chapters},
    classification::{ClassificationRequest, Classifier},
    configuration::SampleOptions,
    error::{ChapterizeError, PipelineStage},
    manifest::ManifestEntry,
    media::MediaFile,
    sampler::{FrameReference, FrameSampler},
    sink::{FrameSink, video_identity},
    source::VideoSource,
};

/// Settings for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub(crate) sample: SampleOptions,
    pub(crate) merge: MergeOptions,
    pub(crate) parallelism: usize,
    pub(crate) write_manifest: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineOptions {
    /// Defaults: default sample and merge options, up to 5 videos at once,
    /// manifests written.
    pub fn new() -> Self {
        Self {
            sample: SampleOptions::new(),
            merge: MergeOptions::new(),
            parallelism: 5,
            write_manifest: true,
        }
    }

    /// Options used when sampling each video.
    #[must_use]
    pub fn with_sample_options(mut self, options: SampleOptions) -> Self {
        self.sample = options;
        self
    }

    /// Options used when merging each video's results.
    #[must_use]
    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.merge = options;
        self
    }

    /// Maximum number of videos processed at once by
    /// [`process_many`](ChapterPipeline::process_many). Clamped to at least 1.
    /// Only takes effect with the `rayon` feature.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Whether to write a JSONL manifest of the sampled frames to the sink
    /// before classification. Defaults to `true`.
    #[must_use]
    pub fn with_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    /// The sample options.
    pub fn sample_options(&self) -> &SampleOptions {
        &self.sample
    }
}

/// The outcome of processing one video.
#[derive(Debug, Clone)]
pub struct VideoChapters {
    /// The video's path or URI.
    pub video: String,
    /// Identity used to key the video's frames.
    pub video_id: String,
    /// The video's frame rate.
    pub frames_per_second: f64,
    /// Frames written to the sink, in increasing index order.
    pub frames: Vec<FrameReference>,
    /// Target indices that could not be decoded.
    pub skipped: Vec<u64>,
    /// Reference to the manifest, if one was written.
    pub manifest: Option<String>,
    /// Merged blocks in frame units.
    pub blocks: Vec<ChapterBlock>,
    /// Merged blocks in time units.
    pub chapters: Vec<Chapter>,
}

/// Drives sampling, classification, and merging for one or more videos.
#[derive(Debug)]
pub struct ChapterPipeline<K, C> {
    sink: K,
    classifier: C,
    options: PipelineOptions,
}

impl<K: FrameSink, C: Classifier> ChapterPipeline<K, C> {
    /// Create a pipeline writing frames to `sink` and labelling them with
    /// `classifier`.
    pub fn new(sink: K, classifier: C) -> Self {
        Self {
            sink,
            classifier,
            options: PipelineOptions::new(),
        }
    }

    /// Replace the pipeline options.
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// The frame sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// The pipeline options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Open `uri` with FFmpeg and process it.
    ///
    /// The video is released once sampling has finished, before
    /// classification starts.
    ///
    /// # Errors
    ///
    /// A [`ChapterizeError::Stage`] naming the failing stage.
    pub fn process(&self, uri: &str) -> Result<VideoChapters, ChapterizeError> {
        self.process_with(uri, |uri| self.open_media(uri))
    }

    /// Process `uri`, obtaining its frames from `open` instead of FFmpeg.
    ///
    /// An error from `open` is reported as the [`PipelineStage::Open`]
    /// stage. The source is dropped before classification starts.
    pub fn process_with<S, F>(&self, uri: &str, open: F) -> Result<VideoChapters, ChapterizeError>
    where
        S: VideoSource,
        F: FnOnce(&str) -> Result<S, ChapterizeError>,
    {
        let mut source = open(uri).map_err(|error| error.in_stage(PipelineStage::Open))?;

        let video_id = video_identity(uri);
        let frames_per_second = source.frames_per_second();
        let sampled = self.sample(&mut source, &video_id);
        drop(source);

        let (frames, skipped, manifest) = sampled?;
        self.classify_and_merge(uri, video_id, frames_per_second, frames, skipped, manifest)
    }

    /// Process an already-open video source.
    ///
    /// `uri` only determines the video identity used for frame keys.
    pub fn process_source<S>(
        &self,
        uri: &str,
        source: &mut S,
    ) -> Result<VideoChapters, ChapterizeError>
    where
        S: VideoSource + ?Sized,
    {
        let video_id = video_identity(uri);
        let frames_per_second = source.frames_per_second();
        let (frames, skipped, manifest) = self.sample(source, &video_id)?;
        self.classify_and_merge(uri, video_id, frames_per_second, frames, skipped, manifest)
    }

    /// Process every video in `uris`, returning one result per input in
    /// input order.
    ///
    /// With the `rayon` feature up to
    /// [`parallelism`](PipelineOptions::with_parallelism) videos run at once;
    /// otherwise they run one after another. Failures are logged and
    /// returned; they never stop the remaining videos.
    ///
    /// A video whose [`video_identity`] was already claimed by an earlier
    /// input is not processed and fails in the [`PipelineStage::Open`] stage
    /// with [`ChapterizeError::DuplicateVideo`].
    pub fn process_many<U>(&self, uris: &[U]) -> Vec<Result<VideoChapters, ChapterizeError>>
    where
        U: AsRef<str> + Sync,
    {
        self.process_many_with(uris, |uri| self.open_media(uri))
    }

    /// [`process_many`](ChapterPipeline::process_many) with sources obtained
    /// from `open`.
    pub fn process_many_with<U, S, F>(
        &self,
        uris: &[U],
        open: F,
    ) -> Vec<Result<VideoChapters, ChapterizeError>>
    where
        U: AsRef<str> + Sync,
        S: VideoSource,
        F: Fn(&str) -> Result<S, ChapterizeError> + Sync,
    {
        let jobs = plan_jobs(uris);

        #[cfg(feature = "rayon")]
        {
            crate::rayon::process_parallel(self, &jobs, self.options.parallelism, &open)
        }

        #[cfg(not(feature = "rayon"))]
        {
            jobs.iter().map(|job| self.run_job(job, &open)).collect()
        }
    }

    pub(crate) fn run_job<S, F>(
        &self,
        job: &VideoJob<'_>,
        open: &F,
    ) -> Result<VideoChapters, ChapterizeError>
    where
        S: VideoSource,
        F: Fn(&str) -> Result<S, ChapterizeError>,
    {
        let uri = job.uri;
        let result = match &job.duplicate_of {
            Some(video_id) => Err(ChapterizeError::DuplicateVideo {
                video_id: video_id.clone(),
                uri: uri.to_string(),
            }
            .in_stage(PipelineStage::Open)),
            None => self.process_with(uri, open),
        };
        match &result {
            Ok(video) => log::info!("{uri}: {} chapters", video.chapters.len()),
            Err(error) => log::error!("{uri}: {error}"),
        }
        result
    }

    fn open_media(&self, uri: &str) -> Result<MediaFile, ChapterizeError> {
        let mut media = MediaFile::open(uri)?;
        media.set_frame_output(self.options.sample.frame_output().clone());
        Ok(media)
    }

    #[allow(clippy::type_complexity)]
    fn sample<S>(
        &self,
        source: &mut S,
        video_id: &str,
    ) -> Result<(Vec<FrameReference>, Vec<u64>, Option<String>), ChapterizeError>
    where
        S: VideoSource + ?Sized,
    {
        let stage = |error: ChapterizeError| error.in_stage(PipelineStage::Sample);

        let (frames, report) = FrameSampler::new(&self.options.sample)
            .sample_to_sink_with_report(source, &self.sink, video_id)
            .map_err(stage)?;

        let manifest = if self.options.write_manifest {
            let entries = ManifestEntry::for_frames(&frames, self.options.sample.image_format());
            self.sink
                .put_manifest(&manifest_key(video_id), &entries)
                .map_err(stage)?
        } else {
            None
        };

        Ok((frames, report.skipped, manifest))
    }

    fn classify_and_merge(
        &self,
        uri: &str,
        video_id: String,
        frames_per_second: f64,
        frames: Vec<FrameReference>,
        skipped: Vec<u64>,
        manifest: Option<String>,
    ) -> Result<VideoChapters, ChapterizeError> {
        let request = ClassificationRequest {
            video_id: &video_id,
            frames: &frames,
            manifest: manifest.as_deref(),
        };
        let results = self
            .classifier
            .classify(&request)
            .map_err(|error| error.in_stage(PipelineStage::Classify))?;

        let merge_stage = |error: ChapterizeError| error.in_stage(PipelineStage::Merge);
        let blocks = merge_blocks(&results, &self.options.merge).map_err(merge_stage)?;
        let chapters = to_chapters(&blocks, frames_per_second).map_err(merge_stage)?;

        Ok(VideoChapters {
            video: uri.to_string(),
            video_id,
            frames_per_second,
            frames,
            skipped,
            manifest,
            blocks,
            chapters,
        })
    }
}

/// One input of a multi-video run.
#[derive(Debug)]
pub(crate) struct VideoJob<'a> {
    pub(crate) uri: &'a str,
    /// Set when an earlier input already maps to the same identity.
    pub(crate) duplicate_of: Option<String>,
}

fn plan_jobs<U: AsRef<str>>(uris: &[U]) -> Vec<VideoJob<'_>> {
    let mut claimed = HashSet::new();
    uris.iter()
        .map(|uri| {
            let uri = uri.as_ref();
            let video_id = video_identity(uri);
            let duplicate_of = if claimed.insert(video_id.clone()) {
                None
            } else {
                Some(video_id)
            };
            VideoJob { uri, duplicate_of }
        })
        .collect()
}

/// Key of the manifest written for a video: `<video_id>/frames-<unix seconds>.jsonl`.
pub fn manifest_key(video_id: &str) -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format!("{video_id}/frames-{seconds}.jsonl")
}
