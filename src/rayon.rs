//! Parallel multi-video processing.
//!
//! Backs [`ChapterPipeline::process_many`](crate::ChapterPipeline::process_many)
//! when the `rayon` feature is enabled. Each video runs entirely on one
//! worker with its own demuxer and decoder, so nothing is shared between
//! videos except the sink and the classifier.

use ::rayon::{
    ThreadPoolBuilder,
    iter::{IntoParallelRefIterator, ParallelIterator},
};

use crate::{
    classification::Classifier,
    error::ChapterizeError,
    pipeline::{ChapterPipeline, VideoChapters, VideoJob},
    sink::FrameSink,
    source::VideoSource,
};

/// Run `jobs` on a dedicated pool of `parallelism` threads.
///
/// Results are returned in input order. If the pool cannot be built the
/// videos are processed on the calling thread instead.
pub(crate) fn process_parallel<K, C, S, F>(
    pipeline: &ChapterPipeline<K, C>,
    jobs: &[VideoJob<'_>],
    parallelism: usize,
    open: &F,
) -> Vec<Result<VideoChapters, ChapterizeError>>
where
    K: FrameSink,
    C: Classifier,
    S: VideoSource,
    F: Fn(&str) -> Result<S, ChapterizeError> + Sync,
{
    match ThreadPoolBuilder::new().num_threads(parallelism.max(1)).build() {
        Ok(pool) => pool.install(|| {
            jobs.par_iter()
                .map(|job| pipeline.run_job(job, open))
                .collect()
        }),
        Err(error) => {
            log::warn!("Could not build a {parallelism}-thread pool ({error}), processing sequentially");
            jobs.iter().map(|job| pipeline.run_job(job, open)).collect()
        }
    }
}
