//! Sampling progress and cancellation.
//!
//! Sampling a long recording means one seek and decode per second of video,
//! which can take a while. Attach a [`ProgressCallback`] to watch it and a
//! [`CancellationToken`] to stop it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chapterize::{
//!     ChapterizeError, FrameSampler, MediaFile, ProgressCallback, ProgressInfo, SampleOptions,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let (Some(total), Some(frame)) = (info.total, info.current_frame) {
//!             println!("{}/{total} (frame {frame})", info.current);
//!         }
//!     }
//! }
//!
//! let mut media = MediaFile::open("talk.mp4")?;
//! let options = SampleOptions::new().with_progress(Arc::new(PrintProgress));
//! let frames = FrameSampler::new(&options).sample_frames(&mut media)?;
//! # Ok::<(), ChapterizeError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// What a [`ProgressInfo`] is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Seeking to and decoding sampled frames.
    FrameSampling,
}

/// A snapshot of progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`SampleOptions::with_batch_size`](crate::SampleOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// The operation being counted.
    pub operation: OperationType,
    /// How many items have been processed so far, skipped frames included.
    pub current: u64,
    /// Number of target frames, when known.
    pub total: Option<u64>,
    /// `current / total` as a percentage.
    pub percentage: Option<f32>,
    /// Time since sampling started.
    pub elapsed: Duration,
    /// Linear extrapolation of `elapsed` over the remaining frames.
    pub estimated_remaining: Option<Duration>,
    /// The frame index most recently processed.
    pub current_frame: Option<u64>,
}

/// Receives [`ProgressInfo`] snapshots while frames are sampled.
///
/// Multi-video runs sample on worker threads, hence the [`Send`] and
/// [`Sync`] bounds.
///
/// Progress callbacks are **infallible**: they observe but cannot halt the
/// operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` frames and once at the end.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Stops a sampling run between frames.
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop sampling
/// before the next target frame. Frames already handed to the sink stay
/// where they are.
///
/// # Example
///
/// ```
/// use chapterize::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled yet.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones of this token observe it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](CancellationToken::cancel) has been called on this
    /// token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts sampled (or skipped) frames and reports every `every` of them.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    completed: u64,
    pending: u64,
    every: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        every: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            completed: 0,
            pending: 0,
            every: every.max(1),
            started: Instant::now(),
        }
    }

    /// Count one frame; reports once `every` frames have accumulated.
    pub(crate) fn advance(&mut self, frame_index: Option<u64>) {
        self.completed += 1;
        self.pending += 1;
        if self.pending == self.every {
            self.pending = 0;
            self.report(frame_index);
        }
    }

    /// Report the final state regardless of cadence.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, frame_index: Option<u64>) {
        let elapsed = self.started.elapsed();
        let (percentage, estimated_remaining) = match self.total {
            Some(total) if total > 0 && self.completed > 0 => {
                let done = self.completed as f64 / total as f64;
                let left = total.saturating_sub(self.completed) as f64 / self.completed as f64;
                (Some((done * 100.0) as f32), Some(elapsed.mul_f64(left)))
            }
            Some(total) if total > 0 => (Some(0.0), None),
            _ => (None, None),
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.completed,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_index,
        });
    }
}
