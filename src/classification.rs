//! Classification results and the classifier seam.
//!
//! How frames are classified is up to the caller: anything implementing
//! [`Classifier`] can turn a batch of sampled frames into
//! [`ClassificationResult`]s. [`PredictionDirectory`] replays the JSONL
//! output of an offline batch job.

use std::path::{Path, PathBuf};

use crate::{error::ChapterizeError, manifest, sampler::FrameReference};

/// A candidate label and the classifier's confidence in it.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    /// Label name.
    pub name: String,
    /// Confidence, nominally in `[0, 1]`.
    pub confidence: f64,
}

impl LabelScore {
    /// Create a label score.
    pub fn new<S: Into<String>>(name: S, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Per-label scores for one sampled frame.
///
/// Labels keep the order the classifier reported them in; confidences are
/// neither sorted nor required to sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// Index of the classified frame.
    pub frame_index: u64,
    /// One entry per candidate label.
    pub labels: Vec<LabelScore>,
}

impl ClassificationResult {
    /// Create a result for `frame_index`.
    pub fn new(frame_index: u64, labels: Vec<LabelScore>) -> Self {
        Self {
            frame_index,
            labels,
        }
    }

    /// The label with the highest confidence.
    ///
    /// When several labels share the maximum, the first one in label order
    /// wins.
    ///
    /// # Errors
    ///
    /// [`ChapterizeError::MalformedResult`] if there are no labels or a
    /// confidence is NaN.
    ///
    /// # Example
    ///
    /// ```
    /// use chapterize::{ClassificationResult, LabelScore};
    ///
    /// let result = ClassificationResult::new(1, vec![
    ///     LabelScore::new("speaker", 0.4),
    ///     LabelScore::new("slides", 0.6),
    /// ]);
    /// assert_eq!(result.top_label().unwrap().name, "slides");
    /// ```
    pub fn top_label(&self) -> Result<&LabelScore, ChapterizeError> {
        let malformed = |reason: &str| ChapterizeError::MalformedResult {
            frame_index: Some(self.frame_index),
            reason: reason.to_string(),
        };

        if self.labels.iter().any(|label| label.confidence.is_nan()) {
            return Err(malformed("confidence is not a number"));
        }

        let mut labels = self.labels.iter();
        let first = labels.next().ok_or_else(|| malformed("no labels"))?;
        Ok(labels.fold(first, |best, label| {
            if label.confidence > best.confidence {
                label
            } else {
                best
            }
        }))
    }
}

/// What a classifier is asked to label.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRequest<'a> {
    /// Identity of the video the frames come from.
    pub video_id: &'a str,
    /// The sampled frames, in increasing index order.
    pub frames: &'a [FrameReference],
    /// Reference to the JSONL manifest listing `frames`, if the sink wrote one.
    pub manifest: Option<&'a str>,
}

/// Turns sampled frames into classification results.
///
/// Results may come back in any order. Implementations must be [`Send`] and
/// [`Sync`] so one classifier can serve several videos at once.
///
/// Closures with the right signature implement this trait:
///
/// ```
/// use chapterize::{
///     ChapterizeError, ClassificationRequest, ClassificationResult, Classifier, LabelScore,
/// };
///
/// let everything_is_slides = |request: &ClassificationRequest<'_>| {
///     Ok::<_, ChapterizeError>(request
///         .frames
///         .iter()
///         .map(|frame| ClassificationResult::new(frame.index, vec![LabelScore::new("slides", 1.0)]))
///         .collect())
/// };
/// # fn assert_classifier<C: Classifier>(_: &C) {}
/// # assert_classifier(&everything_is_slides);
/// ```
pub trait Classifier: Send + Sync {
    /// Classify every frame in `request`.
    fn classify(
        &self,
        request: &ClassificationRequest<'_>,
    ) -> Result<Vec<ClassificationResult>, ChapterizeError>;
}

impl<F> Classifier for F
where
    F: Fn(&ClassificationRequest<'_>) -> Result<Vec<ClassificationResult>, ChapterizeError>
        + Send
        + Sync,
{
    fn classify(
        &self,
        request: &ClassificationRequest<'_>,
    ) -> Result<Vec<ClassificationResult>, ChapterizeError> {
        self(request)
    }
}

/// Replays batch prediction output stored on disk.
///
/// Predictions for a video are read from every `*.jsonl` file below
/// `<root>/<video_id>/`. Keep this directory separate from the frame output
/// directory, since manifests are JSONL too.
#[derive(Debug, Clone)]
pub struct PredictionDirectory {
    root: PathBuf,
}

impl PredictionDirectory {
    /// Read predictions from below `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The directory predictions for `video_id` are read from.
    pub fn directory_for(&self, video_id: &str) -> PathBuf {
        self.root.join(video_id)
    }
}

impl Classifier for PredictionDirectory {
    fn classify(
        &self,
        request: &ClassificationRequest<'_>,
    ) -> Result<Vec<ClassificationResult>, ChapterizeError> {
        let directory = self.directory_for(request.video_id);
        let results = manifest::read_predictions(&directory)?;
        if results.len() != request.frames.len() {
            log::warn!(
                "{} predictions in {} for {} sampled frames",
                results.len(),
                directory.display(),
                request.frames.len(),
            );
        }
        Ok(results)
    }
}
