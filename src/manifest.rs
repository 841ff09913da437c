//! Classification input and output records.
//!
//! The classifier consumes a JSONL manifest with one
//! `{"content": <frame reference>, "mimeType": "image/png"}` object per line
//! and produces JSONL prediction records of the form
//!
//! ```json
//! {"instance": {"content": "frames/talk/31.png"},
//!  "prediction": {"confidences": [0.9, 0.1], "displayNames": ["slides", "speaker"]}}
//! ```
//!
//! This module reads and writes both shapes and converts prediction records
//! into [`ClassificationResult`]s.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::{
    classification::{ClassificationResult, LabelScore},
    error::ChapterizeError,
    sampler::FrameReference,
};

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Reference to the stored frame.
    pub content: String,
    /// MIME type of the stored frame.
    pub mime_type: String,
}

impl ManifestEntry {
    /// Build manifest entries for `frames`, preserving their order.
    pub fn for_frames(frames: &[FrameReference], format: ImageFormat) -> Vec<Self> {
        let mime_type = format.to_mime_type().to_string();
        frames
            .iter()
            .map(|frame| ManifestEntry {
                content: frame.uri.clone(),
                mime_type: mime_type.clone(),
            })
            .collect()
    }
}

/// Write `entries` as JSONL, one object per line.
pub fn write_manifest<W: Write>(
    mut writer: W,
    entries: &[ManifestEntry],
) -> Result<(), ChapterizeError> {
    for entry in entries {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// The instance a prediction was made for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInstance {
    /// Reference to the classified frame, as listed in the manifest.
    pub content: String,
}

/// Per-label confidences, as two parallel arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Confidence per label, in `[0, 1]`.
    pub confidences: Vec<f64>,
    /// Label names, parallel to `confidences`.
    pub display_names: Vec<String>,
}

/// One line of classifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// The classified frame.
    pub instance: PredictionInstance,
    /// The classifier's scores for it.
    pub prediction: Prediction,
}

impl PredictionRecord {
    /// Convert into a [`ClassificationResult`].
    ///
    /// # Errors
    ///
    /// - [`ChapterizeError::InvalidFrameReference`] if the instance content
    ///   does not end in a numeric frame index.
    /// - [`ChapterizeError::MalformedResult`] if `confidences` and
    ///   `displayNames` differ in length.
    pub fn into_result(self) -> Result<ClassificationResult, ChapterizeError> {
        let frame_index = frame_index_from_reference(&self.instance.content)?;
        let Prediction {
            confidences,
            display_names,
        } = self.prediction;

        if confidences.len() != display_names.len() {
            return Err(ChapterizeError::MalformedResult {
                frame_index: Some(frame_index),
                reason: format!(
                    "{} confidences for {} display names",
                    confidences.len(),
                    display_names.len()
                ),
            });
        }

        let labels = display_names
            .into_iter()
            .zip(confidences)
            .map(|(name, confidence)| LabelScore::new(name, confidence))
            .collect();

        Ok(ClassificationResult::new(frame_index, labels))
    }
}

/// Extract the frame index from a frame reference such as
/// `gs://bucket/talk/31.png`: the numeric file stem of the last segment.
///
/// ```
/// assert_eq!(chapterize::frame_index_from_reference("gs://b/talk/31.png").unwrap(), 31);
/// assert!(chapterize::frame_index_from_reference("gs://b/talk/cover.png").is_err());
/// ```
pub fn frame_index_from_reference(reference: &str) -> Result<u64, ChapterizeError> {
    let name = reference.rsplit(['/', '\\']).next().unwrap_or_default();
    let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
    stem.parse::<u64>()
        .map_err(|_| ChapterizeError::InvalidFrameReference(reference.to_string()))
}

/// Parse JSONL prediction records, skipping blank lines.
pub fn parse_predictions<R: BufRead>(
    reader: R,
) -> Result<Vec<ClassificationResult>, ChapterizeError> {
    let mut results = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: PredictionRecord = serde_json::from_str(line)?;
        results.push(record.into_result()?);
    }
    Ok(results)
}

/// Read every `*.jsonl` file below `directory` (recursively, in sorted path
/// order) and return the union of their prediction records.
pub fn read_predictions<P: AsRef<Path>>(
    directory: P,
) -> Result<Vec<ClassificationResult>, ChapterizeError> {
    let mut files = Vec::new();
    collect_jsonl_files(directory.as_ref(), &mut files)?;
    files.sort();

    let mut results = Vec::new();
    for file in &files {
        let parsed = parse_predictions(BufReader::new(File::open(file)?))?;
        log::debug!("Read {} predictions from {}", parsed.len(), file.display());
        results.extend(parsed);
    }
    Ok(results)
}

fn collect_jsonl_files(
    directory: &Path,
    files: &mut Vec<PathBuf>,
) -> Result<(), ChapterizeError> {
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_jsonl_files(&path, files)?;
        } else if path.extension().is_some_and(|extension| extension == "jsonl") {
            files.push(path);
        }
    }
    Ok(())
}
