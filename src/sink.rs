//! Frame storage.
//!
//! Sampled frames are written through a [`FrameSink`], keyed by a
//! deterministic path derived from the video identity and the frame index
//! (`<video_id>/<index>.png`). Writing the same key twice with the same image
//! is harmless, so an interrupted run can simply be repeated.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use image::{DynamicImage, ImageFormat};

use crate::{
    error::ChapterizeError,
    manifest::{self, ManifestEntry},
};

/// Key-value storage for sampled frames.
///
/// Implementations must be [`Send`] and [`Sync`]: one sink is shared by all
/// videos of a multi-video run.
pub trait FrameSink: Send + Sync {
    /// Store `image` under `key`, encoded as `format`.
    ///
    /// Returns the reference (path or URI) the frame can be read back from.
    fn put(
        &self,
        key: &str,
        image: &DynamicImage,
        format: ImageFormat,
    ) -> Result<String, ChapterizeError>;

    /// Store a classification manifest under `key`.
    ///
    /// Returns the manifest's reference, or `None` if this sink does not keep
    /// manifests.
    fn put_manifest(
        &self,
        _key: &str,
        _entries: &[ManifestEntry],
    ) -> Result<Option<String>, ChapterizeError> {
        Ok(None)
    }
}

/// The storage key for a sampled frame: `<video_id>/<index>.<ext>`.
///
/// ```
/// use image::ImageFormat;
///
/// assert_eq!(chapterize::frame_key("talk", 31, ImageFormat::Png), "talk/31.png");
/// ```
pub fn frame_key(video_id: &str, index: u64, format: ImageFormat) -> String {
    let extension = format.extensions_str().first().copied().unwrap_or("png");
    format!("{video_id}/{index}.{extension}")
}

/// Derive a stable video identity from its URI: the path below the scheme
/// and bucket (or host), with the file extension removed.
///
/// Keeping the directories apart means two recordings that share a file
/// name still get separate frame keys. Empty, `.` and `..` segments and
/// drive prefixes are dropped so the identity is always a relative key.
///
/// ```
/// use chapterize::video_identity;
///
/// assert_eq!(video_identity("gs://bucket/talk_part_4.ogv"), "talk_part_4");
/// assert_eq!(video_identity("gs://bucket/2011/talk.ogv"), "2011/talk");
/// assert_eq!(video_identity("/videos/intro.mp4"), "videos/intro");
/// assert_eq!(video_identity("../talks/intro.mp4"), "talks/intro");
/// ```
pub fn video_identity(uri: &str) -> String {
    let path = match uri.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
        None => uri,
    };

    let mut segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !matches!(*segment, "" | "." | ".."))
        .filter(|segment| !segment.ends_with(':'))
        .collect();

    if let Some(name) = segments.pop() {
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        };
        segments.push(stem);
    }

    if segments.is_empty() {
        "video".to_string()
    } else {
        segments.join("/")
    }
}

/// Writes frames and manifests as files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Create a sink rooted at `root`. Directories are created on demand.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn prepare(&self, key: &str) -> Result<PathBuf, ChapterizeError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

impl FrameSink for DirectorySink {
    fn put(
        &self,
        key: &str,
        image: &DynamicImage,
        format: ImageFormat,
    ) -> Result<String, ChapterizeError> {
        let path = self.prepare(key)?;
        image.save_with_format(&path, format)?;
        log::trace!("Wrote frame {}", path.display());
        Ok(path.display().to_string())
    }

    fn put_manifest(
        &self,
        key: &str,
        entries: &[ManifestEntry],
    ) -> Result<Option<String>, ChapterizeError> {
        let path = self.prepare(key)?;
        let writer = BufWriter::new(File::create(&path)?);
        manifest::write_manifest(writer, entries)?;
        log::debug!("Wrote manifest with {} entries to {}", entries.len(), path.display());
        Ok(Some(path.display().to_string()))
    }
}

/// Keeps frames and manifests in memory. References are `memory://<key>`.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Mutex<BTreeMap<String, DynamicImage>>,
    manifests: Mutex<BTreeMap<String, Vec<ManifestEntry>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of all stored frames, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// A copy of the frame stored under `key`.
    pub fn get(&self, key: &str) -> Option<DynamicImage> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// The manifest stored under `key`.
    pub fn manifest(&self, key: &str) -> Option<Vec<ManifestEntry>> {
        self.manifests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no frames are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for MemorySink {
    fn put(
        &self,
        key: &str,
        image: &DynamicImage,
        _format: ImageFormat,
    ) -> Result<String, ChapterizeError> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), image.clone());
        Ok(format!("memory://{key}"))
    }

    fn put_manifest(
        &self,
        key: &str,
        entries: &[ManifestEntry],
    ) -> Result<Option<String>, ChapterizeError> {
        self.manifests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entries.to_vec());
        Ok(Some(format!("memory://{key}")))
    }
}
