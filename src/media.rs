//! Upload handling.
//!
//! An upload is either a still image (jpg/jpeg/png) or an mp4 video. Images
//! are decoded eagerly so that unreadable files fail before detection runs;
//! videos stay on disk and are handed to the detector by path.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use serde::Serialize;

/// File extensions accepted by the uploader.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "mp4"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a file by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| anyhow!("{} has no file extension", path.display()))?;
        match ext.as_str() {
            "jpg" | "jpeg" | "png" => Ok(MediaKind::Image),
            "mp4" => Ok(MediaKind::Video),
            other => Err(anyhow!(
                "unsupported upload type '.{}'; expected one of {}",
                other,
                ACCEPTED_EXTENSIONS.join(", ")
            )),
        }
    }

    /// Classify a MIME type as reported by an upload form.
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/png" | "image/jpg" => Ok(MediaKind::Image),
            "video/mp4" => Ok(MediaKind::Video),
            other => Err(anyhow!("unsupported upload MIME type '{}'", other)),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Payload of an accepted upload.
pub enum UploadContent {
    Image(DynamicImage),
    Video(PathBuf),
}

/// A validated upload ready for detection.
pub struct Upload {
    source: PathBuf,
    content: UploadContent,
}

impl Upload {
    /// Open a file from disk, deciding its kind from the extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let kind = MediaKind::from_path(path)?;
        Self::open_as(path, kind)
    }

    /// Open a file whose kind is already known (e.g. from a MIME type).
    pub fn open_as(path: impl AsRef<Path>, kind: MediaKind) -> Result<Self> {
        let path = path.as_ref();
        let content = match kind {
            MediaKind::Image => {
                let image = image::open(path)
                    .with_context(|| format!("failed to decode image {}", path.display()))?;
                log::debug!(
                    "decoded {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                UploadContent::Image(image)
            }
            MediaKind::Video => {
                if !path.is_file() {
                    return Err(anyhow!("video {} does not exist", path.display()));
                }
                UploadContent::Video(path.to_path_buf())
            }
        };
        Ok(Self {
            source: path.to_path_buf(),
            content,
        })
    }

    /// Wrap an already decoded image.
    pub fn from_image(name: impl Into<PathBuf>, image: DynamicImage) -> Self {
        Self {
            source: name.into(),
            content: UploadContent::Image(image),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self.content {
            UploadContent::Image(_) => MediaKind::Image,
            UploadContent::Video(_) => MediaKind::Video,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn content(&self) -> &UploadContent {
        &self.content
    }

    pub(crate) fn into_content(self) -> UploadContent {
        self.content
    }
}
