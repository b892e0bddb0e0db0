use std::path::Path;

use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::detect::result::{Inference, VideoInference};
use crate::media::MediaKind;

/// Detector backend trait.
///
/// A backend wraps a pretrained model loaded at construction time. The
/// model itself (architecture, weights, inference engine) is opaque to the
/// rest of the crate; callers only see detections and class names.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend can process this kind of upload.
    fn supports(&self, kind: MediaKind) -> bool;

    /// Run detection on a still image, reporting objects scoring at least
    /// `confidence_threshold`.
    fn detect_image(
        &mut self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Inference>;

    /// Run detection over a video file, writing processed output under
    /// `output_dir`.
    fn detect_video(
        &mut self,
        video: &Path,
        confidence_threshold: f32,
        output_dir: &Path,
    ) -> Result<VideoInference> {
        let _ = (confidence_threshold, output_dir);
        Err(anyhow!(
            "backend '{}' does not support video input ({})",
            self.name(),
            video.display()
        ))
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
