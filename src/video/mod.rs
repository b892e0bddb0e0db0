//! Frame-by-frame video processing.
//!
//! Decoded frames are sampled at a fixed stride, run through an image
//! detector, annotated, and written as PNG files under
//! `<output_dir>/result_video/`. Decoding itself lives behind the
//! `video-ffmpeg` feature.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;

use crate::annotate::Annotator;
use crate::detect::{FrameInference, Inference, VideoInference};

#[cfg(feature = "video-ffmpeg")]
mod ffmpeg;

#[cfg(feature = "video-ffmpeg")]
pub use ffmpeg::FfmpegFrames;

/// Sub-directory of the output directory holding annotated frames.
pub const RESULT_DIR_NAME: &str = "result_video";

/// Video sampling settings.
#[derive(Clone, Copy, Debug)]
pub struct VideoSettings {
    /// Process every Nth decoded frame (1 = every frame).
    pub frame_stride: u32,
    /// Stop after this many processed frames.
    pub max_frames: Option<u64>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            frame_stride: 1,
            max_frames: None,
        }
    }
}

impl VideoSettings {
    fn keeps(&self, frame_index: u64) -> bool {
        frame_index % u64::from(self.frame_stride.max(1)) == 0
    }
}

/// Path of the annotated PNG for a frame.
pub fn frame_path(output_dir: &Path, frame_index: u64) -> PathBuf {
    output_dir
        .join(RESULT_DIR_NAME)
        .join(format!("frame_{:05}.png", frame_index))
}

/// Run `detect` over decoded frames and write annotated output.
///
/// `frames` yields `(frame_index, image)` pairs in decode order.
pub fn process_frames<I, F>(
    frames: I,
    settings: VideoSettings,
    annotator: &Annotator,
    output_dir: &Path,
    mut detect: F,
) -> Result<VideoInference>
where
    I: IntoIterator<Item = Result<(u64, DynamicImage)>>,
    F: FnMut(&DynamicImage) -> Result<Inference>,
{
    let result_dir = output_dir.join(RESULT_DIR_NAME);
    std::fs::create_dir_all(&result_dir)
        .with_context(|| format!("failed to create {}", result_dir.display()))?;

    let mut processed = Vec::new();
    for frame in frames {
        let (frame_index, image) = frame?;
        if !settings.keeps(frame_index) {
            continue;
        }
        if settings
            .max_frames
            .is_some_and(|max| processed.len() as u64 >= max)
        {
            break;
        }

        let inference = detect(&image)?;
        let annotated = annotator.annotate(&image, &inference.detections);
        let path = frame_path(output_dir, frame_index);
        annotated
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::debug!(
            "frame {}: {} detections -> {}",
            frame_index,
            inference.detections.len(),
            path.display()
        );
        processed.push(FrameInference {
            frame_index,
            inference,
            annotated_path: Some(path),
        });
    }

    log::info!(
        "processed {} video frames into {}",
        processed.len(),
        result_dir.display()
    );
    Ok(VideoInference {
        frames: processed,
        output_dir: output_dir.to_path_buf(),
    })
}
