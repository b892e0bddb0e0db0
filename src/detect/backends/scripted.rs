use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{
    ClassNames, Detection, FrameInference, Inference, VideoInference, MAX_CLASSES,
};
use crate::media::MediaKind;

/// Name of the processed video copy written by [`ScriptedBackend`].
pub const SCRIPTED_VIDEO_NAME: &str = "result_video.mp4";

/// Backend that replays a fixed detection list.
///
/// Every image (and every simulated video frame) yields the scripted
/// detections that meet the requested threshold. Used by the demo binary
/// and by tests that need a detector without a model file.
pub struct ScriptedBackend {
    detections: Vec<Detection>,
    class_names: ClassNames,
    video_frames: u64,
    video: bool,
    calls: u64,
}

impl ScriptedBackend {
    /// Class ids at or above [`MAX_CLASSES`] keep their label on the
    /// detection but get no entry in the class-name table.
    pub fn new(detections: Vec<Detection>) -> Self {
        let labels: BTreeMap<usize, &str> = detections
            .iter()
            .filter(|d| d.class_id < MAX_CLASSES)
            .map(|d| (d.class_id, d.label.as_str()))
            .collect();
        let len = labels.keys().next_back().map_or(0, |max| max + 1);
        let names: Vec<String> = (0..len)
            .map(|idx| match labels.get(&idx) {
                Some(label) => label.to_string(),
                None => format!("class_{}", idx),
            })
            .collect();
        Self {
            detections,
            class_names: ClassNames::new(names),
            video_frames: 1,
            video: true,
            calls: 0,
        }
    }

    /// Load a detection script from JSON: a list of
    /// `{"label": ..., "confidence": ..., "class_id"?: ..., "bbox"?: {...}}`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        let detections: Vec<Detection> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid detection script {}", path.display()))?;
        if let Some(bad) = detections.iter().find(|d| d.class_id >= MAX_CLASSES) {
            return Err(anyhow!(
                "detection script {}: class_id {} out of range (must be below {})",
                path.display(),
                bad.class_id,
                MAX_CLASSES
            ));
        }
        log::info!(
            "loaded {} scripted detections from {}",
            detections.len(),
            path.display()
        );
        Ok(Self::new(detections))
    }

    /// Number of frames reported for each video run.
    pub fn with_video_frames(mut self, frames: u64) -> Self {
        self.video_frames = frames.max(1);
        self
    }

    /// Refuse video input.
    pub fn images_only(mut self) -> Self {
        self.video = false;
        self
    }

    /// Number of detector invocations so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn inference(&self, confidence_threshold: f32) -> Inference {
        Inference {
            detections: self
                .detections
                .iter()
                .filter(|d| d.confidence >= confidence_threshold)
                .cloned()
                .collect(),
            class_names: self.class_names.clone(),
        }
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Image => true,
            MediaKind::Video => self.video,
        }
    }

    fn detect_image(
        &mut self,
        _image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Inference> {
        self.calls += 1;
        Ok(self.inference(confidence_threshold))
    }

    fn detect_video(
        &mut self,
        video: &Path,
        confidence_threshold: f32,
        output_dir: &Path,
    ) -> Result<VideoInference> {
        self.calls += 1;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        let processed = output_dir.join(SCRIPTED_VIDEO_NAME);
        std::fs::copy(video, &processed).with_context(|| {
            format!(
                "failed to write processed video {}",
                processed.display()
            )
        })?;
        let frames = (0..self.video_frames)
            .map(|frame_index| FrameInference {
                frame_index,
                inference: self.inference(confidence_threshold),
                annotated_path: None,
            })
            .collect();
        Ok(VideoInference {
            frames,
            output_dir: output_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn script() -> Vec<Detection> {
        vec![
            Detection::new(2, "Without Helmet", 0.81, BoundingBox::default()),
            Detection::new(0, "car", 0.2, BoundingBox::default()),
        ]
    }

    #[test]
    fn applies_threshold_and_counts_calls() {
        let mut backend = ScriptedBackend::new(script());
        let image = DynamicImage::new_rgb8(8, 8);
        let inference = backend.detect_image(&image, 0.25).unwrap();
        assert_eq!(inference.labels(), vec!["Without Helmet"]);
        let inference = backend.detect_image(&image, 0.1).unwrap();
        assert_eq!(inference.detections.len(), 2);
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn loads_script_with_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(
            &path,
            r#"[{"label": "Accident", "confidence": 0.4},
                {"label": "car", "confidence": 0.9, "class_id": 3,
                 "bbox": {"x1": 1, "y1": 2, "x2": 3, "y2": 4}}]"#,
        )
        .unwrap();
        let mut backend = ScriptedBackend::load(&path).unwrap();
        let inference = backend
            .detect_image(&DynamicImage::new_rgb8(4, 4), 0.25)
            .unwrap();
        assert_eq!(inference.labels(), vec!["Accident", "car"]);
        assert_eq!(inference.detections[1].bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        assert!(ScriptedBackend::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn derives_class_names_from_script() {
        let backend = ScriptedBackend::new(script());
        let names = backend.inference(0.0).class_names;
        assert_eq!(names.name(0), "car");
        assert_eq!(names.name(1), "class_1");
        assert_eq!(names.name(2), "Without Helmet");
    }

    #[test]
    fn rejects_out_of_range_class_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        std::fs::write(
            &path,
            r#"[{"label": "a", "confidence": 0.5, "class_id": 18446744073709551615}]"#,
        )
        .unwrap();
        let err = ScriptedBackend::load(&path).err().unwrap();
        assert!(err.to_string().contains("out of range"), "{}", err);

        let backend = ScriptedBackend::new(vec![
            Detection::new(usize::MAX, "huge", 0.9, BoundingBox::default()),
            Detection::new(1, "Accident", 0.9, BoundingBox::default()),
        ]);
        let inference = backend.inference(0.0);
        assert_eq!(inference.class_names.len(), 2);
        assert_eq!(inference.class_names.name(1), "Accident");
        assert_eq!(inference.labels(), vec!["huge", "Accident"]);
    }

    #[test]
    fn video_run_copies_input_and_reports_frames() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"fake mp4").unwrap();
        let out = dir.path().join("out");

        let mut backend = ScriptedBackend::new(script()).with_video_frames(3);
        let result = backend.detect_video(&input, 0.25, &out).unwrap();
        assert_eq!(result.frames_processed(), 3);
        assert_eq!(result.first_frame().unwrap().labels(), vec!["Without Helmet"]);
        assert_eq!(
            std::fs::read(out.join(SCRIPTED_VIDEO_NAME)).unwrap(),
            b"fake mp4"
        );
    }
}
