//! YOLOv8 output decoding.
//!
//! Ultralytics detection exports produce a `[1, 4 + classes, boxes]` tensor:
//! rows 0..4 are centre-x, centre-y, width, height in model-input pixels and
//! the remaining rows are per-class scores.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::result::{BoundingBox, ClassNames, Detection};

/// IoU above which overlapping boxes of the same class are suppressed.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Geometry needed to map model-input coordinates back to the source image.
#[derive(Clone, Copy, Debug)]
pub struct InputGeometry {
    pub image_width: u32,
    pub image_height: u32,
    pub model_size: u32,
}

impl InputGeometry {
    fn scale(&self) -> (f32, f32) {
        (
            self.image_width as f32 / self.model_size as f32,
            self.image_height as f32 / self.model_size as f32,
        )
    }
}

/// Decode a flattened `[1, 4 + classes, boxes]` output into detections.
///
/// Candidates scoring below `confidence_threshold` are dropped, then
/// per-class NMS is applied. Results are sorted by confidence, descending.
pub fn decode_yolo_output(
    data: &[f32],
    shape: &[usize],
    confidence_threshold: f32,
    iou_threshold: f32,
    geometry: InputGeometry,
    class_names: &ClassNames,
) -> Result<Vec<Detection>> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(anyhow!("expected [1, 4 + classes, boxes] output, got {:?}", shape));
    }
    let rows = shape[1];
    let num_boxes = shape[2];
    if rows <= 4 {
        return Err(anyhow!("output has no class rows ({} rows)", rows));
    }
    if data.len() != rows * num_boxes {
        return Err(anyhow!(
            "output length {} does not match shape {:?}",
            data.len(),
            shape
        ));
    }
    let at = |row: usize, i: usize| data[row * num_boxes + i];
    let (scale_x, scale_y) = geometry.scale();
    let max_x = geometry.image_width as f32;
    let max_y = geometry.image_height as f32;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let mut best_score = 0.0f32;
        let mut best_class = 0usize;
        for class_idx in 0..rows - 4 {
            let score = at(4 + class_idx, i);
            if score > best_score {
                best_score = score;
                best_class = class_idx;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let bbox = BoundingBox::new(
            ((cx - w / 2.0) * scale_x).clamp(0.0, max_x),
            ((cy - h / 2.0) * scale_y).clamp(0.0, max_y),
            ((cx + w / 2.0) * scale_x).clamp(0.0, max_x),
            ((cy + h / 2.0) * scale_y).clamp(0.0, max_y),
        );
        candidates.push(Detection::new(
            best_class,
            class_names.name(best_class),
            best_score,
            bbox,
        ));
    }

    let mut kept = nms(candidates, iou_threshold);
    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(kept)
}

/// Per-class non-maximum suppression.
pub fn nms(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    let mut class_groups: HashMap<usize, Vec<Detection>> = HashMap::new();
    for detection in detections {
        class_groups
            .entry(detection.class_id)
            .or_default()
            .push(detection);
    }

    let mut all_results = Vec::new();
    for (_, mut group) in class_groups {
        group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut suppressed = vec![false; group.len()];
        for i in 0..group.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..group.len() {
                if !suppressed[j] && group[i].bbox.iou(&group[j].bbox) > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }
        all_results.extend(
            group
                .into_iter()
                .zip(suppressed)
                .filter(|(_, dropped)| !dropped)
                .map(|(detection, _)| detection),
        );
    }
    all_results
}
