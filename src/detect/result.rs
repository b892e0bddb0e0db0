use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One object instance reported by a detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub class_id: usize,
    /// Class name as the model reports it (original casing).
    pub label: String,
    /// Score in 0..=1.
    pub confidence: f32,
    #[serde(default)]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: usize, label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Output of a single detector call on one image or frame.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Inference {
    pub detections: Vec<Detection>,
    pub class_names: ClassNames,
}

impl Inference {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Class names in detection order.
    pub fn labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }
}

/// Detections for one sampled video frame.
#[derive(Clone, Debug, Serialize)]
pub struct FrameInference {
    pub frame_index: u64,
    pub inference: Inference,
    /// Annotated frame written to disk, if the backend rendered one.
    pub annotated_path: Option<PathBuf>,
}

/// Output of a detector run over a whole video.
#[derive(Clone, Debug, Serialize)]
pub struct VideoInference {
    pub frames: Vec<FrameInference>,
    /// Directory holding the processed output.
    pub output_dir: PathBuf,
}

impl VideoInference {
    /// Detections of the first processed frame, used for alerting.
    pub fn first_frame(&self) -> Option<&Inference> {
        self.frames.first().map(|frame| &frame.inference)
    }

    pub fn frames_processed(&self) -> usize {
        self.frames.len()
    }
}

/// Upper bound (exclusive) on class indices accepted from files.
pub const MAX_CLASSES: usize = 4096;

/// Class-index-to-name mapping produced alongside detections.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClassNames {
    names: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassNamesFile {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Wrapped { names: Box<ClassNamesFile> },
}

impl ClassNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Name for a class index; unknown indices map to `"class_<id>"`.
    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Load names from a JSON or TOML file.
    ///
    /// Accepts a list (`["with helmet", "without helmet"]`), an index map
    /// (`{"0": "with helmet"}`) or either of those under a `names` key.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class names {}", path.display()))?;
        let parsed: ClassNamesFile = if is_toml(path) {
            toml::from_str(&raw)
                .map_err(|e| anyhow!("invalid class names file {}: {}", path.display(), e))?
        } else {
            serde_json::from_str(&raw)
                .map_err(|e| anyhow!("invalid class names file {}: {}", path.display(), e))?
        };
        Self::from_file(parsed)
    }

    fn from_file(file: ClassNamesFile) -> Result<Self> {
        match file {
            ClassNamesFile::List(names) => Ok(Self::new(names)),
            ClassNamesFile::Wrapped { names } => Self::from_file(*names),
            ClassNamesFile::Map(map) => {
                let mut indexed = Vec::with_capacity(map.len());
                for (key, name) in map {
                    let idx: usize = key
                        .trim()
                        .parse()
                        .map_err(|_| anyhow!("class index '{}' is not an integer", key))?;
                    if idx >= MAX_CLASSES {
                        return Err(anyhow!(
                            "class index {} out of range (must be below {})",
                            idx,
                            MAX_CLASSES
                        ));
                    }
                    indexed.push((idx, name));
                }
                indexed.sort_by_key(|(idx, _)| *idx);
                let len = indexed.last().map(|(idx, _)| idx + 1).unwrap_or(0);
                let mut names: Vec<String> = (0..len).map(|i| format!("class_{}", i)).collect();
                for (idx, name) in indexed {
                    names[idx] = name;
                }
                Ok(Self { names })
            }
        }
    }
}

pub(crate) fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn class_names_fall_back_for_unknown_index() {
        let names = ClassNames::new(["with helmet", "without helmet"]);
        assert_eq!(names.name(1), "without helmet");
        assert_eq!(names.name(7), "class_7");
    }

    #[test]
    fn class_names_load_index_map() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"names": {{"0": "accident", "2": "without helmet"}}}}"#).unwrap();
        let names = ClassNames::load(file.path()).unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.name(0), "accident");
        assert_eq!(names.name(1), "class_1");
        assert_eq!(names.name(2), "without helmet");
    }

    #[test]
    fn class_names_reject_out_of_range_index() {
        for key in ["18446744073709551615", "4000000000", "4096"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, r#"{{"{}": "x"}}"#, key).unwrap();
            let err = ClassNames::load(file.path()).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{}", err);
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"4095": "last"}}"#).unwrap();
        assert_eq!(ClassNames::load(file.path()).unwrap().name(4095), "last");
    }

    #[test]
    fn class_names_load_toml_list() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "names = [\"with helmet\", \"without helmet\"]\n").unwrap();
        let names = ClassNames::load(file.path()).unwrap();
        assert_eq!(names, ClassNames::new(["with helmet", "without helmet"]));
    }
}
