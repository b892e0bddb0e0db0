//! Upload → detection → alert orchestration.
//!
//! Each upload goes through exactly two states, expressed as types:
//! [`Uploaded`] and [`Detected`]. `Uploaded::run_detection` consumes the
//! upload, so detection runs at most once per file and there is nothing
//! after `Detected`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::Serialize;

use crate::alert::{local_timestamp, AlertMessage, Delivery, Notifier};
use crate::annotate::Annotator;
use crate::detect::{ClassNames, Detection, DetectorBackend};
use crate::media::{MediaKind, Upload, UploadContent};
use crate::summary::DetectionSummary;
use crate::violation::{filter_violations, ViolationLabels, ViolationSet};

/// File name of the annotated image in the output directory.
pub const PROCESSED_IMAGE_NAME: &str = "processed.png";

/// Per-run settings taken from the user controls.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub confidence: f32,
    pub location: String,
    pub violation_labels: ViolationLabels,
    pub output_dir: PathBuf,
}

/// Collaborators used by a detection run, fixed at construction time.
pub struct Pipeline<'a> {
    detector: &'a mut dyn DetectorBackend,
    notifier: &'a dyn Notifier,
    annotator: &'a Annotator,
    settings: RunSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        detector: &'a mut dyn DetectorBackend,
        notifier: &'a dyn Notifier,
        annotator: &'a Annotator,
        settings: RunSettings,
    ) -> Self {
        Self {
            detector,
            notifier,
            annotator,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }
}

/// A file accepted for detection.
pub struct Uploaded {
    upload: Upload,
}

impl Uploaded {
    pub fn new(upload: Upload) -> Self {
        Self { upload }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Upload::open(path).map(Self::new)
    }

    pub fn kind(&self) -> MediaKind {
        self.upload.kind()
    }

    pub fn source(&self) -> &Path {
        self.upload.source()
    }

    /// Run the detector once, filter violations, and alert if any were found.
    ///
    /// Alert failures are recorded as warnings on the result; only detector
    /// and output errors are returned as `Err`.
    pub fn run_detection(self, pipeline: &mut Pipeline<'_>) -> Result<Detected> {
        let timestamp = local_timestamp();
        let kind = self.upload.kind();
        let source = self.upload.source().to_path_buf();
        let settings = pipeline.settings.clone();
        std::fs::create_dir_all(&settings.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                settings.output_dir.display()
            )
        })?;

        log::info!(
            "running detection on {} ({}, confidence >= {:.2})",
            source.display(),
            kind,
            settings.confidence
        );

        let (detections, class_names, output, annotated) = match self.upload.into_content() {
            UploadContent::Image(image) => {
                let inference = pipeline
                    .detector
                    .detect_image(&image, settings.confidence)
                    .context("detection failed")?;
                let annotated = pipeline.annotator.annotate(&image, &inference.detections);
                let path = settings.output_dir.join(PROCESSED_IMAGE_NAME);
                annotated
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                (
                    inference.detections,
                    inference.class_names,
                    ProcessedOutput::Image { path },
                    Some(annotated),
                )
            }
            UploadContent::Video(video) => {
                let result = pipeline
                    .detector
                    .detect_video(&video, settings.confidence, &settings.output_dir)
                    .context("video detection failed")?;
                let frames: Vec<PathBuf> = result
                    .frames
                    .iter()
                    .filter_map(|frame| frame.annotated_path.clone())
                    .collect();
                let frames_processed = result.frames_processed();
                let (detections, class_names) = match result.frames.into_iter().next() {
                    Some(first) => (first.inference.detections, first.inference.class_names),
                    None => (Vec::new(), ClassNames::default()),
                };
                (
                    detections,
                    class_names,
                    ProcessedOutput::Video {
                        output_dir: result.output_dir,
                        frames_processed,
                        frames,
                    },
                    None,
                )
            }
        };

        let summary = DetectionSummary::from_detections(&detections);
        let violations = filter_violations(&detections, &settings.violation_labels);
        let mut warnings = Vec::new();

        let alert = if violations.is_empty() {
            log::info!("no violations detected; no alert sent");
            AlertOutcome::NotTriggered
        } else {
            let message =
                AlertMessage::compose(kind, &settings.location, &timestamp, &violations);
            log::info!("{} violation(s): {}", violations.len(), violations.render());
            let text = pipeline.notifier.send_message(message.as_str());
            if let Delivery::Failed { reason } = &text {
                warnings.push(format!("Failed to send Telegram message: {}", reason));
            }
            let photo = annotated.as_ref().map(|image| {
                let photo = pipeline.notifier.send_photo(image, message.as_str());
                if let Delivery::Failed { reason } = &photo {
                    warnings.push(format!("Failed to send Telegram photo: {}", reason));
                }
                photo
            });
            AlertOutcome::Dispatched {
                message: message.into_string(),
                text,
                photo,
            }
        };

        Ok(Detected {
            source,
            kind,
            timestamp,
            confidence: settings.confidence,
            location: settings.location,
            detections,
            class_names,
            summary,
            violation_labels: settings.violation_labels,
            violations,
            alert,
            output,
            warnings,
            annotated,
        })
    }
}

/// Where the processed output was written.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProcessedOutput {
    Image {
        path: PathBuf,
    },
    Video {
        output_dir: PathBuf,
        frames_processed: usize,
        frames: Vec<PathBuf>,
    },
}

/// What happened on the alert path.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// No violations; no alert call was issued.
    NotTriggered,
    Dispatched {
        message: String,
        text: Delivery,
        /// Present for image uploads only.
        photo: Option<Delivery>,
    },
}

/// Terminal state of a run: detection results plus alert diagnostics.
#[derive(Serialize)]
pub struct Detected {
    pub source: PathBuf,
    pub kind: MediaKind,
    pub timestamp: String,
    pub confidence: f32,
    pub location: String,
    pub detections: Vec<Detection>,
    pub class_names: ClassNames,
    pub summary: DetectionSummary,
    pub violation_labels: ViolationLabels,
    pub violations: ViolationSet,
    pub alert: AlertOutcome,
    pub output: ProcessedOutput,
    /// User-visible warnings (failed alert deliveries).
    pub warnings: Vec<String>,
    #[serde(skip)]
    annotated: Option<DynamicImage>,
}

impl Detected {
    /// Annotated image, for image uploads.
    pub fn annotated_image(&self) -> Option<&DynamicImage> {
        self.annotated.as_ref()
    }

    /// Detected labels as reported by the model.
    pub fn labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }

    pub fn labels_lowercase(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.to_lowercase()).collect()
    }

    pub fn alert_triggered(&self) -> bool {
        matches!(self.alert, AlertOutcome::Dispatched { .. })
    }
}
