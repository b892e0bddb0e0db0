//! Helmet & accident detection with Telegram alerting.
//!
//! An uploaded image or mp4 video is run through a pretrained object
//! detector. Detections whose label belongs to the violation set
//! (by default `without helmet` and `accident`, compared case-insensitively)
//! trigger a best-effort alert: a text message, plus the annotated photo for
//! image uploads.
//!
//! # Module Structure
//!
//! - `media`: upload classification and decoding
//! - `detect`: detector backend trait, registry, scripted and tract backends
//! - `violation`: the pure violation filter
//! - `alert`: alert text, the `Notifier` capability, Telegram client
//! - `pipeline`: the `Uploaded` → `Detected` run
//! - `annotate`, `video`, `summary`, `report`, `ui`: output and presentation
//! - `config`: layered configuration (file, environment, flags)

pub mod alert;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod media;
pub mod pipeline;
pub mod report;
pub mod summary;
pub mod ui;
pub mod video;
pub mod violation;

pub use alert::{AlertMessage, Delivery, Notifier, RecordingNotifier, TelegramNotifier};
pub use annotate::Annotator;
pub use config::{AppConfig, BotToken};
pub use detect::{
    BackendRegistry, BoundingBox, ClassNames, Detection, DetectorBackend, Inference,
    ScriptedBackend,
};
pub use media::{MediaKind, Upload};
pub use pipeline::{AlertOutcome, Detected, Pipeline, ProcessedOutput, RunSettings, Uploaded};
pub use summary::DetectionSummary;
pub use violation::{filter_violations, Violation, ViolationLabels, ViolationSet};
