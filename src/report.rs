//! Terminal rendering of a finished run.

use std::fmt::Write as _;

use crate::alert::Delivery;
use crate::media::MediaKind;
use crate::pipeline::{AlertOutcome, Detected, ProcessedOutput};

/// Render the human-readable report printed after detection.
pub fn render_text(run: &Detected) -> String {
    let mut out = String::new();
    let video = run.kind == MediaKind::Video;

    let _ = writeln!(out, "Source: {} ({})", run.source.display(), run.kind);
    let _ = writeln!(out, "Location: {}", run.location);
    let _ = writeln!(out, "Time: {}", run.timestamp);
    let _ = writeln!(out, "Confidence threshold: {:.2}", run.confidence);

    match &run.output {
        ProcessedOutput::Image { path } => {
            let _ = writeln!(out, "Processed image: {}", path.display());
        }
        ProcessedOutput::Video {
            output_dir,
            frames_processed,
            ..
        } => {
            let _ = writeln!(out, "Video processed successfully!");
            let _ = writeln!(
                out,
                "Processed video output: {} ({} frames)",
                output_dir.display(),
                frames_processed
            );
        }
    }

    let _ = writeln!(out);
    if video {
        let _ = writeln!(out, "Video Detection Summary");
    } else {
        let _ = writeln!(out, "Detection Summary");
    }
    if run.summary.is_empty() {
        let _ = writeln!(out, "  (no detections)");
    }
    for entry in run.summary.counts() {
        let _ = writeln!(out, "  [{}: {}]", entry.label, entry.count);
    }

    let _ = writeln!(out);
    let scope = if video { " in video (first frame)" } else { " (original)" };
    let _ = writeln!(out, "Detected labels{}: {:?}", scope, run.labels());
    let _ = writeln!(out, "Detected labels (lowercase): {:?}", run.labels_lowercase());
    let _ = writeln!(
        out,
        "Violation classes (lowercase): {:?}",
        run.violation_labels.as_slice()
    );
    let pairs: Vec<String> = run
        .violations
        .iter()
        .map(|v| format!("({}, {:.2})", v.label, v.confidence))
        .collect();
    let _ = writeln!(out, "Detected violations with confidence: [{}]", pairs.join(", "));

    let _ = writeln!(out);
    match &run.alert {
        AlertOutcome::NotTriggered => {
            // An empty first frame gets no alert line for video.
            if video {
                if !run.detections.is_empty() {
                    let _ = writeln!(out, "No violations detected in video, no Telegram alert sent.");
                }
            } else {
                let _ = writeln!(out, "No violations detected, no Telegram alert sent.");
            }
        }
        AlertOutcome::Dispatched { text, photo, .. } => {
            if text.is_sent() {
                let _ = writeln!(out, "Telegram alert message sent successfully!");
            }
            if let Some(Delivery::Sent) = photo {
                let _ = writeln!(out, "Telegram alert photo sent successfully!");
            }
        }
    }
    for warning in &run.warnings {
        let _ = writeln!(out, "WARNING: {}", warning);
    }
    out
}
