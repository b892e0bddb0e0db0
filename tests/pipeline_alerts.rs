use anyhow::Result;
use image::DynamicImage;
use tempfile::tempdir;

use helmet_watch::alert::RecordedCall;
use helmet_watch::pipeline::{AlertOutcome, Pipeline, ProcessedOutput, RunSettings, Uploaded};
use helmet_watch::report::render_text;
use helmet_watch::{
    Annotator, BoundingBox, Delivery, Detection, MediaKind, RecordingNotifier, ScriptedBackend,
    Upload, ViolationLabels,
};

fn example_detections() -> Vec<Detection> {
    vec![
        Detection::new(1, "Without Helmet", 0.81, BoundingBox::new(2.0, 2.0, 20.0, 20.0)),
        Detection::new(3, "car", 0.55, BoundingBox::new(25.0, 5.0, 60.0, 30.0)),
        Detection::new(2, "Accident", 0.40, BoundingBox::new(10.0, 10.0, 50.0, 40.0)),
    ]
}

fn settings(dir: &std::path::Path) -> RunSettings {
    RunSettings {
        confidence: 0.25,
        location: "Main Street Camera #1".to_string(),
        violation_labels: ViolationLabels::default(),
        output_dir: dir.to_path_buf(),
    }
}

fn image_upload() -> Uploaded {
    Uploaded::new(Upload::from_image("street.png", DynamicImage::new_rgb8(64, 48)))
}

#[test]
fn image_with_violations_sends_message_and_photo() -> Result<()> {
    let dir = tempdir()?;
    let mut backend = ScriptedBackend::new(example_detections());
    let notifier = RecordingNotifier::new();
    let annotator = Annotator::new();
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(dir.path()));

    let detected = image_upload().run_detection(&mut pipeline)?;

    assert_eq!(detected.kind, MediaKind::Image);
    assert_eq!(detected.violations.render(), "without helmet (0.81), accident (0.40)");
    assert!(detected.warnings.is_empty());
    assert!(detected.annotated_image().is_some());

    let calls = notifier.calls();
    assert_eq!(calls.len(), 2);
    let RecordedCall::Message { text } = &calls[0] else {
        panic!("first call should be the text message");
    };
    assert!(text.starts_with("🚨 Helmet Violation Alert!\nLocation: Main Street Camera #1\nTime: "));
    assert!(text.ends_with("\nViolations: without helmet (0.81), accident (0.40)"));
    assert_eq!(
        calls[1],
        RecordedCall::Photo {
            caption: text.clone(),
            width: 64,
            height: 48
        }
    );

    match &detected.alert {
        AlertOutcome::Dispatched { text, photo, .. } => {
            assert_eq!(*text, Delivery::Sent);
            assert_eq!(*photo, Some(Delivery::Sent));
        }
        AlertOutcome::NotTriggered => panic!("alert should have been dispatched"),
    }
    match &detected.output {
        ProcessedOutput::Image { path } => assert!(path.is_file()),
        ProcessedOutput::Video { .. } => panic!("expected image output"),
    }
    assert_eq!(backend.calls(), 1);
    Ok(())
}

#[test]
fn no_violations_means_no_alert_calls() -> Result<()> {
    let dir = tempdir()?;
    let mut backend = ScriptedBackend::new(vec![Detection::new(
        0,
        "With Helmet",
        0.9,
        BoundingBox::default(),
    )]);
    let notifier = RecordingNotifier::new();
    let annotator = Annotator::new();
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(dir.path()));

    let detected = image_upload().run_detection(&mut pipeline)?;

    assert!(detected.violations.is_empty());
    assert!(!detected.alert_triggered());
    assert!(notifier.calls().is_empty());
    assert_eq!(detected.summary.total(), 1);
    assert!(render_text(&detected).contains("No violations detected, no Telegram alert sent."));
    Ok(())
}

#[test]
fn threshold_is_passed_to_the_detector() -> Result<()> {
    let dir = tempdir()?;
    let mut backend = ScriptedBackend::new(example_detections());
    let notifier = RecordingNotifier::new();
    let annotator = Annotator::new();
    let mut run_settings = settings(dir.path());
    run_settings.confidence = 0.5;
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, run_settings);

    let detected = image_upload().run_detection(&mut pipeline)?;

    assert_eq!(detected.labels(), vec!["Without Helmet", "car"]);
    assert_eq!(detected.violations.render(), "without helmet (0.81)");
    assert_eq!(notifier.messages().len(), 1);
    Ok(())
}

#[test]
fn failed_alerts_become_warnings_not_errors() -> Result<()> {
    let dir = tempdir()?;
    let mut backend = ScriptedBackend::new(example_detections());
    let notifier = RecordingNotifier::failing("HTTP 400: Bad Request: chat not found");
    let annotator = Annotator::new();
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(dir.path()));

    let detected = image_upload().run_detection(&mut pipeline)?;

    assert_eq!(
        detected.warnings,
        vec![
            "Failed to send Telegram message: HTTP 400: Bad Request: chat not found".to_string(),
            "Failed to send Telegram photo: HTTP 400: Bad Request: chat not found".to_string(),
        ]
    );
    assert_eq!(notifier.calls().len(), 2);
    assert_eq!(detected.summary.total(), 3);
    let report = render_text(&detected);
    assert!(report.contains("WARNING: Failed to send Telegram message"));
    assert_eq!(report.matches("WARNING: ").count(), detected.warnings.len());
    for warning in &detected.warnings {
        assert_eq!(report.matches(warning.as_str()).count(), 1);
    }
    assert!(!report.contains("sent successfully"));
    Ok(())
}

#[test]
fn video_alerts_with_text_only() -> Result<()> {
    let dir = tempdir()?;
    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, b"not really an mp4")?;
    let out = dir.path().join("out");

    let mut backend = ScriptedBackend::new(example_detections()).with_video_frames(4);
    let notifier = RecordingNotifier::new();
    let annotator = Annotator::new();
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(&out));

    let uploaded = Uploaded::open(&video)?;
    assert_eq!(uploaded.kind(), MediaKind::Video);
    let detected = uploaded.run_detection(&mut pipeline)?;

    assert_eq!(notifier.photo_count(), 0);
    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("🚨 Helmet Violation Alert in video!\n"));
    assert!(messages[0].contains("without helmet (0.81), accident (0.40)"));
    match &detected.alert {
        AlertOutcome::Dispatched { photo, .. } => assert!(photo.is_none()),
        AlertOutcome::NotTriggered => panic!("alert should have been dispatched"),
    }
    match &detected.output {
        ProcessedOutput::Video {
            output_dir,
            frames_processed,
            ..
        } => {
            assert_eq!(output_dir, &out);
            assert_eq!(*frames_processed, 4);
        }
        ProcessedOutput::Image { .. } => panic!("expected video output"),
    }
    assert!(render_text(&detected).contains("Video Detection Summary"));
    Ok(())
}

#[test]
fn video_without_first_frame_detections_has_no_alert_line() -> Result<()> {
    let dir = tempdir()?;
    let video = dir.path().join("empty.mp4");
    std::fs::write(&video, b"not really an mp4")?;

    let mut backend = ScriptedBackend::new(Vec::new());
    let notifier = RecordingNotifier::new();
    let annotator = Annotator::new();
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(&dir.path().join("out")));

    let detected = Uploaded::open(&video)?.run_detection(&mut pipeline)?;
    assert!(!detected.alert_triggered());
    assert!(notifier.calls().is_empty());
    let report = render_text(&detected);
    assert!(!report.contains("No violations detected"));
    assert!(report.contains("Video Detection Summary"));

    let mut backend = ScriptedBackend::new(vec![Detection::new(
        0,
        "With Helmet",
        0.9,
        BoundingBox::default(),
    )]);
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(&dir.path().join("out2")));
    let detected = Uploaded::open(&video)?.run_detection(&mut pipeline)?;
    assert!(render_text(&detected)
        .contains("No violations detected in video, no Telegram alert sent."));
    Ok(())
}

#[test]
fn json_report_serialises_outcome() -> Result<()> {
    let dir = tempdir()?;
    let mut backend = ScriptedBackend::new(example_detections());
    let notifier = RecordingNotifier::new();
    let annotator = Annotator::new();
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings(dir.path()));

    let detected = image_upload().run_detection(&mut pipeline)?;
    let value = serde_json::to_value(&detected)?;

    assert_eq!(value["kind"], "image");
    assert_eq!(value["alert"]["state"], "dispatched");
    assert_eq!(value["alert"]["text"]["status"], "sent");
    assert_eq!(value["violations"][0]["label"], "without helmet");
    assert_eq!(value["summary"].as_array().map(Vec::len), Some(3));
    Ok(())
}
