//! demo - end-to-end synthetic run with no model and no network
//!
//! Builds a synthetic street image, replays a fixed set of detections,
//! and records alert calls instead of sending them.

use anyhow::{anyhow, Result};
use clap::Parser;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::PathBuf;

use helmet_watch::alert::RecordedCall;
use helmet_watch::config::{validate_confidence, DEFAULT_CONFIDENCE, DEFAULT_LOCATION};
use helmet_watch::pipeline::{Pipeline, RunSettings, Uploaded};
use helmet_watch::report::render_text;
use helmet_watch::{
    Annotator, BoundingBox, Detection, DetectorBackend, RecordingNotifier, ScriptedBackend,
    Upload, ViolationLabels,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Output directory for the processed image.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// Camera/location label.
    #[arg(long, default_value = DEFAULT_LOCATION)]
    location: String,
    /// Confidence threshold.
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f32,
    /// Replay only compliant detections (no alert expected).
    #[arg(long)]
    clean: bool,
    /// Simulate a failing bot endpoint.
    #[arg(long)]
    fail_alerts: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    validate_confidence(args.confidence)?;

    let mut backend = ScriptedBackend::new(script(args.clean));
    let notifier = if args.fail_alerts {
        RecordingNotifier::failing("HTTP 502: simulated outage")
    } else {
        RecordingNotifier::new()
    };
    let annotator = Annotator::new();
    let settings = RunSettings {
        confidence: args.confidence,
        location: args.location.clone(),
        violation_labels: ViolationLabels::default(),
        output_dir: PathBuf::from(&args.out),
    };

    stage("build synthetic upload");
    let uploaded = Uploaded::new(Upload::from_image("demo://street.png", synthetic_street()));

    stage("run detection");
    let mut pipeline = Pipeline::new(&mut backend, &notifier, &annotator, settings);
    let detected = uploaded.run_detection(&mut pipeline)?;
    print!("{}", render_text(&detected));

    stage("recorded alert calls");
    for call in notifier.calls() {
        match call {
            RecordedCall::Message { text } => println!("sendMessage:\n{}\n", text),
            RecordedCall::Photo {
                caption,
                width,
                height,
            } => println!("sendPhoto ({}x{} PNG), caption:\n{}\n", width, height, caption),
        }
    }

    if backend.calls() != 1 {
        return Err(anyhow!("detector ran {} times, expected once", backend.calls()));
    }
    println!("detector backend: {}", backend.name());
    Ok(())
}

fn script(clean: bool) -> Vec<Detection> {
    let mut detections = vec![
        Detection::new(0, "With Helmet", 0.88, BoundingBox::new(40.0, 60.0, 120.0, 200.0)),
        Detection::new(3, "car", 0.55, BoundingBox::new(300.0, 180.0, 460.0, 280.0)),
    ];
    if !clean {
        detections.insert(
            0,
            Detection::new(1, "Without Helmet", 0.81, BoundingBox::new(180.0, 50.0, 260.0, 210.0)),
        );
        detections.push(Detection::new(
            2,
            "Accident",
            0.40,
            BoundingBox::new(280.0, 150.0, 500.0, 300.0),
        ));
    }
    detections
}

fn synthetic_street() -> DynamicImage {
    let image = RgbImage::from_fn(640, 360, |x, y| {
        if y > 240 {
            Rgb([70, 70, 75])
        } else {
            let shade = (140 + (x + y) % 60) as u8;
            Rgb([shade / 2, shade, 200])
        }
    });
    DynamicImage::ImageRgb8(image)
}

fn stage(name: &str) {
    eprintln!("==> {}", name);
}
