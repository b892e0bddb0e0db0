//! helmet_watch - run helmet/accident detection on one upload and alert
//!
//! 1. Accepts an image (jpg/jpeg/png) or mp4 video
//! 2. Runs the configured detector once at the chosen confidence threshold
//! 3. Filters violations and sends the Telegram alert when any are found
//! 4. Prints the detection report and where the processed output was written

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::RngCore;
use std::io::IsTerminal;
use std::path::PathBuf;

use helmet_watch::alert::{DisabledNotifier, Notifier, TelegramNotifier};
use helmet_watch::config::{snap_confidence, AppConfig};
use helmet_watch::media::MediaKind;
use helmet_watch::pipeline::{Pipeline, RunSettings, Uploaded};
use helmet_watch::report::render_text;
use helmet_watch::ui::{Ui, UiMode};
use helmet_watch::{Annotator, BackendRegistry, ScriptedBackend};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image (jpg/jpeg/png) or video (mp4) to process.
    file: PathBuf,
    /// Confidence threshold (0.1-1.0, snapped to 0.05 steps).
    #[arg(long, short = 'c')]
    confidence: Option<f32>,
    /// Camera/location label included in alerts.
    #[arg(long, short = 'l')]
    location: Option<String>,
    /// Treat the upload as this MIME type instead of using the extension.
    #[arg(long)]
    mime: Option<String>,
    /// Output directory (defaults to a fresh temporary directory).
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
    /// Detector backend to use when several are available.
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path (requires the backend-tract feature).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Class names file (JSON or TOML) for the model.
    #[arg(long)]
    class_names: Option<PathBuf>,
    /// Replay detections from a JSON script instead of running a model.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Font used to caption boxes.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Process every Nth video frame.
    #[arg(long)]
    frame_stride: Option<u32>,
    /// Do not contact the messaging bot.
    #[arg(long)]
    no_alert: bool,
    /// Progress output: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(args.ui.as_deref()), std::io::stderr().is_terminal());

    let mut cfg = AppConfig::load()?;
    apply_args(&mut cfg, &args);
    cfg.validate()?;

    let mut registry = build_registry(&cfg, &args)?;
    if let Some(name) = &args.backend {
        registry.set_default(name)?;
    }
    run(&cfg, &args, &ui, registry)
}

fn run(cfg: &AppConfig, args: &Args, ui: &Ui, registry: BackendRegistry) -> Result<()> {
    let uploaded = {
        let _stage = ui.stage("Loading upload");
        match &args.mime {
            Some(mime) => {
                let kind = MediaKind::from_mime(mime)?;
                helmet_watch::Upload::open_as(&args.file, kind).map(Uploaded::new)?
            }
            None => Uploaded::open(&args.file)?,
        }
    };
    let kind = uploaded.kind();

    let backend = registry.backend_for(kind)?;
    let mut detector = backend
        .lock()
        .map_err(|_| anyhow!("detector lock poisoned"))?;
    log::info!("using detector backend '{}'", detector.name());

    let annotator = match &cfg.font_path {
        Some(path) => Annotator::with_font_file(path)?,
        None => Annotator::new(),
    };
    let notifier = build_notifier(cfg, args.no_alert);
    let settings = RunSettings {
        confidence: cfg.confidence,
        location: cfg.location.clone(),
        violation_labels: cfg.violation_labels.clone(),
        output_dir: output_dir(args.out.clone())?,
    };

    let mut pipeline = Pipeline::new(&mut *detector, &*notifier, &annotator, settings);
    let detected = {
        let _stage = ui.stage(match kind {
            MediaKind::Image => "Running detection",
            MediaKind::Video => "Processing video",
        });
        uploaded.run_detection(&mut pipeline)?
    };

    if args.json {
        // The JSON report carries warnings as data; surface them on stderr too.
        for warning in &detected.warnings {
            ui.warn(warning);
        }
        println!("{}", serde_json::to_string_pretty(&detected)?);
    } else {
        print!("{}", render_text(&detected));
    }
    Ok(())
}

fn apply_args(cfg: &mut AppConfig, args: &Args) {
    if let Some(confidence) = args.confidence {
        cfg.confidence = snap_confidence(confidence);
    }
    if let Some(location) = &args.location {
        cfg.location = location.clone();
    }
    if let Some(model) = &args.model {
        cfg.model.path = Some(model.clone());
    }
    if let Some(names) = &args.class_names {
        cfg.model.class_names = Some(names.clone());
    }
    if let Some(font) = &args.font {
        cfg.font_path = Some(font.clone());
    }
    if let Some(stride) = args.frame_stride {
        cfg.video.frame_stride = stride;
    }
}

fn build_registry(cfg: &AppConfig, args: &Args) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();

    if let Some(model) = &cfg.model.path {
        register_model(&mut registry, cfg, model)?;
    }
    if let Some(script) = &args.script {
        registry.register(ScriptedBackend::load(script)?);
    }

    if registry.list().is_empty() {
        return Err(anyhow!(
            "no detector configured: pass --model (backend-tract feature) or --script"
        ));
    }
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_model(registry: &mut BackendRegistry, cfg: &AppConfig, model: &std::path::Path) -> Result<()> {
    use helmet_watch::detect::TractBackend;
    use helmet_watch::ClassNames;

    let class_names = match &cfg.model.class_names {
        Some(path) => ClassNames::load(path)?,
        None => ClassNames::default(),
    };
    let annotator = match &cfg.font_path {
        Some(path) => Annotator::with_font_file(path)?,
        None => Annotator::new(),
    };
    let backend = TractBackend::new(model, cfg.model.input_size, class_names)?
        .with_iou_threshold(cfg.model.iou_threshold)
        .with_annotator(annotator)
        .with_video_settings(cfg.video);
    registry.register_warmed(backend)
}

#[cfg(not(feature = "backend-tract"))]
fn register_model(_registry: &mut BackendRegistry, _cfg: &AppConfig, model: &std::path::Path) -> Result<()> {
    Err(anyhow!(
        "model {} requires the backend-tract feature",
        model.display()
    ))
}

fn build_notifier(cfg: &AppConfig, no_alert: bool) -> Box<dyn Notifier> {
    if no_alert {
        return Box::new(DisabledNotifier::new("--no-alert"));
    }
    match TelegramNotifier::from_settings(&cfg.telegram) {
        Some(notifier) => Box::new(notifier),
        None => {
            log::warn!("telegram bot token or chat id not configured; alerts will not be delivered");
            Box::new(DisabledNotifier::new("bot token or chat id not configured"))
        }
    }
}

/// Use the requested directory, or create a fresh one under the system
/// temp dir. Temporary output is left in place for the user to collect.
fn output_dir(requested: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = requested {
        return Ok(dir);
    }
    let mut suffix = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut suffix);
    let dir = std::env::temp_dir().join(format!("helmet_watch_{}", hex::encode(suffix)));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
