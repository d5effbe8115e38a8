use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use cashsight_core::capture::infrastructure::ffmpeg_capture_source::FfmpegCaptureSource;
use cashsight_core::capture::infrastructure::threaded_frame_source::ThreadedFrameSource;
use cashsight_core::config::DetectionConfig;
use cashsight_core::detection::domain::label_set::LabelSet;
use cashsight_core::detection::infrastructure::execution_provider::describe_providers;
use cashsight_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use cashsight_core::display::domain::display_sink::{DisplaySink, NullDisplay};
use cashsight_core::display::infrastructure::fan_out_display::FanOutDisplay;
use cashsight_core::display::infrastructure::recording_display::RecordingDisplay;
use cashsight_core::display::infrastructure::snapshot_display::SnapshotDisplay;
#[cfg(feature = "window")]
use cashsight_core::display::infrastructure::window_display::WindowDisplay;
use cashsight_core::pipeline::detection_loop::{DetectionLoop, LoopSettings};
use cashsight_core::pipeline::masked_frame_pipeline::MaskedFramePipeline;
use cashsight_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use cashsight_core::shared::model_resolver;
use cashsight_core::visualization::visualizer::Visualizer;

/// Live currency and object detection from a camera or video source.
///
/// Currency is detected first and masked out of the frame, so the object
/// model never reports a banknote as something else.
#[derive(Parser, Debug)]
#[command(name = "cashsight", version)]
struct Cli {
    /// JSON config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Currency model (ONNX path or http(s) URL).
    #[arg(long)]
    currency_model: Option<String>,

    /// Object model (ONNX path or http(s) URL).
    #[arg(long)]
    object_model: Option<String>,

    /// Class names for the currency model, one per line.
    #[arg(long)]
    currency_labels: Option<PathBuf>,

    /// Class names for the object model, one per line.
    #[arg(long)]
    object_labels: Option<PathBuf>,

    /// Detection confidence threshold (0.0-1.0), shared by both models.
    #[arg(long)]
    confidence: Option<f64>,

    /// Target processing rate in frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Camera index, device path, file or stream URL.
    #[arg(long)]
    source: Option<String>,

    /// Force an ffmpeg input format (e.g. v4l2, avfoundation, dshow).
    #[arg(long)]
    input_format: Option<String>,

    /// Extra ffmpeg demuxer option as key=value (repeatable), e.g.
    /// video_size=640x480.
    #[arg(long = "input-option", value_parser = parse_key_value)]
    input_options: Vec<(String, String)>,

    /// Draw boxes only, without the green tint over masked currency.
    #[arg(long)]
    no_debug_overlay: bool,

    /// Hide the FPS counter.
    #[arg(long)]
    no_fps: bool,

    /// Show annotated frames in a live window (needs the `window` feature).
    #[arg(long)]
    window: bool,

    /// Keep the latest annotated frame in this image file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Record annotated frames to this video file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    println!("Initializing Real-time Currency and Object Detection System...");
    log::info!("Execution providers: {}", describe_providers());

    let currency = build_detector(
        "currency",
        &config.currency_model,
        config.currency_labels.as_deref(),
        config.nms_iou,
    )?;
    let objects = build_detector(
        "object",
        &config.object_model,
        config.object_labels.as_deref(),
        config.nms_iou,
    )?;
    let pipeline = MaskedFramePipeline::new(
        Box::new(currency),
        Box::new(objects),
        Visualizer::default(),
        config.confidence,
        config.debug_overlay,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed))?;

    let capture = config.input_options.iter().fold(
        FfmpegCaptureSource::new(config.source.clone())
            .with_input_format(config.input_format.clone()),
        |capture, (key, value)| capture.with_option(key, value),
    );
    let mut source = ThreadedFrameSource::new(Box::new(capture));

    let mut detection_loop = DetectionLoop::new(
        pipeline,
        build_display(&config),
        Box::new(StdoutPipelineLogger::default()),
        LoopSettings::from(&config),
    )
    .with_stop_flag(stop);

    println!("\nStarting detection on {}... Press Ctrl+C to stop.", config.source);
    let summary = detection_loop.run(&mut source)?;
    println!("\nDetection stopped.");
    log::info!(
        "{} frames processed, {} failed, {} read errors, {} display errors",
        summary.frames_processed,
        summary.frames_failed,
        summary.read_errors,
        summary.display_errors
    );
    Ok(())
}

/// Loads the config file if one was given, applies flag overrides and
/// validates the result.
fn build_config(cli: &Cli) -> Result<DetectionConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                return Err(format!("Config file not found: {}", path.display()).into());
            }
            DetectionConfig::load(path)?
        }
        None => DetectionConfig::default(),
    };
    apply_overrides(cli, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut DetectionConfig) {
    if let Some(model) = &cli.currency_model {
        config.currency_model = model.clone();
    }
    if let Some(model) = &cli.object_model {
        config.object_model = model.clone();
    }
    if cli.currency_labels.is_some() {
        config.currency_labels = cli.currency_labels.clone();
    }
    if cli.object_labels.is_some() {
        config.object_labels = cli.object_labels.clone();
    }
    if let Some(confidence) = cli.confidence {
        config.confidence = confidence;
    }
    if let Some(fps) = cli.fps {
        config.target_fps = fps;
    }
    if let Some(source) = &cli.source {
        config.source = source.clone();
    }
    if cli.input_format.is_some() {
        config.input_format = cli.input_format.clone();
    }
    for (key, value) in &cli.input_options {
        config.input_options.insert(key.clone(), value.clone());
    }
    if cli.no_debug_overlay {
        config.debug_overlay = false;
    }
    if cli.no_fps {
        config.show_fps = false;
    }
    if cli.window {
        config.window = true;
    }
    if cli.snapshot.is_some() {
        config.snapshot = cli.snapshot.clone();
    }
    if cli.record.is_some() {
        config.record = cli.record.clone();
    }
    if cli.max_frames.is_some() {
        config.max_frames = cli.max_frames;
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn build_detector(
    kind: &str,
    reference: &str,
    labels: Option<&Path>,
    nms_iou: f64,
) -> Result<OnnxYoloDetector, Box<dyn std::error::Error>> {
    log::info!("Resolving {kind} model: {reference}");
    let progress_kind = kind.to_string();
    let model_path = model_resolver::resolve(
        reference,
        Some(Box::new(move |downloaded: u64, total: u64| {
            download_progress(&progress_kind, downloaded, total)
        })),
    )?;
    if model_resolver::is_url(reference) {
        eprintln!();
    }

    let labels = labels.map(LabelSet::from_file).transpose()?;
    let detector = OnnxYoloDetector::new(&model_path, labels)?.with_nms_iou(nms_iou);
    println!("Loaded {kind} model from {}", model_path.display());
    Ok(detector)
}

fn build_display(config: &DetectionConfig) -> Box<dyn DisplaySink> {
    let mut sinks: Vec<Box<dyn DisplaySink>> = Vec::new();
    #[cfg(feature = "window")]
    if config.window {
        sinks.push(Box::new(WindowDisplay::default()));
    }
    if let Some(path) = &config.snapshot {
        log::info!("Writing latest frame to {}", path.display());
        sinks.push(Box::new(SnapshotDisplay::new(path)));
    }
    if let Some(path) = &config.record {
        sinks.push(Box::new(RecordingDisplay::new(path, config.target_fps)));
    }
    match sinks.len() {
        0 => Box::new(NullDisplay),
        1 => sinks.remove(0),
        _ => Box::new(FanOutDisplay::new(sinks)),
    }
}

fn download_progress(kind: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {kind} model... {pct}%");
    } else {
        eprint!("\rDownloading {kind} model... {downloaded} bytes");
    }
}
