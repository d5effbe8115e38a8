use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::capture::capture_session::CaptureSession;
use crate::capture::domain::frame_source::{FrameSource, SourceError};
use crate::config::DetectionConfig;
use crate::display::domain::display_sink::{DisplayError, DisplaySink};
use crate::shared::constants::{DEFAULT_ERROR_BACKOFF_MS, DEFAULT_TARGET_FPS};

use super::detection_report::DetectionReport;
use super::masked_frame_pipeline::MaskedFramePipeline;
use super::pipeline_error::PipelineError;
use super::pipeline_logger::{stage, PipelineLogger};
use super::rate_pacer::{measured_fps, RatePacer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Failures that end the loop. Everything else is handled per iteration.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("frame source failed to start: {0}")]
    SourceInit(#[source] SourceError),
}

/// What happened in one pass through the loop.
#[derive(Debug)]
pub enum IterationOutcome {
    Processed,
    FrameUnavailable,
    SourceRead(SourceError),
    Inference(PipelineError),
    Display(DisplayError),
}

/// How the loop reacts to an [`IterationOutcome`] before the next pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    /// Sleep out the rest of the target period.
    Pace,
    /// Nothing to do yet; wait one period and poll again.
    Poll,
    /// Something failed; pause for the error backoff.
    Backoff,
}

/// Logs `outcome` at the level it deserves and decides the reaction.
/// This is the only place per-iteration errors are absorbed.
pub fn classify(outcome: &IterationOutcome) -> Reaction {
    match outcome {
        IterationOutcome::Processed => Reaction::Pace,
        IterationOutcome::FrameUnavailable => Reaction::Poll,
        IterationOutcome::SourceRead(e) => {
            log::warn!("Frame source read failed: {e}");
            Reaction::Poll
        }
        IterationOutcome::Inference(e) => {
            log::error!("Error processing frame: {e}");
            Reaction::Backoff
        }
        IterationOutcome::Display(e) => {
            log::error!("Error displaying frame: {e}");
            Reaction::Pace
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoopSettings {
    pub target_fps: u32,
    pub error_backoff: Duration,
    pub max_frames: Option<usize>,
    pub show_fps: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            error_backoff: Duration::from_millis(DEFAULT_ERROR_BACKOFF_MS),
            max_frames: None,
            show_fps: true,
        }
    }
}

impl From<&DetectionConfig> for LoopSettings {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            target_fps: config.target_fps,
            error_backoff: config.error_backoff(),
            max_frames: config.max_frames,
            show_fps: config.show_fps,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames_processed: usize,
    pub frames_failed: usize,
    pub empty_polls: usize,
    pub read_errors: usize,
    pub display_errors: usize,
}

type ReportHandler = Box<dyn FnMut(&str) + Send>;

/// Drives frames from a source through the masked-frame pipeline into a
/// display sink at a target rate.
///
/// A failure on one frame never ends the loop. Only a source that cannot
/// start does. The stop flag is checked once per iteration, so a frame in
/// flight always finishes.
pub struct DetectionLoop {
    pipeline: MaskedFramePipeline,
    display: Box<dyn DisplaySink>,
    logger: Box<dyn PipelineLogger>,
    settings: LoopSettings,
    stop: Arc<AtomicBool>,
    on_report: ReportHandler,
    state: LoopState,
}

impl DetectionLoop {
    pub fn new(
        pipeline: MaskedFramePipeline,
        display: Box<dyn DisplaySink>,
        logger: Box<dyn PipelineLogger>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            pipeline,
            display,
            logger,
            settings,
            stop: Arc::new(AtomicBool::new(false)),
            on_report: Box::new(|report| println!("\n{report}")),
            state: LoopState::Stopped,
        }
    }

    /// Shares an externally owned stop flag, e.g. one set from a Ctrl-C
    /// handler.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Replaces the default stdout printer for per-frame detection reports.
    pub fn with_report_handler(mut self, handler: ReportHandler) -> Self {
        self.on_report = handler;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<LoopSummary, LoopError> {
        self.transition(LoopState::Starting);

        let mut session = match CaptureSession::open(source) {
            Ok(session) => session,
            Err(e) => {
                log::error!("Failed to start frame source: {e}");
                self.transition(LoopState::Stopped);
                return Err(LoopError::SourceInit(e));
            }
        };
        log::info!("Frame source started");
        self.transition(LoopState::Running);

        let pacer = RatePacer::new(self.settings.target_fps.max(1));
        let mut summary = LoopSummary::default();
        let mut last_processed: Option<Instant> = None;

        while !self.stop.load(Ordering::Relaxed) {
            if let Some(max) = self.settings.max_frames {
                if summary.frames_processed >= max {
                    log::info!("Reached frame limit ({max})");
                    break;
                }
            }

            let started = Instant::now();
            let fps = last_processed.and_then(|t| measured_fps(started - t));
            let outcome = self.iterate(&mut session, fps);

            match &outcome {
                IterationOutcome::Processed => {
                    summary.frames_processed += 1;
                    last_processed = Some(started);
                    self.logger.progress(summary.frames_processed);
                    if let Some(fps) = fps {
                        log::debug!("Frame {}: {}", summary.frames_processed, fps_line(fps));
                        self.logger.metric("fps", fps);
                    }
                }
                IterationOutcome::FrameUnavailable => {
                    if session.is_exhausted() {
                        log::info!("Frame source reached end of stream");
                        break;
                    }
                    summary.empty_polls += 1;
                }
                IterationOutcome::SourceRead(_) => summary.read_errors += 1,
                IterationOutcome::Inference(_) => summary.frames_failed += 1,
                IterationOutcome::Display(_) => {
                    summary.frames_processed += 1;
                    summary.display_errors += 1;
                    last_processed = Some(started);
                }
            }

            match classify(&outcome) {
                Reaction::Pace => pacer.pace(started),
                Reaction::Poll => std::thread::sleep(pacer.period()),
                Reaction::Backoff => std::thread::sleep(self.settings.error_backoff),
            }
        }

        if self.stop.load(Ordering::Relaxed) {
            log::info!("Stopping detection...");
        }
        self.transition(LoopState::Stopping);

        match session.close() {
            Ok(()) => log::info!("Frame source stopped"),
            Err(e) => log::error!("Error stopping frame source: {e}"),
        }
        if let Err(e) = self.display.close() {
            log::error!("Error closing display: {e}");
        }
        self.logger.summary();

        self.transition(LoopState::Stopped);
        Ok(summary)
    }

    fn iterate(&mut self, session: &mut CaptureSession<'_>, fps: Option<f64>) -> IterationOutcome {
        let frame = match session.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return IterationOutcome::FrameUnavailable,
            Err(e) => return IterationOutcome::SourceRead(e),
        };

        let fps = if self.settings.show_fps { fps } else { None };
        let processed = match self
            .pipeline
            .process_frame_logged(&frame, fps, self.logger.as_mut())
        {
            Ok(processed) => processed,
            Err(e) => return IterationOutcome::Inference(e),
        };

        let t = Instant::now();
        if let Err(e) = self.display.show(&processed.annotated) {
            return IterationOutcome::Display(e);
        }
        self.logger
            .timing(stage::DISPLAY, t.elapsed().as_secs_f64() * 1000.0);

        if let Some(report) = DetectionReport::format(&processed.results) {
            (self.on_report)(&report);
        }
        IterationOutcome::Processed
    }

    fn transition(&mut self, next: LoopState) {
        log::debug!("Detection loop: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Per-frame rate line, formatted like the on-frame counter.
fn fps_line(fps: f64) -> String {
    format!("FPS: {fps:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{BoundingBox, Detection};
    use crate::detection::domain::detection_error::DetectionError;
    use crate::detection::domain::label_set::LabelSet;
    use crate::detection::domain::object_detector::ObjectDetector;
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StdoutPipelineLogger};
    use crate::shared::frame::Frame;
    use crate::visualization::visualizer::Visualizer;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // --- Stubs ---

    type Script = VecDeque<Result<Option<Frame>, SourceError>>;

    struct ScriptedSource {
        script: Script,
        fail_start: bool,
        starts: Arc<Mutex<usize>>,
        stops: Arc<Mutex<usize>>,
        /// Raised after this many frames have been handed out.
        interrupt_after: Option<(usize, Arc<AtomicBool>)>,
        delivered: usize,
        endless: bool,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Frame>, SourceError>>) -> Self {
            Self {
                script: script.into(),
                fail_start: false,
                starts: Arc::new(Mutex::new(0)),
                stops: Arc::new(Mutex::new(0)),
                interrupt_after: None,
                delivered: 0,
                endless: false,
            }
        }

        fn frames(count: usize) -> Self {
            Self::new((0..count).map(|i| Ok(Some(frame(i)))).collect())
        }
    }

    impl FrameSource for ScriptedSource {
        fn start(&mut self) -> Result<(), SourceError> {
            if self.fail_start {
                return Err(SourceError::Init("camera unplugged".into()));
            }
            *self.starts.lock().unwrap() += 1;
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            let next = match self.script.pop_front() {
                Some(next) => next,
                None if self.endless => Ok(Some(frame(self.delivered))),
                None => Ok(None),
            };
            if let Ok(Some(_)) = next {
                self.delivered += 1;
                if let Some((after, flag)) = &self.interrupt_after {
                    if self.delivered >= *after {
                        flag.store(true, Ordering::Relaxed);
                    }
                }
            }
            next
        }

        fn stop(&mut self) -> Result<(), SourceError> {
            *self.stops.lock().unwrap() += 1;
            Ok(())
        }

        fn is_running(&self) -> bool {
            *self.starts.lock().unwrap() > *self.stops.lock().unwrap()
        }

        fn is_exhausted(&self) -> bool {
            !self.endless && self.script.is_empty()
        }
    }

    /// Pops one scripted answer per call; repeats the last answer after.
    struct ScriptedDetector {
        answers: VecDeque<Result<Vec<Detection>, String>>,
        fallback: Result<Vec<Detection>, String>,
        calls: Arc<Mutex<usize>>,
        labels: LabelSet,
    }

    impl ScriptedDetector {
        fn new(answers: Vec<Result<Vec<Detection>, String>>) -> Self {
            Self {
                answers: answers.into(),
                fallback: Ok(vec![]),
                calls: Arc::new(Mutex::new(0)),
                labels: LabelSet::numbered(1),
            }
        }

        fn empty() -> Self {
            Self::new(vec![])
        }
    }

    impl ObjectDetector for ScriptedDetector {
        fn predict(
            &mut self,
            _frame: &Frame,
            _confidence: f64,
        ) -> Result<Vec<Detection>, DetectionError> {
            *self.calls.lock().unwrap() += 1;
            let answer = self
                .answers
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            answer.map_err(DetectionError::Inference)
        }

        fn labels(&self) -> &LabelSet {
            &self.labels
        }
    }

    struct CollectingDisplay {
        shown: Arc<Mutex<Vec<usize>>>,
        closed: Arc<Mutex<usize>>,
        fail_on: Option<usize>,
    }

    impl CollectingDisplay {
        fn new() -> Self {
            Self {
                shown: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(0)),
                fail_on: None,
            }
        }
    }

    impl DisplaySink for CollectingDisplay {
        fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
            if self.fail_on == Some(frame.index()) {
                return Err(DisplayError::Encode("window closed".into()));
            }
            self.shown.lock().unwrap().push(frame.index());
            Ok(())
        }

        fn close(&mut self) -> Result<(), DisplayError> {
            *self.closed.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::filled(32, 24, [90, 90, 90], index)
    }

    fn det(name: &str, conf: f64) -> Detection {
        Detection::new(BoundingBox::new(2, 2, 12, 12), conf, name)
    }

    fn fast_settings() -> LoopSettings {
        LoopSettings {
            target_fps: 1000,
            error_backoff: Duration::from_millis(1),
            max_frames: None,
            show_fps: true,
        }
    }

    fn build(
        currency: ScriptedDetector,
        objects: ScriptedDetector,
        display: CollectingDisplay,
        settings: LoopSettings,
    ) -> (DetectionLoop, Arc<Mutex<Vec<String>>>) {
        let pipeline = MaskedFramePipeline::new(
            Box::new(currency),
            Box::new(objects),
            Visualizer::default(),
            0.25,
            false,
        );
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let detection_loop = DetectionLoop::new(
            pipeline,
            Box::new(display),
            Box::new(NullPipelineLogger),
            settings,
        )
        .with_report_handler(Box::new(move |r| sink.lock().unwrap().push(r.to_string())));
        (detection_loop, reports)
    }

    // --- classify ---

    #[test]
    fn test_classify_reactions() {
        assert_eq!(classify(&IterationOutcome::Processed), Reaction::Pace);
        assert_eq!(classify(&IterationOutcome::FrameUnavailable), Reaction::Poll);
        assert_eq!(
            classify(&IterationOutcome::SourceRead(SourceError::Read("x".into()))),
            Reaction::Poll
        );
        assert_eq!(
            classify(&IterationOutcome::Inference(PipelineError::InvalidFrame {
                width: 0,
                height: 0
            })),
            Reaction::Backoff
        );
        assert_eq!(
            classify(&IterationOutcome::Display(DisplayError::Encode("x".into()))),
            Reaction::Pace
        );
    }

    // --- Scenarios ---

    #[test]
    fn test_empty_polls_do_no_processing() {
        let source_script = vec![Ok(None), Ok(None), Ok(None), Ok(Some(frame(0)))];
        let mut source = ScriptedSource::new(source_script);
        let currency = ScriptedDetector::empty();
        let currency_calls = currency.calls.clone();
        let display = CollectingDisplay::new();
        let shown = display.shown.clone();
        let (mut detection_loop, _) =
            build(currency, ScriptedDetector::empty(), display, fast_settings());

        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary.empty_polls, 3);
        assert_eq!(summary.frames_processed, 1);
        assert_eq!(*currency_calls.lock().unwrap(), 1);
        assert_eq!(*shown.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_inference_failure_skips_display_and_continues() {
        let mut source = ScriptedSource::frames(3);
        let objects = ScriptedDetector::new(vec![
            Ok(vec![]),
            Err("onnx session error".into()),
            Ok(vec![]),
        ]);
        let display = CollectingDisplay::new();
        let shown = display.shown.clone();
        let settings = LoopSettings {
            error_backoff: Duration::from_millis(40),
            ..fast_settings()
        };
        let (mut detection_loop, _) =
            build(ScriptedDetector::empty(), objects, display, settings);

        let started = Instant::now();
        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_failed, 1);
        assert_eq!(*shown.lock().unwrap(), vec![0, 2]);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_interrupt_stops_source_exactly_once() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut source = ScriptedSource::new(vec![]);
        source.endless = true;
        source.interrupt_after = Some((3, stop.clone()));
        let stops = source.stops.clone();
        let display = CollectingDisplay::new();
        let closed = display.closed.clone();
        let (detection_loop, _) = build(
            ScriptedDetector::empty(),
            ScriptedDetector::empty(),
            display,
            fast_settings(),
        );
        let mut detection_loop = detection_loop.with_stop_flag(stop);

        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary.frames_processed, 3);
        assert_eq!(*stops.lock().unwrap(), 1);
        assert_eq!(*closed.lock().unwrap(), 1);
        assert_eq!(detection_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn test_interrupt_before_first_frame_still_stops_source() {
        let mut source = ScriptedSource::frames(5);
        let stops = source.stops.clone();
        let (mut detection_loop, _) = build(
            ScriptedDetector::empty(),
            ScriptedDetector::empty(),
            CollectingDisplay::new(),
            fast_settings(),
        );
        detection_loop.stop_flag().store(true, Ordering::Relaxed);

        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary, LoopSummary::default());
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[test]
    fn test_source_init_failure_is_fatal() {
        let mut source = ScriptedSource::frames(2);
        source.fail_start = true;
        let stops = source.stops.clone();
        let currency = ScriptedDetector::empty();
        let calls = currency.calls.clone();
        let (mut detection_loop, _) = build(
            currency,
            ScriptedDetector::empty(),
            CollectingDisplay::new(),
            fast_settings(),
        );

        let err = detection_loop.run(&mut source).unwrap_err();

        assert!(matches!(err, LoopError::SourceInit(SourceError::Init(_))));
        assert_eq!(detection_loop.state(), LoopState::Stopped);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[test]
    fn test_read_errors_are_logged_and_skipped() {
        let mut source = ScriptedSource::new(vec![
            Err(SourceError::Read("usb hiccup".into())),
            Ok(Some(frame(0))),
        ]);
        let (mut detection_loop, _) = build(
            ScriptedDetector::empty(),
            ScriptedDetector::empty(),
            CollectingDisplay::new(),
            fast_settings(),
        );

        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary.read_errors, 1);
        assert_eq!(summary.frames_processed, 1);
    }

    #[test]
    fn test_display_failure_does_not_stop_loop() {
        let mut source = ScriptedSource::frames(3);
        let mut display = CollectingDisplay::new();
        display.fail_on = Some(1);
        let shown = display.shown.clone();
        let (mut detection_loop, _) = build(
            ScriptedDetector::empty(),
            ScriptedDetector::empty(),
            display,
            fast_settings(),
        );

        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary.display_errors, 1);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(*shown.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_reports_printed_only_for_frames_with_detections() {
        let mut source = ScriptedSource::frames(3);
        let currency = ScriptedDetector::new(vec![
            Ok(vec![det("banknote", 0.9)]),
            Ok(vec![]),
            Ok(vec![]),
        ]);
        let objects = ScriptedDetector::new(vec![
            Ok(vec![det("cup", 0.8)]),
            Ok(vec![]),
            Ok(vec![det("cup", 0.1)]),
        ]);
        let (mut detection_loop, reports) =
            build(currency, objects, CollectingDisplay::new(), fast_settings());

        detection_loop.run(&mut source).unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("Currency:\n  - banknote (Confidence: 0.90)"));
        assert!(reports[0].contains("Objects:\n  - cup (Confidence: 0.80)"));
    }

    #[test]
    fn test_max_frames_limit() {
        let mut source = ScriptedSource::new(vec![]);
        source.endless = true;
        let stops = source.stops.clone();
        let settings = LoopSettings {
            max_frames: Some(4),
            ..fast_settings()
        };
        let (mut detection_loop, _) = build(
            ScriptedDetector::empty(),
            ScriptedDetector::empty(),
            CollectingDisplay::new(),
            settings,
        );

        let summary = detection_loop.run(&mut source).unwrap();

        assert_eq!(summary.frames_processed, 4);
        assert_eq!(*stops.lock().unwrap(), 1);
    }

    #[test]
    fn test_pacing_holds_target_rate() {
        let mut source = ScriptedSource::frames(3);
        let settings = LoopSettings {
            target_fps: 20,
            ..fast_settings()
        };
        let (mut detection_loop, _) = build(
            ScriptedDetector::empty(),
            ScriptedDetector::empty(),
            CollectingDisplay::new(),
            settings,
        );

        let started = Instant::now();
        detection_loop.run(&mut source).unwrap();

        // Three paced frames at 50ms each
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_stage_timings_recorded_on_logger() {
        let mut source = ScriptedSource::frames(2);
        let pipeline = MaskedFramePipeline::new(
            Box::new(ScriptedDetector::empty()),
            Box::new(ScriptedDetector::empty()),
            Visualizer::default(),
            0.25,
            true,
        );
        let logger = Arc::new(Mutex::new(StdoutPipelineLogger::new(1)));

        struct SharedLogger(Arc<Mutex<StdoutPipelineLogger>>);
        impl PipelineLogger for SharedLogger {
            fn progress(&mut self, frames: usize) {
                self.0.lock().unwrap().progress(frames);
            }
            fn timing(&mut self, stage: &str, duration_ms: f64) {
                self.0.lock().unwrap().timing(stage, duration_ms);
            }
            fn metric(&mut self, name: &str, value: f64) {
                self.0.lock().unwrap().metric(name, value);
            }
            fn info(&mut self, message: &str) {
                self.0.lock().unwrap().info(message);
            }
        }

        let mut detection_loop = DetectionLoop::new(
            pipeline,
            Box::new(CollectingDisplay::new()),
            Box::new(SharedLogger(logger.clone())),
            fast_settings(),
        );
        detection_loop.run(&mut source).unwrap();

        let logger = logger.lock().unwrap();
        assert_eq!(logger.timings_for(stage::DISPLAY).map(<[f64]>::len), Some(2));
        assert_eq!(logger.timings_for(stage::CURRENCY).map(<[f64]>::len), Some(2));
        // fps is only known from the second frame on
        assert_eq!(logger.metrics_for("fps").map(<[f64]>::len), Some(1));
    }

    #[test]
    fn test_fps_reported_for_every_frame_after_the_first() {
        let mut source = ScriptedSource::frames(4);
        let pipeline = MaskedFramePipeline::new(
            Box::new(ScriptedDetector::empty()),
            Box::new(ScriptedDetector::empty()),
            Visualizer::default(),
            0.25,
            false,
        );
        let logger = Arc::new(Mutex::new(StdoutPipelineLogger::new(1)));

        struct FpsLogger(Arc<Mutex<StdoutPipelineLogger>>);
        impl PipelineLogger for FpsLogger {
            fn progress(&mut self, _frames: usize) {}
            fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
            fn metric(&mut self, name: &str, value: f64) {
                self.0.lock().unwrap().metric(name, value);
            }
            fn info(&mut self, _message: &str) {}
        }

        let mut detection_loop = DetectionLoop::new(
            pipeline,
            Box::new(CollectingDisplay::new()),
            Box::new(FpsLogger(logger.clone())),
            fast_settings(),
        );
        detection_loop.run(&mut source).unwrap();

        let logger = logger.lock().unwrap();
        let fps = logger.metrics_for("fps").unwrap();
        assert_eq!(fps.len(), 3);
        assert!(fps.iter().all(|f| f.is_finite() && *f > 0.0));
    }

    #[test]
    fn test_fps_line_format() {
        assert_eq!(fps_line(9.96), "FPS: 10.0");
        assert_eq!(fps_line(12.34), "FPS: 12.3");
    }

    #[test]
    fn test_settings_from_config() {
        let config = DetectionConfig {
            target_fps: 15,
            error_backoff_ms: 250,
            max_frames: Some(9),
            show_fps: false,
            ..Default::default()
        };
        let settings = LoopSettings::from(&config);
        assert_eq!(settings.target_fps, 15);
        assert_eq!(settings.error_backoff, Duration::from_millis(250));
        assert_eq!(settings.max_frames, Some(9));
        assert!(!settings.show_fps);
    }
}
