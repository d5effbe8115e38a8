use std::time::Instant;

use crate::detection::domain::detection::{Detection, FrameResults};
use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::label_set::LabelSet;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::masking::region_mask::RegionMask;
use crate::shared::constants::{DEBUG_MASK_WEIGHT, DEBUG_RENDER_WEIGHT};
use crate::shared::frame::Frame;
use crate::visualization::visualizer::{blend, Visualizer};

use super::pipeline_error::{PipelineError, Stage};
use super::pipeline_logger::{stage, NullPipelineLogger, PipelineLogger};

/// Output of one pipeline pass.
#[derive(Clone, Debug)]
pub struct ProcessedFrame {
    pub annotated: Frame,
    pub results: FrameResults,
}

/// Runs the currency model, blacks out what it found, then runs the object
/// model on what is left.
///
/// Holds no per-frame state: each call builds its own mask and working
/// copy and drops them before returning. The caller's frame is only read.
pub struct MaskedFramePipeline {
    currency: Box<dyn ObjectDetector>,
    objects: Box<dyn ObjectDetector>,
    visualizer: Visualizer,
    confidence: f64,
    debug_overlay: bool,
}

impl MaskedFramePipeline {
    pub fn new(
        currency: Box<dyn ObjectDetector>,
        objects: Box<dyn ObjectDetector>,
        visualizer: Visualizer,
        confidence: f64,
        debug_overlay: bool,
    ) -> Self {
        Self {
            currency,
            objects,
            visualizer,
            confidence,
            debug_overlay,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    pub fn currency_labels(&self) -> &LabelSet {
        self.currency.labels()
    }

    pub fn object_labels(&self) -> &LabelSet {
        self.objects.labels()
    }

    pub fn process_frame(
        &mut self,
        frame: &Frame,
        fps: Option<f64>,
    ) -> Result<ProcessedFrame, PipelineError> {
        self.process_frame_logged(frame, fps, &mut NullPipelineLogger)
    }

    /// Same as [`process_frame`](Self::process_frame), recording stage
    /// timings and detection counts on `logger`.
    pub fn process_frame_logged(
        &mut self,
        frame: &Frame,
        fps: Option<f64>,
        logger: &mut dyn PipelineLogger,
    ) -> Result<ProcessedFrame, PipelineError> {
        if frame.is_empty() {
            return Err(PipelineError::InvalidFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let t = Instant::now();
        let currency = run_stage(self.currency.as_mut(), frame, self.confidence)
            .map_err(|source| PipelineError::ModelInference {
                stage: Stage::Currency,
                source,
            })?;
        logger.timing(stage::CURRENCY, elapsed_ms(t));

        let t = Instant::now();
        let mask = RegionMask::for_frame(frame, &currency);
        let working = mask.suppress(frame);
        logger.timing(stage::MASK, elapsed_ms(t));

        let t = Instant::now();
        let objects = run_stage(self.objects.as_mut(), &working, self.confidence)
            .map_err(|source| PipelineError::ModelInference {
                stage: Stage::Objects,
                source,
            })?;
        drop(working);
        logger.timing(stage::OBJECTS, elapsed_ms(t));

        logger.metric("currency_count", currency.len() as f64);
        logger.metric("object_count", objects.len() as f64);

        let results = FrameResults::new(currency, objects);

        let t = Instant::now();
        let rendered = self.visualizer.render(frame, &results, fps);
        let annotated = if self.debug_overlay {
            let highlight = mask.highlight(self.visualizer.style().mask_color, frame.index());
            blend(&rendered, &highlight, DEBUG_RENDER_WEIGHT, DEBUG_MASK_WEIGHT)
        } else {
            rendered
        };
        logger.timing(stage::RENDER, elapsed_ms(t));

        Ok(ProcessedFrame { annotated, results })
    }
}

/// One adapter call, with the threshold re-applied so no adapter can leak
/// detections below it.
fn run_stage(
    detector: &mut dyn ObjectDetector,
    frame: &Frame,
    confidence: f64,
) -> Result<Vec<Detection>, DetectionError> {
    let mut detections = detector.predict(frame, confidence)?;
    detections.retain(|d| d.confidence() >= confidence);
    Ok(detections)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
