/// YOLO object detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, output decoding and
/// class-aware NMS for Ultralytics-exported detection models.
use std::path::Path;

use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::label_set::LabelSet;
use crate::detection::domain::object_detector::{validate_request, ObjectDetector};
use crate::shared::constants::DEFAULT_NMS_IOU;
use crate::shared::frame::Frame;

use super::execution_provider::{describe_providers, preferred_execution_providers};
use super::math::{nms, Candidate};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Gray used for letterbox padding (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Box coordinates occupy the first four features of every candidate row.
const BOX_FEATURES: usize = 4;

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    labels: LabelSet,
    input_size: u32,
    nms_iou: f64,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// Labels come from `labels` when given, otherwise from the model's
    /// `names` metadata, otherwise `class_<i>` placeholders sized from the
    /// output shape. The input resolution is read from the model's NCHW
    /// input shape, falling back to 640 when it is dynamic.
    pub fn new(model_path: &Path, labels: Option<LabelSet>) -> Result<Self, DetectionError> {
        let session = ort::session::Session::builder()
            .map_err(|e| load_error(model_path, e))?
            .with_execution_providers(preferred_execution_providers())
            .map_err(|e| load_error(model_path, e))?
            .commit_from_file(model_path)
            .map_err(|e| load_error(model_path, e))?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // [N, C, H, W]; square inputs, so H is enough
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let labels = match labels {
            Some(labels) => labels,
            None => metadata_labels(&session)
                .unwrap_or_else(|| LabelSet::numbered(output_class_count(&session))),
        };

        log::info!(
            "Loaded {} ({} classes, input {input_size}px, providers: {})",
            model_path.display(),
            labels.len(),
            describe_providers()
        );

        Ok(Self {
            session,
            labels,
            input_size,
            nms_iou: DEFAULT_NMS_IOU,
        })
    }

    pub fn with_nms_iou(mut self, nms_iou: f64) -> Self {
        self.nms_iou = nms_iou;
        self
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn predict(
        &mut self,
        frame: &Frame,
        confidence: f64,
    ) -> Result<Vec<Detection>, DetectionError> {
        validate_request(frame, confidence)?;

        // 1. Preprocess: letterbox + normalize → NCHW float32
        let (input_tensor, transform) = letterbox(frame, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(DetectionError::Inference(
                "YOLO model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| DetectionError::Inference("output tensor is not contiguous".into()))?;

        // 3. Decode + NMS
        let candidates = decode_output(data, &shape, confidence, &transform)?;
        let kept = nms(candidates, self.nms_iou);

        // 4. Canonical integer boxes in frame space
        Ok(kept
            .into_iter()
            .map(|c| to_detection(&c, &self.labels, frame.width(), frame.height()))
            .collect())
    }

    fn labels(&self) -> &LabelSet {
        &self.labels
    }
}

fn load_error(path: &Path, e: impl std::fmt::Display) -> DetectionError {
    DetectionError::ModelLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn inference_error(e: impl std::fmt::Display) -> DetectionError {
    DetectionError::Inference(e.to_string())
}

fn metadata_labels(session: &ort::session::Session) -> Option<LabelSet> {
    let metadata = session.metadata().ok()?;
    let raw = metadata.custom("names").ok().flatten()?;
    match LabelSet::from_ultralytics_metadata(&raw) {
        Ok(labels) => Some(labels),
        Err(e) => {
            log::warn!("Ignoring unreadable model label metadata: {e}");
            None
        }
    }
}

/// Class count implied by a static `[1, 4 + classes, N]` output shape.
fn output_class_count(session: &ort::session::Session) -> usize {
    session
        .outputs()
        .first()
        .and_then(|output| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = output.dtype() {
                if shape.len() == 3 && shape[1] > BOX_FEATURES as i64 && shape[2] > 0 {
                    let features = shape[1].min(shape[2]) as usize;
                    return Some(features.saturating_sub(BOX_FEATURES));
                }
            }
            None
        })
        .unwrap_or(0)
}

fn to_detection(candidate: &Candidate, labels: &LabelSet, width: u32, height: u32) -> Detection {
    let [x1, y1, x2, y2] = candidate.bbox;
    Detection::new(
        BoundingBox::from_corners_clamped(x1, y1, x2, y2, width, height),
        candidate.confidence.clamp(0.0, 1.0),
        labels.name(candidate.class_index),
    )
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Maps letterboxed model coordinates back to the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LetterboxTransform {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxTransform {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, LetterboxTransform) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, LetterboxTransform { scale, pad_x, pad_y })
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

/// Decodes a `[1, 4 + classes, N]` (Ultralytics default) or
/// `[1, N, 4 + classes]` output into frame-space candidates.
///
/// Each candidate row is `[cx, cy, w, h, score_0, .., score_k]`; the class
/// is the arg-max score, and rows below `confidence` are dropped.
fn decode_output(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    transform: &LetterboxTransform,
) -> Result<Vec<Candidate>, DetectionError> {
    if shape.len() != 3 {
        return Err(DetectionError::Inference(format!(
            "unexpected YOLO output shape: {shape:?}"
        )));
    }
    // Fewer features than candidates means the features-major layout
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= BOX_FEATURES {
        return Err(DetectionError::Inference(format!(
            "YOLO output has no class scores: {shape:?}"
        )));
    }
    if data.len() < num_dets * num_feats {
        return Err(DetectionError::Inference(format!(
            "YOLO output holds {} values, shape {shape:?} needs {}",
            data.len(),
            num_dets * num_feats
        )));
    }

    let value = |det: usize, feat: usize| -> f32 {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut candidates = Vec::new();
    for i in 0..num_dets {
        let (class_index, score) = (BOX_FEATURES..num_feats)
            .map(|f| (f - BOX_FEATURES, value(i, f)))
            .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        let score = score as f64;
        if score < confidence {
            continue;
        }

        let cx = value(i, 0) as f64;
        let cy = value(i, 1) as f64;
        let w = value(i, 2) as f64;
        let h = value(i, 3) as f64;

        let (x1, y1) = transform.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = transform.to_frame(cx + w / 2.0, cy + h / 2.0);

        candidates.push(Candidate {
            bbox: [x1, y1, x2, y2],
            confidence: score,
            class_index,
        });
    }
    Ok(candidates)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDENTITY: LetterboxTransform = LetterboxTransform {
        scale: 1.0,
        pad_x: 0,
        pad_y: 0,
    };

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160
        let frame = Frame::filled(200, 100, [128, 128, 128], 0);
        let (tensor, t) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(t.scale, 3.2, epsilon = 0.01);
        assert_eq!(t.pad_x, 0);
        assert_eq!(t.pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::filled(100, 50, [255, 255, 255], 0);
        let (tensor, t) = letterbox(&frame, 640);

        let y = t.pad_y as usize + 1;
        let x = t.pad_x as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, x]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], PAD_VALUE, epsilon = 0.01);
    }

    #[test]
    fn test_transform_maps_back_to_frame() {
        let t = LetterboxTransform {
            scale: 2.0,
            pad_x: 0,
            pad_y: 40,
        };
        let (x, y) = t.to_frame(100.0, 140.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 50.0);
    }

    /// Builds a zeroed output tensor and lets the caller fill candidate rows.
    fn output(
        num_feats: usize,
        num_dets: usize,
        features_major: bool,
        rows: &[(usize, Vec<f32>)],
    ) -> Vec<f32> {
        let mut data = vec![0.0f32; num_feats * num_dets];
        for (det, row) in rows {
            for (feat, v) in row.iter().enumerate() {
                let idx = if features_major {
                    feat * num_dets + det
                } else {
                    det * num_feats + feat
                };
                data[idx] = *v;
            }
        }
        data
    }

    #[test]
    fn test_decode_features_major_layout() {
        // [1, 6, 8]: 4 box features + 2 classes, 8 candidates
        let data = output(
            6,
            8,
            true,
            &[
                (0, vec![50.0, 50.0, 20.0, 10.0, 0.9, 0.2]),
                (3, vec![10.0, 10.0, 4.0, 4.0, 0.1, 0.6]),
            ],
        );
        let candidates = decode_output(&data, &[1, 6, 8], 0.25, &IDENTITY).unwrap();
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].class_index, 0);
        assert_relative_eq!(candidates[0].confidence, 0.9, epsilon = 1e-6);
        assert_eq!(candidates[0].bbox, [40.0, 45.0, 60.0, 55.0]);

        assert_eq!(candidates[1].class_index, 1);
        assert_relative_eq!(candidates[1].confidence, 0.6, epsilon = 1e-6);
        assert_eq!(candidates[1].bbox, [8.0, 8.0, 12.0, 12.0]);
    }

    #[test]
    fn test_decode_candidates_major_layout() {
        // [1, 8, 7]: 8 candidates, 4 box features + 3 classes
        let data = output(
            7,
            8,
            false,
            &[
                (0, vec![10.0, 10.0, 4.0, 4.0, 0.1, 0.3, 0.7]),
                (1, vec![30.0, 30.0, 4.0, 4.0, 0.1, 0.1, 0.2]),
            ],
        );
        let candidates = decode_output(&data, &[1, 8, 7], 0.5, &IDENTITY).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_index, 2);
        assert_eq!(candidates[0].bbox, [8.0, 8.0, 12.0, 12.0]);
    }

    #[test]
    fn test_decode_keeps_score_equal_to_threshold() {
        let data = output(5, 6, true, &[(2, vec![10.0, 10.0, 2.0, 2.0, 0.5])]);
        let candidates = decode_output(&data, &[1, 5, 6], 0.5, &IDENTITY).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_decode_applies_letterbox_transform() {
        let t = LetterboxTransform {
            scale: 2.0,
            pad_x: 10,
            pad_y: 0,
        };
        let data = output(5, 6, true, &[(0, vec![30.0, 20.0, 20.0, 20.0, 0.8])]);
        let candidates = decode_output(&data, &[1, 5, 6], 0.25, &t).unwrap();
        assert_eq!(candidates[0].bbox, [5.0, 5.0, 15.0, 15.0]);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_output(&[0.0; 4], &[1, 4], 0.5, &IDENTITY).is_err());
        assert!(decode_output(&[0.0; 8], &[1, 2, 4], 0.5, &IDENTITY).is_err());
        assert!(decode_output(&[0.0; 3], &[1, 5, 8], 0.5, &IDENTITY).is_err());
    }

    #[test]
    fn test_to_detection_clamps_and_labels() {
        let labels = LabelSet::new(vec!["banknote".into()]).unwrap();
        let candidate = Candidate {
            bbox: [-4.2, 10.9, 250.0, 60.5],
            confidence: 0.87,
            class_index: 0,
        };
        let det = to_detection(&candidate, &labels, 200, 100);
        assert_eq!(det.bbox().corners(), [0, 10, 199, 60]);
        assert_eq!(det.class_name(), "banknote");
    }
}
