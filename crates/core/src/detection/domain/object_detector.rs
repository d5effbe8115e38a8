use crate::shared::frame::Frame;

use super::detection::Detection;
use super::detection_error::DetectionError;
use super::label_set::LabelSet;

/// Domain interface for one detection model.
///
/// Implementations wrap an external model runtime, hence `&mut self`.
/// They must only return detections whose confidence meets the threshold,
/// must never modify the frame, and must report runtime failures as
/// errors instead of returning fabricated detections.
pub trait ObjectDetector: Send {
    fn predict(&mut self, frame: &Frame, confidence: f64)
        -> Result<Vec<Detection>, DetectionError>;

    /// Ordered label table the model was initialized with.
    fn labels(&self) -> &LabelSet;
}

/// Checks the preconditions shared by every `predict` implementation.
pub fn validate_request(frame: &Frame, confidence: f64) -> Result<(), DetectionError> {
    if frame.is_empty() {
        return Err(DetectionError::InvalidFrame {
            width: frame.width(),
            height: frame.height(),
        });
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(DetectionError::InvalidThreshold(confidence));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_valid_request_passes() {
        let frame = Frame::filled(4, 4, [0, 0, 0], 0);
        assert!(validate_request(&frame, 0.25).is_ok());
    }

    #[test]
    fn test_zero_area_frame_rejected() {
        let frame = Frame::new(Vec::new(), 0, 0, 0);
        assert!(matches!(
            validate_request(&frame, 0.5),
            Err(DetectionError::InvalidFrame { .. })
        ));
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.01)]
    #[case(f64::NAN)]
    fn test_threshold_out_of_range_rejected(#[case] confidence: f64) {
        let frame = Frame::filled(2, 2, [0, 0, 0], 0);
        assert!(matches!(
            validate_request(&frame, confidence),
            Err(DetectionError::InvalidThreshold(_))
        ));
    }
}
