use crate::detection::domain::detection::{Detection, FrameResults};

/// Console block listing one frame's detections.
pub struct DetectionReport;

impl DetectionReport {
    /// Formats `results` as a `Detections:` block with one section per
    /// model. Returns `None` when the frame has no detections at all.
    pub fn format(results: &FrameResults) -> Option<String> {
        if results.is_empty() {
            return None;
        }
        let mut lines = vec!["Detections:".to_string()];
        push_section(&mut lines, "Currency:", &results.currency);
        push_section(&mut lines, "Objects:", &results.objects);
        Some(lines.join("\n"))
    }

    pub fn line(detection: &Detection) -> String {
        format!(
            "  - {} (Confidence: {:.2})",
            detection.class_name(),
            detection.confidence()
        )
    }
}

fn push_section(lines: &mut Vec<String>, header: &str, detections: &[Detection]) {
    if detections.is_empty() {
        return;
    }
    lines.push(header.to_string());
    lines.extend(detections.iter().map(DetectionReport::line));
}
