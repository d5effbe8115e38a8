//! Box geometry shared by the detection backends: IoU and greedy NMS.

/// One decoded model candidate in frame coordinates, before suppression.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub class_index: usize,
}

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Class-aware greedy NMS.
///
/// Candidates are sorted by confidence descending; a candidate is dropped
/// when it overlaps an already-kept candidate of the same class by more
/// than `iou_thresh`. Boxes of different classes never suppress each other.
pub fn nms(mut candidates: Vec<Candidate>, iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = keep.iter().any(|k| {
            k.class_index == candidate.class_index
                && bbox_iou(&k.bbox, &candidate.bbox) > iou_thresh
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}
