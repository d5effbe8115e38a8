/// Axis-aligned box in integer pixel coordinates, top-left origin.
///
/// Both corners are inclusive. Construction orders the corners so
/// `x1 <= x2` and `y1 <= y2` always hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Converts float corners to integer pixels inside a `width`×`height`
    /// frame. Coordinates are truncated toward zero, then clamped to
    /// `[0, width-1]` / `[0, height-1]`.
    pub fn from_corners_clamped(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: u32,
        height: u32,
    ) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        let clamp = |v: f64, max: i32| -> i32 {
            if v.is_nan() {
                0
            } else {
                (v.trunc().clamp(0.0, max as f64)) as i32
            }
        };
        Self::new(
            clamp(x1, max_x),
            clamp(y1, max_y),
            clamp(x2, max_x),
            clamp(y2, max_y),
        )
    }

    pub fn x1(&self) -> i32 {
        self.x1
    }

    pub fn y1(&self) -> i32 {
        self.y1
    }

    pub fn x2(&self) -> i32 {
        self.x2
    }

    pub fn y2(&self) -> i32 {
        self.y2
    }

    pub fn corners(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// One object instance reported by a detection model for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    bbox: BoundingBox,
    confidence: f64,
    class_name: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64, class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        debug_assert!(
            (0.0..=1.0).contains(&confidence),
            "confidence must be within [0, 1]"
        );
        debug_assert!(!class_name.is_empty(), "class name must not be empty");
        Self {
            bbox,
            confidence,
            class_name,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `"<class_name>: <confidence>"` with two decimals, as drawn on frames.
    pub fn label(&self) -> String {
        format!("{}: {:.2}", self.class_name, self.confidence)
    }
}

/// Per-frame outcome of both detection passes.
///
/// The two lists are never cross-referenced: an overlapping currency and
/// object detection stay separate records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameResults {
    pub currency: Vec<Detection>,
    pub objects: Vec<Detection>,
}

impl FrameResults {
    pub fn new(currency: Vec<Detection>, objects: Vec<Detection>) -> Self {
        Self { currency, objects }
    }

    pub fn is_empty(&self) -> bool {
        self.currency.is_empty() && self.objects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.currency.len() + self.objects.len()
    }
}
