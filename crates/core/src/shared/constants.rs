/// Default minimum confidence for both detection passes.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// Default pacing target for the live loop.
pub const DEFAULT_TARGET_FPS: u32 = 10;

/// Pause after a failed inference before the next iteration.
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 100;

/// Ultralytics' default NMS IoU threshold.
pub const DEFAULT_NMS_IOU: f64 = 0.45;

/// Weights for compositing the debug mask highlight over rendered detections.
pub const DEBUG_RENDER_WEIGHT: f64 = 0.7;
pub const DEBUG_MASK_WEIGHT: f64 = 0.3;

/// Labels whose top edge sits within this many pixels of the frame top are
/// drawn below the edge instead of above it.
pub const LABEL_TOP_MARGIN: i32 = 20;

/// Directory name used under the platform cache dir for downloaded models.
pub const APP_CACHE_DIR: &str = "CashSight";

/// First camera. Bare numbers are mapped to the platform device by the
/// capture source.
pub const DEFAULT_SOURCE: &str = "0";

pub const DEFAULT_CURRENCY_MODEL: &str = "models/currency.onnx";
pub const DEFAULT_OBJECT_MODEL: &str = "models/yolo11n.onnx";

/// Extensions accepted for snapshot output.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
