use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_CURRENCY_MODEL, DEFAULT_ERROR_BACKOFF_MS, DEFAULT_NMS_IOU,
    DEFAULT_OBJECT_MODEL, DEFAULT_SOURCE, DEFAULT_TARGET_FPS, IMAGE_EXTENSIONS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the detector needs to run, as loaded from a JSON file and
/// then overridden from the command line. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Currency model, a local path or http(s) URL.
    pub currency_model: String,
    /// Generic object model, a local path or http(s) URL.
    pub object_model: String,
    pub currency_labels: Option<PathBuf>,
    pub object_labels: Option<PathBuf>,
    pub confidence: f64,
    pub target_fps: u32,
    pub debug_overlay: bool,
    pub show_fps: bool,
    pub error_backoff_ms: u64,
    pub source: String,
    pub input_format: Option<String>,
    /// Demuxer options passed to ffmpeg when opening the source, e.g.
    /// `video_size` or `framerate`.
    pub input_options: BTreeMap<String, String>,
    pub nms_iou: f64,
    pub max_frames: Option<usize>,
    pub snapshot: Option<PathBuf>,
    pub record: Option<PathBuf>,
    /// Show annotated frames in a live window. Needs the `window` feature.
    pub window: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            currency_model: DEFAULT_CURRENCY_MODEL.to_string(),
            object_model: DEFAULT_OBJECT_MODEL.to_string(),
            currency_labels: None,
            object_labels: None,
            confidence: DEFAULT_CONFIDENCE,
            target_fps: DEFAULT_TARGET_FPS,
            debug_overlay: true,
            show_fps: true,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            source: DEFAULT_SOURCE.to_string(),
            input_format: None,
            input_options: BTreeMap::new(),
            nms_iou: DEFAULT_NMS_IOU,
            max_frames: None,
            snapshot: None,
            record: None,
            window: false,
        }
    }
}

impl DetectionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be between 0 and 1, got {}",
                self.confidence
            )));
        }
        if self.target_fps == 0 {
            return Err(ConfigError::Invalid("target fps must be positive".into()));
        }
        if !(self.nms_iou > 0.0 && self.nms_iou <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "nms iou must be in (0, 1], got {}",
                self.nms_iou
            )));
        }
        if self.currency_model.trim().is_empty() || self.object_model.trim().is_empty() {
            return Err(ConfigError::Invalid("both model paths are required".into()));
        }
        if self.source.trim().is_empty() {
            return Err(ConfigError::Invalid("capture source is empty".into()));
        }
        if self.window && !cfg!(feature = "window") {
            return Err(ConfigError::Invalid(
                "live window requested but this build lacks the `window` feature".into(),
            ));
        }
        if let Some(snapshot) = &self.snapshot {
            let ext = snapshot
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            if !ext.is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "snapshot path {} needs an image extension ({})",
                    snapshot.display(),
                    IMAGE_EXTENSIONS.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}
