use std::path::{Path, PathBuf};

use crate::display::domain::display_sink::{DisplayError, DisplaySink};
use crate::shared::frame::Frame;

/// Keeps the most recent annotated frame on disk as an image.
///
/// Each frame is written to a sibling temp file and renamed over the
/// target, so a viewer polling the file never sees a partial image. The
/// format follows the target's extension.
pub struct SnapshotDisplay {
    path: PathBuf,
    frames_written: usize,
}

impl SnapshotDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        self.path.with_file_name(format!(".{name}.tmp.{ext}"))
    }
}

impl DisplaySink for SnapshotDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| DisplayError::Encode("frame buffer does not match its size".into()))?;

        let temp = self.temp_path();
        if let Err(e) = img.save(&temp) {
            let _ = std::fs::remove_file(&temp);
            return Err(DisplayError::Encode(e.to_string()));
        }
        std::fs::rename(&temp, &self.path)?;
        self.frames_written += 1;
        Ok(())
    }
}
