use crate::capture::domain::frame_source::{FrameSource, SourceError};
use crate::shared::frame::Frame;

/// Scoped ownership of a started [`FrameSource`].
///
/// The source is stopped exactly once: by [`close`](Self::close) or, on any
/// other exit path, when the session is dropped. Stop failures on drop are
/// logged.
pub struct CaptureSession<'a> {
    source: &'a mut dyn FrameSource,
    open: bool,
}

impl<'a> CaptureSession<'a> {
    /// Starts `source`. The session only exists if the start succeeded;
    /// on failure the source is still asked to release whatever it
    /// acquired.
    pub fn open(source: &'a mut dyn FrameSource) -> Result<Self, SourceError> {
        if let Err(e) = source.start() {
            if let Err(stop_err) = source.stop() {
                log::warn!("Error releasing frame source after failed start: {stop_err}");
            }
            return Err(e);
        }
        Ok(Self { source, open: true })
    }

    pub fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.source.read_frame()
    }

    pub fn is_exhausted(&self) -> bool {
        self.source.is_exhausted()
    }

    /// Stops the source now and reports how that went.
    pub fn close(mut self) -> Result<(), SourceError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), SourceError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.source.stop()
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("Error stopping frame source: {e}");
        }
    }
}
