use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("failed to start frame source: {0}")]
    Init(String),
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("failed to stop frame source: {0}")]
    Stop(String),
}

/// Producer of frames for the detection loop.
///
/// `read_frame` returning `Ok(None)` means no frame is available right
/// now. It is not an error; the caller simply polls again later.
pub trait FrameSource: Send {
    fn start(&mut self) -> Result<(), SourceError>;

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Releases the underlying device. Stopping a source that is not
    /// running succeeds.
    fn stop(&mut self) -> Result<(), SourceError>;

    fn is_running(&self) -> bool;

    /// True once a finite source (a file) has delivered its last frame.
    /// Live devices never finish.
    fn is_exhausted(&self) -> bool {
        false
    }
}
