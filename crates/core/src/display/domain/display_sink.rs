use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to encode frame: {0}")]
    Encode(String),
    #[error("display window failed: {0}")]
    Window(String),
    #[error("frame size {got:?} does not match stream size {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        got: (u32, u32),
    },
}

/// Consumer of annotated frames.
///
/// Sinks take the visualizer's output as is; they never modify it.
pub trait DisplaySink: Send {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError>;

    /// Flushes and releases the sink. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Sink that discards every frame, for headless runs.
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
        Ok(())
    }
}
