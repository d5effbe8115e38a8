use crate::display::domain::display_sink::{DisplayError, DisplaySink};
use crate::shared::frame::Frame;

/// Forwards every frame to several sinks.
///
/// All sinks see each frame even if an earlier one fails; the first
/// failure is returned.
pub struct FanOutDisplay {
    sinks: Vec<Box<dyn DisplaySink>>,
}

impl FanOutDisplay {
    pub fn new(sinks: Vec<Box<dyn DisplaySink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(
        &mut self,
        mut op: impl FnMut(&mut dyn DisplaySink) -> Result<(), DisplayError>,
    ) -> Result<(), DisplayError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = op(sink.as_mut()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl DisplaySink for FanOutDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.each(|sink| sink.show(frame))
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        self.each(|sink| sink.close())
    }
}
