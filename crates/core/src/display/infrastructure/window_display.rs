use crate::display::domain::display_sink::{DisplayError, DisplaySink};
use crate::shared::frame::Frame;

pub const DEFAULT_WINDOW_NAME: &str = "Detection";

/// Shows annotated frames in a native window through OpenCV's highgui.
///
/// The window opens on the first frame. Each frame is followed by a 1 ms
/// event pump so the window stays responsive. Only built with the
/// `window` feature.
#[cfg(feature = "window")]
pub struct WindowDisplay {
    name: String,
    open: bool,
}

#[cfg(feature = "window")]
impl WindowDisplay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(feature = "window")]
impl Default for WindowDisplay {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_NAME)
    }
}

#[cfg(feature = "window")]
impl DisplaySink for WindowDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        use opencv::core::{Mat, CV_8UC3, Mat_AUTO_STEP};
        use opencv::highgui;
        use opencv::prelude::*;

        if !self.open {
            highgui::named_window(&self.name, highgui::WINDOW_AUTOSIZE).map_err(window_error)?;
            self.open = true;
        }

        let mut bgr = to_bgr(frame);
        // Safety: `bgr` holds exactly height * width * 3 bytes and outlives
        // `borrowed`, which is deep-copied before `bgr` is dropped.
        let borrowed = unsafe {
            Mat::new_rows_cols_with_data(
                frame.height() as i32,
                frame.width() as i32,
                CV_8UC3,
                bgr.as_mut_ptr().cast(),
                Mat_AUTO_STEP,
            )
        }
        .map_err(window_error)?;
        let mat = borrowed.try_clone().map_err(window_error)?;

        highgui::imshow(&self.name, &mat).map_err(window_error)?;
        highgui::wait_key(1).map_err(window_error)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DisplayError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        opencv::highgui::destroy_window(&self.name).map_err(window_error)
    }
}

#[cfg(feature = "window")]
fn window_error(e: opencv::Error) -> DisplayError {
    DisplayError::Window(e.to_string())
}

/// Interleaved BGR copy of an RGB frame, the channel order highgui expects.
#[cfg_attr(not(feature = "window"), allow(dead_code))]
pub(crate) fn to_bgr(frame: &Frame) -> Vec<u8> {
    let mut bgr = frame.data().to_vec();
    for px in bgr.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    bgr
}
