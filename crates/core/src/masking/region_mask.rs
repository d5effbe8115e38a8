use ndarray::{s, Array2, Zip};

use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Frame-sized occupancy grid: a cell is set when some detection's box
/// covers that pixel.
///
/// Built fresh for every frame and dropped with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionMask {
    cells: Array2<u8>,
}

impl RegionMask {
    /// Rasterizes detection boxes into a `height`×`width` mask.
    ///
    /// Box edges are inclusive. Parts of a box outside the frame are
    /// ignored. Marking is a union, so duplicate or reordered detections
    /// produce the same mask.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn build(height: u32, width: u32, detections: &[Detection]) -> Self {
        assert!(
            height > 0 && width > 0,
            "mask dimensions must be positive, got {width}x{height}"
        );
        let mut cells = Array2::<u8>::zeros((height as usize, width as usize));
        let max_x = width as i32 - 1;
        let max_y = height as i32 - 1;

        for det in detections {
            let b = det.bbox();
            let x1 = b.x1().max(0);
            let y1 = b.y1().max(0);
            let x2 = b.x2().min(max_x);
            let y2 = b.y2().min(max_y);
            if x1 > x2 || y1 > y2 {
                continue;
            }
            cells
                .slice_mut(s![y1 as usize..=y2 as usize, x1 as usize..=x2 as usize])
                .fill(1);
        }

        Self { cells }
    }

    /// Mask sized to `frame`.
    pub fn for_frame(frame: &Frame, detections: &[Detection]) -> Self {
        Self::build(frame.height(), frame.width(), detections)
    }

    pub fn height(&self) -> u32 {
        self.cells.nrows() as u32
    }

    pub fn width(&self) -> u32 {
        self.cells.ncols() as u32
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.cells
            .get((y as usize, x as usize))
            .is_some_and(|&c| c != 0)
    }

    pub fn covered_pixels(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    /// Working copy of `frame` with every covered pixel set to black.
    ///
    /// The input frame is left untouched.
    pub fn suppress(&self, frame: &Frame) -> Frame {
        self.paint(frame.clone(), [0, 0, 0])
    }

    /// Black frame with covered pixels in `color`, used as the debug
    /// highlight layer.
    pub fn highlight(&self, color: [u8; 3], index: usize) -> Frame {
        let blank = Frame::filled(self.width(), self.height(), [0, 0, 0], index);
        self.paint(blank, color)
    }

    fn paint(&self, mut frame: Frame, color: [u8; 3]) -> Frame {
        debug_assert_eq!(
            (frame.height(), frame.width()),
            (self.height(), self.width()),
            "mask and frame dimensions must match"
        );
        if self.is_empty() {
            return frame;
        }
        let mut pixels = frame.as_ndarray_mut();
        Zip::from(pixels.rows_mut())
            .and(&self.cells)
            .for_each(|mut px, &covered| {
                if covered != 0 {
                    px[0] = color[0];
                    px[1] = color[1];
                    px[2] = color[2];
                }
            });
        frame
    }
}
