use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detection::domain::detection::{Detection, FrameResults};
use crate::shared::constants::LABEL_TOP_MARGIN;
use crate::shared::frame::Frame;

use super::glyphs;

/// Colors and sizes used when annotating frames. Colors are RGB.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualizerStyle {
    pub currency_color: [u8; 3],
    pub object_color: [u8; 3],
    pub mask_color: [u8; 3],
    pub label_text_color: [u8; 3],
    pub fps_color: [u8; 3],
    pub box_thickness: u32,
    pub label_scale: u32,
    pub fps_scale: u32,
}

impl Default for VisualizerStyle {
    fn default() -> Self {
        Self {
            currency_color: [0, 255, 0],
            object_color: [0, 0, 255],
            mask_color: [0, 255, 0],
            label_text_color: [0, 0, 0],
            fps_color: [0, 255, 0],
            box_thickness: 2,
            label_scale: 2,
            fps_scale: 3,
        }
    }
}

/// Draws detection boxes, labels and an optional FPS counter.
///
/// Stateless apart from its style; rendering always works on a copy.
#[derive(Clone, Debug, Default)]
pub struct Visualizer {
    style: VisualizerStyle,
}

impl Visualizer {
    pub fn new(style: VisualizerStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &VisualizerStyle {
        &self.style
    }

    /// Annotated copy of `frame`: currency detections first, then objects,
    /// then the FPS counter when `fps` is given.
    pub fn render(&self, frame: &Frame, results: &FrameResults, fps: Option<f64>) -> Frame {
        if frame.is_empty() {
            return frame.clone();
        }
        let Some(mut img) =
            RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        else {
            return frame.clone();
        };

        for det in &results.currency {
            self.draw_detection(&mut img, det, self.style.currency_color);
        }
        for det in &results.objects {
            self.draw_detection(&mut img, det, self.style.object_color);
        }
        if let Some(fps) = fps {
            self.draw_fps(&mut img, fps);
        }

        Frame::new(img.into_raw(), frame.width(), frame.height(), frame.index())
    }

    fn draw_detection(&self, img: &mut RgbImage, det: &Detection, color: [u8; 3]) {
        let b = det.bbox();

        for inset in 0..self.style.box_thickness as i32 {
            let w = b.width() - 2 * inset + 1;
            let h = b.height() - 2 * inset + 1;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(b.x1() + inset, b.y1() + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(img, rect, Rgb(color));
        }

        let label = det.label();
        let (text_w, text_h) = glyphs::text_size(&label, self.style.label_scale);
        let label_y = label_baseline(b.y1());

        // Background spans 5px above the text top and 5px below the baseline
        let bg_top = label_y - text_h as i32 - 5;
        let bg = Rect::at(b.x1(), bg_top).of_size(text_w.max(1), text_h + 10);
        draw_filled_rect_mut(img, bg, Rgb(color));

        glyphs::draw_text(
            img,
            &label,
            b.x1(),
            label_y - text_h as i32,
            self.style.label_scale,
            self.style.label_text_color,
        );
    }

    fn draw_fps(&self, img: &mut RgbImage, fps: f64) {
        let text = format!("FPS: {fps:.1}");
        let (_, text_h) = glyphs::text_size(&text, self.style.fps_scale);
        glyphs::draw_text(
            img,
            &text,
            10,
            30 - text_h as i32,
            self.style.fps_scale,
            self.style.fps_color,
        );
    }
}

/// Text baseline for a box whose top edge is at `y1`: above the box,
/// or inside it when the box hugs the top of the frame.
pub fn label_baseline(y1: i32) -> i32 {
    if y1 > LABEL_TOP_MARGIN {
        y1 - 10
    } else {
        y1 + 10
    }
}

/// Per-pixel `base * alpha + overlay * beta`, rounded and saturated.
pub fn blend(base: &Frame, overlay: &Frame, alpha: f64, beta: f64) -> Frame {
    debug_assert_eq!(
        (base.width(), base.height()),
        (overlay.width(), overlay.height()),
        "blended frames must share dimensions"
    );
    let data = base
        .data()
        .iter()
        .zip(overlay.data())
        .map(|(&a, &b)| (a as f64 * alpha + b as f64 * beta).round().clamp(0.0, 255.0) as u8)
        .collect();
    Frame::new(data, base.width(), base.height(), base.index())
}
