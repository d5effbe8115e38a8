//! Bitmap text for detection labels and the FPS counter, drawn from the
//! `font8x8` basic Latin set.
//!
//! Characters outside that set render as `?`.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

/// Glyph cell edge, before scaling. Cells carry their own spacing.
const GLYPH_SIZE: u32 = 8;

/// Row bitmaps, bit 0 is the leftmost column.
fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Pixel size `(width, height)` of `text` rendered at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    (chars * GLYPH_SIZE * scale, GLYPH_SIZE * scale)
}

/// Draws `text` with its top-left corner at `(x, top)`, clipping at the
/// image edges.
pub fn draw_text(img: &mut RgbImage, text: &str, x: i32, top: i32, scale: u32, color: [u8; 3]) {
    let (img_w, img_h) = (img.width() as i64, img.height() as i64);
    let scale = scale.max(1) as i64;
    let advance = GLYPH_SIZE as i64 * scale;

    for (i, c) in text.chars().enumerate() {
        let origin_x = x as i64 + i as i64 * advance;
        if origin_x >= img_w {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE as i64 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    let py = top as i64 + row as i64 * scale + dy;
                    if py < 0 || py >= img_h {
                        continue;
                    }
                    for dx in 0..scale {
                        let px = origin_x + col * scale + dx;
                        if px >= 0 && px < img_w {
                            img.put_pixel(px as u32, py as u32, Rgb(color));
                        }
                    }
                }
            }
        }
    }
}
