/// Software rasterizer for paint commands
use image::{Rgba as Pixel, RgbaImage};

use crate::platform::Size;
use crate::rendering::paint::PaintCommand;
use crate::{Error, Result};

/// Pixel dimensions of `size` at `scale` (at least one pixel per axis).
pub fn pixel_size(size: Size, scale: f64) -> (u32, u32) {
    let px = |v: f64| ((v * scale).round().max(1.0)).min(u32::MAX as f64) as u32;
    (px(size.width), px(size.height))
}

/// Accept only finite, positive render scales.
pub fn check_scale(scale: f64) -> Result<f64> {
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(Error::ConfigError(format!("render scale must be a positive number, got {}", scale)))
    }
}

/// Largest scale not above `scale` that keeps both axes within `ceiling`
/// pixels. Oversized captures are drawn smaller instead of failing.
pub fn fit_scale(size: Size, scale: f64, ceiling: u32) -> f64 {
    let longest = size.width.max(size.height) * scale;
    let ceiling = ceiling.max(1) as f64;
    if longest > ceiling {
        scale * ceiling / longest
    } else {
        scale
    }
}

/// Draw commands in order onto a transparent canvas.
pub fn rasterize(width: u32, height: u32, commands: &[PaintCommand]) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    for cmd in commands {
        match *cmd {
            PaintCommand::SolidRect { x, y, width: w, height: h, rgba } => {
                let x0 = x.max(0) as i64;
                let y0 = y.max(0) as i64;
                let x1 = (x as i64 + w as i64).min(width as i64);
                let y1 = (y as i64 + h as i64).min(height as i64);
                for py in y0..y1 {
                    for px in x0..x1 {
                        let dst = canvas.get_pixel_mut(px as u32, py as u32);
                        *dst = blend(*dst, rgba);
                    }
                }
            }
        }
    }
    canvas
}

/// Source-over compositing with straight alpha, integer-only so identical
/// input always yields identical bytes.
fn blend(dst: Pixel<u8>, (r, g, b, a): (u8, u8, u8, u8)) -> Pixel<u8> {
    if a == 255 {
        return Pixel([r, g, b, 255]);
    }
    let sa = a as u32;
    let da = dst.0[3] as u32;
    let out_a = sa * 255 + da * (255 - sa);
    if out_a == 0 {
        return Pixel([0, 0, 0, 0]);
    }
    let ch = |s: u8, d: u8| ((s as u32 * sa * 255 + d as u32 * da * (255 - sa) + out_a / 2) / out_a) as u8;
    Pixel([
        ch(r, dst.0[0]),
        ch(g, dst.0[1]),
        ch(b, dst.0[2]),
        ((out_a + 127) / 255) as u8,
    ])
}
