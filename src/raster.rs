//! CPU [`Surface`] backed by an [`image::RgbaImage`].
//!
//! Used for headless rendering and PNG snapshots. Shapes are drawn with
//! `imageproc`: filled circles for stars and Xiaolin Wu anti-aliased segments
//! for links. Every pixel write goes through the active [`BlendMode`].

use std::path::Path;

use glam::{Vec2, Vec4};
use image::{GrayImage, Luma, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_antialiased_line_segment_mut, draw_filled_circle_mut};

use crate::error::ExportError;
use crate::render::{BlendMode, Surface};

/// Straight-alpha RGBA8 color from a `[0, 1]` vector.
fn to_rgba(color: Vec4) -> Rgba<u8> {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

/// Composite `src` over `dst`, with `src`'s alpha scaled by `coverage`.
fn composite(mode: BlendMode, dst: Rgba<u8>, src: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let alpha = (src[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
    if alpha == 0 {
        return dst;
    }
    let src = Rgba([src[0], src[1], src[2], alpha]);

    match mode {
        BlendMode::Alpha => {
            let mut out = dst;
            out.blend(&src);
            out
        }
        BlendMode::Lighten => dst.map2(&premultiplied(src), |d, s| d.max(s)),
        BlendMode::Additive => dst.map2(&premultiplied(src), |d, s| d.saturating_add(s)),
    }
}

fn premultiplied(c: Rgba<u8>) -> Rgba<u8> {
    let a = c[3] as u16;
    c.map_without_alpha(|v| ((v as u16 * a + 127) / 255) as u8)
}

/// An RGBA8 image with canvas-style drawing.
#[derive(Debug, Clone)]
pub struct Pixmap {
    image: RgbaImage,
    blend_mode: BlendMode,
    global_alpha: f32,
}

impl Pixmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            blend_mode: BlendMode::default(),
            global_alpha: 1.0,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> impl Iterator<Item = &Rgba<u8>> {
        self.image.pixels()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.image.get_pixel_checked(x, y).copied()
    }

    /// Raw RGBA bytes, row-major, top row first.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Write the current contents as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    fn paint(&self, color: Vec4) -> Rgba<u8> {
        to_rgba(color * Vec4::new(1.0, 1.0, 1.0, self.global_alpha))
    }
}

impl Surface for Pixmap {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.image = RgbaImage::new(width, height);
    }

    fn clear(&mut self) {
        self.image.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Vec4) {
        let paint = self.paint(color);
        if paint[3] == 0 || !center.is_finite() || !radius.is_finite() {
            return;
        }

        // The filled-circle routine revisits some rows, so draw into a mask
        // first and composite every covered pixel exactly once.
        let limit = self.width().max(self.height()) as i32;
        let r = (radius.round().max(0.0) as i32).min(limit);
        let side = (2 * r + 1) as u32;
        let mut mask = GrayImage::new(side, side);
        draw_filled_circle_mut(&mut mask, (r, r), r, Luma([255]));

        let (w, h) = (self.width() as i64, self.height() as i64);
        let origin = (center.x.round() as i64 - r as i64, center.y.round() as i64 - r as i64);
        for (mx, my, m) in mask.enumerate_pixels() {
            let (x, y) = (origin.0 + mx as i64, origin.1 + my as i64);
            if m[0] == 0 || x < 0 || y < 0 || x >= w || y >= h {
                continue;
            }
            let (x, y) = (x as u32, y as u32);
            let dst = *self.image.get_pixel(x, y);
            self.image.put_pixel(x, y, composite(self.blend_mode, dst, paint, 1.0));
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Vec4) {
        let paint = self.paint(color);
        if paint[3] == 0 || !from.is_finite() || !to.is_finite() {
            return;
        }

        // Wider links are stroked as parallel one-pixel segments
        let strokes = width.round().max(1.0) as i32;
        let normal = (to - from).perp().normalize_or_zero();
        let mode = self.blend_mode;
        for i in 0..strokes {
            let offset = normal * (i as f32 - (strokes - 1) as f32 * 0.5);
            let (a, b) = (from + offset, to + offset);
            draw_antialiased_line_segment_mut(
                &mut self.image,
                (a.x.round() as i32, a.y.round() as i32),
                (b.x.round() as i32, b.y.round() as i32),
                paint,
                |src, dst, weight| composite(mode, dst, src, weight),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Vec4 = Vec4::ONE;

    fn alpha(pm: &Pixmap, x: u32, y: u32) -> u8 {
        pm.pixel(x, y).unwrap()[3]
    }

    #[test]
    fn test_new_is_transparent() {
        let pm = Pixmap::new(4, 3);
        assert_eq!(pm.pixels().count(), 12);
        assert_eq!(pm.as_bytes().len(), 48);
        assert!(pm.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_circle_covers_center() {
        let mut pm = Pixmap::new(20, 20);
        pm.set_blend_mode(BlendMode::Alpha);
        pm.fill_circle(Vec2::new(10.0, 10.0), 3.0, WHITE);
        assert_eq!(pm.pixel(10, 10), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(pm.pixel(0, 0), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_global_alpha_scales_paint() {
        let mut pm = Pixmap::new(20, 20);
        pm.set_blend_mode(BlendMode::Alpha);
        pm.set_global_alpha(0.5);
        pm.fill_circle(Vec2::new(10.0, 10.0), 3.0, WHITE);
        assert!((alpha(&pm, 10, 10) as i32 - 128).abs() <= 1);

        pm.clear();
        pm.set_global_alpha(0.0);
        pm.fill_circle(Vec2::new(10.0, 10.0), 3.0, WHITE);
        assert_eq!(alpha(&pm, 10, 10), 0);
    }

    #[test]
    fn test_lighten_never_darkens() {
        let mut pm = Pixmap::new(10, 10);
        pm.set_blend_mode(BlendMode::Lighten);
        pm.fill_circle(Vec2::new(5.0, 5.0), 4.0, WHITE);
        let before = pm.pixel(5, 5).unwrap();
        pm.fill_circle(Vec2::new(5.0, 5.0), 4.0, Vec4::new(0.2, 0.2, 0.2, 0.8));
        let after = pm.pixel(5, 5).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn test_additive_saturates() {
        let mut pm = Pixmap::new(10, 10);
        pm.set_blend_mode(BlendMode::Additive);
        let bright = Vec4::new(0.6, 0.6, 0.6, 1.0);
        pm.fill_circle(Vec2::new(5.0, 5.0), 4.0, bright);
        pm.fill_circle(Vec2::new(5.0, 5.0), 4.0, bright);
        assert_eq!(pm.pixel(5, 5).unwrap()[0], 255);
    }

    #[test]
    fn test_line_pixels() {
        let mut pm = Pixmap::new(20, 20);
        pm.stroke_line(Vec2::new(2.0, 10.0), Vec2::new(18.0, 10.0), 1.0, WHITE);
        assert!(alpha(&pm, 10, 10) > 200);
        assert_eq!(alpha(&pm, 10, 2), 0);
    }

    #[test]
    fn test_wide_line_covers_neighbors() {
        let mut pm = Pixmap::new(20, 20);
        pm.stroke_line(Vec2::new(2.0, 10.0), Vec2::new(18.0, 10.0), 3.0, WHITE);
        assert!(alpha(&pm, 10, 9) > 0);
        assert!(alpha(&pm, 10, 11) > 0);
    }

    #[test]
    fn test_offscreen_drawing_is_clipped() {
        let mut pm = Pixmap::new(10, 10);
        pm.fill_circle(Vec2::new(-50.0, -50.0), 3.0, WHITE);
        pm.stroke_line(Vec2::new(-5.0, 5.0), Vec2::new(500.0, 5.0), 2.0, WHITE);
        pm.fill_circle(Vec2::new(f32::NAN, 0.0), 3.0, WHITE);
        assert!(alpha(&pm, 5, 5) > 0);
        assert_eq!(alpha(&pm, 0, 0), 0);
    }

    #[test]
    fn test_resize_and_clear() {
        let mut pm = Pixmap::new(10, 10);
        pm.fill_circle(Vec2::new(5.0, 5.0), 4.0, WHITE);
        pm.clear();
        assert!(pm.pixels().all(|p| p[3] == 0));
        pm.resize(3, 2);
        assert_eq!(pm.size(), (3, 2));
        assert_eq!(pm.pixels().count(), 6);
    }
}
