//! Small geometry helpers shared by the simulation and the density model.

use glam::Vec2;

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Linear interpolation of `y` at `x` along the line through `(x0, y0)` and `(x1, y1)`.
///
/// Values of `x` outside `[x0, x1]` extrapolate along the same line.
/// A degenerate bracket (`x0 == x1`) returns `y0`.
#[inline]
pub fn lerp(x: f32, x0: f32, x1: f32, y0: f32, y1: f32) -> f32 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}
