//! Position integration and wall reflection.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::star::Star;

/// How far stars move per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepMode {
    /// Scale velocity by the milliseconds elapsed since the previous frame.
    ///
    /// Motion speed is independent of the display refresh rate.
    #[default]
    Elapsed,
    /// Move by `velocity / fps` every frame regardless of wall time.
    ///
    /// Motion slows down when frames are dropped.
    FixedRate,
}

impl StepMode {
    /// Step size for a frame that took `delta_ms`.
    pub fn step(&self, delta_ms: f32, fps: f32) -> f32 {
        match self {
            StepMode::Elapsed => delta_ms.max(0.0),
            StepMode::FixedRate => {
                if fps > 0.0 {
                    1.0 / fps
                } else {
                    0.0
                }
            }
        }
    }
}

/// Move one star by `velocity × step`, then bounce it off the surface edges.
///
/// An axis whose new coordinate lies outside `[0, size]` has its velocity
/// negated. The position itself is left where it landed, so a star may sit
/// just past the edge for a frame before heading back.
#[inline]
pub fn advance(star: &mut Star, step: f32, size: Vec2) {
    star.position += star.velocity * step;

    if star.position.x < 0.0 || star.position.x > size.x {
        star.velocity.x = -star.velocity.x;
    }
    if star.position.y < 0.0 || star.position.y > size.y {
        star.velocity.y = -star.velocity.y;
    }
}

/// Advance every star by the same step.
pub fn advance_all(stars: &mut [Star], step: f32, size: Vec2) {
    for star in stars {
        advance(star, step, size);
    }
}
