//! The live star population.
//!
//! Stars are spawned in one batch whenever the surface is (re)sized and then
//! mutated in place by the physics step. The only other way the population
//! changes is [`StarField::truncate`], used by population easing.

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Smallest star radius in pixels.
pub const MIN_RADIUS: f32 = 1.5;
/// Width of the radius distribution; radii fall in `[MIN_RADIUS, MIN_RADIUS + RADIUS_SPREAD)`.
pub const RADIUS_SPREAD: f32 = 1.5;

/// A single simulated point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    /// Position in surface pixels.
    pub position: Vec2,
    /// Render radius, fixed at creation.
    pub radius: f32,
    /// Surface pixels per simulation time unit.
    pub velocity: Vec2,
}

impl Star {
    pub fn new(position: Vec2, radius: f32, velocity: Vec2) -> Self {
        Self {
            position,
            radius,
            velocity,
        }
    }
}

/// Per-axis velocity limits for a `width × height` surface.
///
/// Each axis starts at `size × speed`. The bound of the shorter axis is then
/// corrected by the aspect ratio so stars drift at the same apparent pace
/// whatever the viewport shape. A zero-sized axis yields zero bounds.
pub fn velocity_bounds(width: f32, height: f32, speed: f32) -> Vec2 {
    if width <= 0.0 || height <= 0.0 {
        return Vec2::ZERO;
    }

    let aspect = width / height;
    let mut max = Vec2::new(width * speed, height * speed);

    if aspect > 1.0 {
        max.y *= aspect;
    } else {
        max.x /= aspect;
    }

    max
}

/// Owns every star of one engine.
#[derive(Debug)]
pub struct StarField {
    stars: Vec<Star>,
    rng: SmallRng,
}

impl StarField {
    /// Create an empty field.
    ///
    /// With `Some(seed)` every population is reproducible; with `None` the
    /// generator is seeded from the system clock.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            stars: Vec::new(),
            rng: SmallRng::seed_from_u64(seed.unwrap_or_else(clock_seed)),
        }
    }

    /// Wrap an existing set of stars.
    pub fn from_stars(stars: Vec<Star>) -> Self {
        Self {
            stars,
            rng: SmallRng::seed_from_u64(clock_seed()),
        }
    }

    /// Replace the population with `count` fresh stars.
    ///
    /// Positions are uniform over `[0, width) × [0, height)`, velocities
    /// uniform within [`velocity_bounds`]. Previous stars are discarded.
    pub fn populate(&mut self, count: usize, width: f32, height: f32, speed: f32) {
        let max_v = velocity_bounds(width, height, speed);
        let rng = &mut self.rng;

        self.stars = (0..count)
            .map(|_| Star {
                position: Vec2::new(rng.gen::<f32>() * width, rng.gen::<f32>() * height),
                radius: rng.gen::<f32>() * RADIUS_SPREAD + MIN_RADIUS,
                velocity: Vec2::new(
                    rng.gen::<f32>() * 2.0 * max_v.x - max_v.x,
                    rng.gen::<f32>() * 2.0 * max_v.y - max_v.y,
                ),
            })
            .collect();
    }

    /// Replace the population with the given stars.
    pub fn replace(&mut self, stars: Vec<Star>) {
        self.stars = stars;
    }

    /// Drop stars from the end until at most `len` remain.
    pub fn truncate(&mut self, len: usize) {
        self.stars.truncate(len);
    }

    #[inline]
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    #[inline]
    pub fn stars_mut(&mut self) -> &mut [Star] {
        &mut self.stars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}

impl Default for StarField {
    fn default() -> Self {
        Self::new(None)
    }
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}
