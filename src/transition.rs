//! Time-driven transitions: fade-in and population easing.
//!
//! Both run on their own cadence, independent of how many frames are drawn,
//! and both are one-shot: once complete they never change again for the
//! lifetime of the engine.

use serde::{Deserialize, Serialize};

use crate::time::Interval;

/// Fade-in timing.
///
/// Starting `delay_ms` after the engine starts, the fade progresses by
/// `1 / steps` every `interval_ms` until it reaches 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeInConfig {
    pub delay_ms: f64,
    pub interval_ms: f64,
    pub steps: u32,
}

impl Default for FadeInConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000.0,
            interval_ms: 100.0,
            steps: 5,
        }
    }
}

impl FadeInConfig {
    /// Every progress value the fade passes through, from 0 to 1.
    pub fn levels(&self) -> impl Iterator<Item = f32> {
        let steps = self.steps;
        (0..=steps).map(move |k| if steps == 0 { 1.0 } else { k as f32 / steps as f32 })
    }
}

/// Ramps an opacity multiplier from 0 to 1.
#[derive(Debug, Clone)]
pub struct FadeIn {
    cadence: Interval,
    steps: u32,
    taken: u32,
}

impl FadeIn {
    pub fn new(config: FadeInConfig) -> Self {
        Self {
            cadence: Interval::delayed(config.interval_ms, config.delay_ms),
            steps: config.steps,
            taken: 0,
        }
    }

    /// A fade that is already complete.
    pub fn complete() -> Self {
        Self {
            cadence: Interval::new(0.0),
            steps: 0,
            taken: 0,
        }
    }

    /// Current multiplier in `[0, 1]`.
    #[inline]
    pub fn progress(&self) -> f32 {
        if self.steps == 0 {
            1.0
        } else {
            self.taken as f32 / self.steps as f32
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.taken >= self.steps
    }

    /// Step the fade if its cadence is due at `now`. Returns `true` if it changed.
    pub fn advance(&mut self, now: f64) -> bool {
        if self.is_complete() || !self.cadence.poll(now) {
            return false;
        }
        self.taken += 1;
        if self.is_complete() {
            log::info!("fade-in complete at {:.0}ms", now);
        }
        true
    }
}

/// Population easing thresholds, expressed as fade progress.
///
/// While the fade is still below `sample_until`, slow frames are recorded.
/// Once it lies within `remove_from..=remove_until`, the field sheds stars
/// in proportion to how far behind the frame budget it was running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EasingConfig {
    /// Frames to ignore at startup while the host settles.
    pub warmup_frames: u32,
    pub sample_until: f32,
    pub remove_from: f32,
    pub remove_until: f32,
}

impl Default for EasingConfig {
    fn default() -> Self {
        Self {
            warmup_frames: 5,
            sample_until: 0.3,
            remove_from: 0.3,
            remove_until: 0.5,
        }
    }
}

/// Thins the population on hosts that cannot keep up with the frame budget.
#[derive(Debug, Clone)]
pub struct PopulationEasing {
    config: EasingConfig,
    frames: u32,
    samples: Vec<u32>,
    removed: usize,
    done: bool,
}

impl PopulationEasing {
    pub fn new(config: EasingConfig) -> Self {
        Self {
            config,
            frames: 0,
            samples: Vec::new(),
            removed: 0,
            done: false,
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// Total stars this easing has asked to remove.
    #[inline]
    pub fn removed(&self) -> usize {
        self.removed
    }

    /// Record one frame and return how many stars to remove now.
    ///
    /// * `fade` - current fade progress
    /// * `delta_ms` - duration of the frame
    /// * `budget_ms` - target frame duration (`1000 / fps`)
    pub fn on_frame(&mut self, fade: f32, delta_ms: f32, budget_ms: f32) -> usize {
        if self.done {
            return 0;
        }
        if fade > self.config.remove_until {
            self.done = true;
            self.samples.clear();
            log::debug!("population easing complete, {} stars removed", self.removed);
            return 0;
        }

        if fade < 1.0 {
            self.frames += 1;
        }

        if budget_ms > 0.0
            && delta_ms > budget_ms
            && self.frames > self.config.warmup_frames
            && fade <= self.config.sample_until
        {
            self.samples.push((delta_ms / budget_ms) as u32);
        }

        let max = self.samples.iter().copied().max().unwrap_or(0);
        if max == 0 || fade < self.config.remove_from {
            return 0;
        }

        let sum: u32 = self.samples.iter().sum();
        let average = (sum as f32 / self.samples.len() as f32).round() as usize;
        self.samples.clear();
        self.removed += average;
        average
    }
}
