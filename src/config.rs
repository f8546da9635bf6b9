//! Engine configuration.
//!
//! Every option has a default, so a configuration file only needs the
//! values it wants to change:
//!
//! ```json
//! {
//!     "population": { "Density": { "percent": 60 } },
//!     "connection_mode": { "Cached": { "refresh_rate": 5 } },
//!     "star_color": [0.8, 0.9, 1.0],
//!     "transparency": 0.5
//! }
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::connections::{ConnectionMode, Falloff};
use crate::density::{DensityProfile, DensityTargets};
use crate::error::ConfigError;
use crate::physics::StepMode;
use crate::render::BlendMode;
use crate::transition::{EasingConfig, FadeInConfig};

/// How many stars to spawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Population {
    /// Derive the count from the surface area via the density profile.
    /// 100 = calibrated density.
    Density { percent: f32 },
    /// Always spawn exactly this many.
    Fixed { count: usize },
}

impl Default for Population {
    fn default() -> Self {
        Population::Density { percent: 100.0 }
    }
}

/// How far connections reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConnectionRange {
    /// Percentage of the density profile's radius for the surface area.
    Percent(f32),
    /// A fixed radius in pixels.
    Pixels(f32),
}

impl Default for ConnectionRange {
    fn default() -> Self {
        ConnectionRange::Percent(100.0)
    }
}

/// All engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarfieldConfig {
    pub population: Population,
    /// Target frame rate: step size in [`StepMode::FixedRate`], frame budget for easing.
    pub fps: f32,
    pub step_mode: StepMode,
    /// Longest frame the physics will integrate in one step.
    pub max_frame_delta_ms: Option<f32>,
    pub connection_range: ConnectionRange,
    /// Added to every link's stroke width.
    pub connection_base_width: f32,
    pub connection_mode: ConnectionMode,
    pub falloff: Falloff,
    /// Velocity bound as a fraction of the surface size per time unit.
    pub star_speed: f32,
    /// Global alpha of the whole effect.
    pub transparency: f32,
    pub star_color: Vec3,
    pub connection_color: Vec3,
    pub blend_mode: BlendMode,
    /// `None` shows the field at full opacity immediately.
    pub fade_in: Option<FadeInConfig>,
    pub population_easing: Option<EasingConfig>,
    pub density_profile: DensityProfile,
    /// Fixed RNG seed for reproducible fields.
    pub seed: Option<u64>,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            population: Population::default(),
            fps: 60.0,
            step_mode: StepMode::Elapsed,
            max_frame_delta_ms: Some(100.0),
            connection_range: ConnectionRange::default(),
            connection_base_width: 0.5,
            connection_mode: ConnectionMode::default(),
            falloff: Falloff::Linear,
            star_speed: 0.00002,
            transparency: 0.3,
            star_color: Vec3::ONE,
            connection_color: Vec3::ONE,
            blend_mode: BlendMode::Lighten,
            fade_in: Some(FadeInConfig::default()),
            population_easing: None,
            density_profile: DensityProfile::default(),
            seed: None,
        }
    }
}

impl StarfieldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_population(mut self, population: Population) -> Self {
        self.population = population;
        self
    }

    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_step_mode(mut self, mode: StepMode) -> Self {
        self.step_mode = mode;
        self
    }

    pub fn with_connection_range(mut self, range: ConnectionRange) -> Self {
        self.connection_range = range;
        self
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    pub fn with_falloff(mut self, falloff: Falloff) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn with_star_speed(mut self, speed: f32) -> Self {
        self.star_speed = speed;
        self
    }

    pub fn with_transparency(mut self, transparency: f32) -> Self {
        self.transparency = transparency;
        self
    }

    pub fn with_fade_in(mut self, fade_in: Option<FadeInConfig>) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn with_population_easing(mut self, easing: Option<EasingConfig>) -> Self {
        self.population_easing = easing;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, msg: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid(msg.to_string()))
            }
        }
        fn non_negative(v: f32) -> bool {
            v.is_finite() && v >= 0.0
        }
        fn unit_color(c: Vec3) -> bool {
            c.is_finite() && c.min_element() >= 0.0 && c.max_element() <= 1.0
        }

        if let Population::Density { percent } = self.population {
            check(non_negative(percent), "population percent must be >= 0")?;
        }
        match self.connection_range {
            ConnectionRange::Percent(p) => check(non_negative(p), "connection range percent must be >= 0")?,
            ConnectionRange::Pixels(r) => check(non_negative(r), "connection range must be >= 0")?,
        }
        if let ConnectionMode::Cached { refresh_rate } = self.connection_mode {
            check(refresh_rate.is_finite() && refresh_rate > 0.0, "refresh_rate must be > 0")?;
        }
        if let Some(max) = self.max_frame_delta_ms {
            check(non_negative(max), "max_frame_delta_ms must be >= 0")?;
        }
        check(self.fps.is_finite() && self.fps > 0.0, "fps must be > 0")?;
        check(non_negative(self.connection_base_width), "connection_base_width must be >= 0")?;
        check(non_negative(self.star_speed), "star_speed must be >= 0")?;
        check(
            self.transparency.is_finite() && (0.0..=1.0).contains(&self.transparency),
            "transparency must be within 0..=1",
        )?;
        check(unit_color(self.star_color), "star_color channels must be within 0..=1")?;
        check(unit_color(self.connection_color), "connection_color channels must be within 0..=1")?;

        if let Some(fade) = self.fade_in {
            check(
                fade.delay_ms.is_finite() && fade.delay_ms >= 0.0 && fade.interval_ms.is_finite() && fade.interval_ms >= 0.0,
                "fade_in timings must be >= 0",
            )?;
        }
        if let Some(easing) = self.population_easing {
            check(
                easing.remove_from <= easing.remove_until,
                "population_easing remove_from must not exceed remove_until",
            )?;
            // Easing is keyed on fade progress, so it needs a fade that
            // actually pauses inside the removal window.
            let Some(fade) = self.fade_in else {
                return Err(ConfigError::Invalid(
                    "population_easing requires fade_in".to_string(),
                ));
            };
            check(
                fade.levels()
                    .any(|p| p >= easing.remove_from && p <= easing.remove_until),
                "no fade_in step lands within population_easing remove_from..=remove_until",
            )?;
        }
        Ok(())
    }

    /// Star count and connection radius for a surface of the given size.
    ///
    /// Returns `None` when the surface has no area.
    pub fn resolve(&self, width: f32, height: f32) -> Option<DensityTargets> {
        if !(width > 0.0 && height > 0.0) {
            return None;
        }

        let range_percent = match self.connection_range {
            ConnectionRange::Percent(p) => p,
            ConnectionRange::Pixels(_) => 100.0,
        };
        let density_percent = match self.population {
            Population::Density { percent } => percent,
            Population::Fixed { .. } => 100.0,
        };
        let profiled = self.density_profile.targets(width, height, density_percent, range_percent);

        let star_count = match self.population {
            Population::Density { .. } => profiled.map(|t| t.star_count).unwrap_or(0),
            Population::Fixed { count } => count,
        };
        let connection_radius = match self.connection_range {
            ConnectionRange::Pixels(r) => r,
            ConnectionRange::Percent(_) => profiled.map(|t| t.connection_radius).unwrap_or(0.0),
        };

        Some(DensityTargets {
            star_count,
            connection_radius,
        })
    }

    /// Frame budget in milliseconds.
    pub fn frame_budget_ms(&self) -> f32 {
        if self.fps > 0.0 {
            1000.0 / self.fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        StarfieldConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = StarfieldConfig::from_json_str(
            r#"{
                "population": { "Fixed": { "count": 42 } },
                "falloff": "Squared",
                "star_color": [0.5, 0.5, 1.0]
            }"#,
        )
        .unwrap();
        assert_eq!(config.population, Population::Fixed { count: 42 });
        assert_eq!(config.falloff, Falloff::Squared);
        assert_eq!(config.star_color, Vec3::new(0.5, 0.5, 1.0));
        assert_eq!(config.fps, 60.0);
        assert_eq!(config.connection_mode, ConnectionMode::Cached { refresh_rate: 10.0 });
    }

    #[test]
    fn test_json_roundtrip() {
        let config = StarfieldConfig::default()
            .with_seed(5)
            .with_connection_mode(ConnectionMode::PerFrame)
            .with_fade_in(None);
        let json = config.to_json_string().unwrap();
        assert_eq!(StarfieldConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = [
            StarfieldConfig::default().with_fps(0.0),
            StarfieldConfig::default().with_transparency(1.5),
            StarfieldConfig::default().with_star_speed(f32::NAN),
            StarfieldConfig::default().with_connection_mode(ConnectionMode::Cached { refresh_rate: 0.0 }),
            StarfieldConfig::default().with_connection_range(ConnectionRange::Pixels(-1.0)),
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_easing_needs_reachable_window() {
        let easing = Some(EasingConfig::default());
        StarfieldConfig::default()
            .with_population_easing(easing)
            .validate()
            .unwrap();

        let no_fade = StarfieldConfig::default()
            .with_population_easing(easing)
            .with_fade_in(None);
        assert!(matches!(no_fade.validate(), Err(ConfigError::Invalid(_))));

        // Progress jumps 0 -> 1, skipping 0.3..=0.5
        let one_step = StarfieldConfig::default()
            .with_population_easing(easing)
            .with_fade_in(Some(FadeInConfig {
                steps: 1,
                ..FadeInConfig::default()
            }));
        assert!(matches!(one_step.validate(), Err(ConfigError::Invalid(_))));

        let two_steps = StarfieldConfig::default()
            .with_population_easing(Some(EasingConfig {
                remove_from: 0.5,
                remove_until: 0.5,
                ..EasingConfig::default()
            }))
            .with_fade_in(Some(FadeInConfig {
                steps: 2,
                ..FadeInConfig::default()
            }));
        two_steps.validate().unwrap();
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            StarfieldConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_resolve_density() {
        let config = StarfieldConfig::default();
        let t = config.resolve(1024.0, 318.0).unwrap();
        assert_eq!(t.star_count, 90);
        assert_eq!(t.connection_radius, 100.0);
        assert!(config.resolve(0.0, 318.0).is_none());
    }

    #[test]
    fn test_resolve_fixed() {
        let config = StarfieldConfig::default()
            .with_population(Population::Fixed { count: 7 })
            .with_connection_range(ConnectionRange::Pixels(120.0));
        let t = config.resolve(10.0, 10.0).unwrap();
        assert_eq!(t.star_count, 7);
        assert_eq!(t.connection_radius, 120.0);
    }

    #[test]
    fn test_frame_budget() {
        let config = StarfieldConfig::default().with_fps(50.0);
        assert_eq!(config.frame_budget_ms(), 20.0);
    }
}
