//! Viewport-area driven population sizing.
//!
//! A [`DensityProfile`] holds calibration points measured at layout
//! breakpoints: for a given screen area, how many pixels each star should
//! occupy and how far connections should reach. Anything between two
//! breakpoints is linearly interpolated, so the field looks equally busy on a
//! phone and on a wide desktop header.
//!
//! ```ignore
//! use starfield::density::DensityProfile;
//!
//! let profile = DensityProfile::default();
//! let targets = profile.targets(1024.0, 318.0, 100.0, 100.0).unwrap();
//! assert_eq!(targets.star_count, 90);
//! assert_eq!(targets.connection_radius, 100.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::DensityError;
use crate::math::lerp;

/// One measured point of the density curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Viewport area in square pixels.
    pub area: f32,
    /// Surface pixels per star at this area.
    pub pixels_per_star: f32,
    /// Connection radius in pixels at this area, before the range percentage.
    pub radius: f32,
}

impl CalibrationPoint {
    /// Calibration point for a `width × height` viewport.
    pub fn new(width: f32, height: f32, pixels_per_star: f32, radius: f32) -> Self {
        Self {
            area: width * height,
            pixels_per_star,
            radius,
        }
    }
}

/// Interpolated values of the density curve at some area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensitySample {
    pub pixels_per_star: f32,
    pub base_radius: f32,
}

/// Population size and connection reach for a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityTargets {
    pub star_count: usize,
    pub connection_radius: f32,
}

/// Calibration points sorted ascending by area.
///
/// Immutable once built. At least two points are required so that every
/// area has a bracketing pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CalibrationPoint>", into = "Vec<CalibrationPoint>")]
pub struct DensityProfile {
    points: Vec<CalibrationPoint>,
}

impl DensityProfile {
    /// Build a profile from unsorted calibration points.
    pub fn new(mut points: Vec<CalibrationPoint>) -> Result<Self, DensityError> {
        if points.len() < 2 {
            return Err(DensityError::TooFewPoints(points.len()));
        }
        for p in &points {
            let valid = p.area.is_finite()
                && p.area > 0.0
                && p.pixels_per_star.is_finite()
                && p.pixels_per_star > 0.0
                && p.radius.is_finite()
                && p.radius >= 0.0;
            if !valid {
                return Err(DensityError::InvalidPoint(*p));
            }
        }
        points.sort_by(|a, b| a.area.total_cmp(&b.area));
        Ok(Self { points })
    }

    /// Calibration points in ascending area order.
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// The pair of points used to interpolate at `area`.
    ///
    /// Areas outside the calibrated range use the first and last points,
    /// which extrapolates along the line between them.
    fn bracket(&self, area: f32) -> (CalibrationPoint, CalibrationPoint) {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        self.points
            .windows(2)
            .find(|w| area >= w[0].area && area <= w[1].area)
            .map(|w| (w[0], w[1]))
            .unwrap_or((first, last))
    }

    /// Interpolate pixels-per-star and base radius at `area`.
    ///
    /// Returns `None` for zero, negative or non-finite areas.
    pub fn sample(&self, area: f32) -> Option<DensitySample> {
        if !area.is_finite() || area <= 0.0 {
            return None;
        }

        // Exact hits return the calibrated values without float drift
        if let Some(p) = self.points.iter().find(|p| p.area == area) {
            return Some(DensitySample {
                pixels_per_star: p.pixels_per_star,
                base_radius: p.radius,
            });
        }

        let (lower, upper) = self.bracket(area);
        Some(DensitySample {
            pixels_per_star: lerp(area, lower.area, upper.area, lower.pixels_per_star, upper.pixels_per_star),
            base_radius: lerp(area, lower.area, upper.area, lower.radius, upper.radius),
        })
    }

    /// Star count and connection radius for a `width × height` viewport.
    ///
    /// * `density_percent` - scales the star count (100 = calibrated density)
    /// * `range_percent` - scales the connection radius (100 = calibrated reach)
    ///
    /// Returns `None` when the viewport has no area or the curve extrapolates
    /// to a non-positive pitch.
    pub fn targets(
        &self,
        width: f32,
        height: f32,
        density_percent: f32,
        range_percent: f32,
    ) -> Option<DensityTargets> {
        let area = width * height;
        let sample = self.sample(area)?;
        if sample.pixels_per_star <= 0.0 {
            return None;
        }

        let count = (area / sample.pixels_per_star).round() * (density_percent / 100.0);
        let radius = (sample.base_radius * range_percent / 100.0).round();

        Some(DensityTargets {
            star_count: count.round().max(0.0) as usize,
            connection_radius: radius.max(0.0),
        })
    }
}

impl Default for DensityProfile {
    /// Breakpoints of a full-width page header.
    fn default() -> Self {
        Self {
            points: vec![
                CalibrationPoint::new(320.0, 355.0, 2270.0, 75.0),
                CalibrationPoint::new(425.0, 355.0, 2515.0, 75.0),
                CalibrationPoint::new(768.0, 355.0, 3490.0, 90.0),
                CalibrationPoint::new(1024.0, 318.0, 3618.0, 100.0),
                CalibrationPoint::new(1450.0, 318.0, 4828.0, 130.0),
            ],
        }
    }
}

impl TryFrom<Vec<CalibrationPoint>> for DensityProfile {
    type Error = DensityError;

    fn try_from(points: Vec<CalibrationPoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<DensityProfile> for Vec<CalibrationPoint> {
    fn from(profile: DensityProfile) -> Self {
        profile.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_sorted() {
        let profile = DensityProfile::default();
        let areas: Vec<f32> = profile.points().iter().map(|p| p.area).collect();
        let mut sorted = areas.clone();
        sorted.sort_by(f32::total_cmp);
        assert_eq!(areas, sorted);
    }

    #[test]
    fn test_new_sorts_points() {
        let profile = DensityProfile::new(vec![
            CalibrationPoint { area: 400.0, pixels_per_star: 20.0, radius: 40.0 },
            CalibrationPoint { area: 100.0, pixels_per_star: 10.0, radius: 10.0 },
        ])
        .unwrap();
        assert_eq!(profile.points()[0].area, 100.0);
        assert_eq!(profile.points()[1].area, 400.0);
    }

    #[test]
    fn test_rejects_short_profile() {
        let err = DensityProfile::new(vec![CalibrationPoint::new(10.0, 10.0, 5.0, 5.0)]);
        assert!(matches!(err, Err(DensityError::TooFewPoints(1))));
    }

    #[test]
    fn test_rejects_zero_pitch() {
        let err = DensityProfile::new(vec![
            CalibrationPoint::new(10.0, 10.0, 0.0, 5.0),
            CalibrationPoint::new(20.0, 10.0, 5.0, 5.0),
        ]);
        assert!(matches!(err, Err(DensityError::InvalidPoint(_))));
    }

    #[test]
    fn test_exact_calibration_points() {
        let profile = DensityProfile::default();
        for p in profile.points() {
            let s = profile.sample(p.area).unwrap();
            assert_eq!(s.pixels_per_star, p.pixels_per_star);
            assert_eq!(s.base_radius, p.radius);

            let t = profile.targets(p.area, 1.0, 100.0, 100.0).unwrap();
            assert_eq!(t.connection_radius, p.radius);
            assert_eq!(t.star_count, (p.area / p.pixels_per_star).round() as usize);
        }
    }

    #[test]
    fn test_midpoint_interpolation() {
        let profile = DensityProfile::new(vec![
            CalibrationPoint { area: 100.0, pixels_per_star: 10.0, radius: 10.0 },
            CalibrationPoint { area: 300.0, pixels_per_star: 30.0, radius: 50.0 },
        ])
        .unwrap();
        let s = profile.sample(200.0).unwrap();
        assert!((s.pixels_per_star - 20.0).abs() < 1e-4);
        assert!((s.base_radius - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_outside_range_uses_first_and_last() {
        let profile = DensityProfile::new(vec![
            CalibrationPoint { area: 100.0, pixels_per_star: 10.0, radius: 10.0 },
            CalibrationPoint { area: 200.0, pixels_per_star: 100.0, radius: 10.0 },
            CalibrationPoint { area: 300.0, pixels_per_star: 30.0, radius: 30.0 },
        ])
        .unwrap();
        // Line through (100, 10) and (300, 30)
        let s = profile.sample(400.0).unwrap();
        assert!((s.pixels_per_star - 40.0).abs() < 1e-4);
        assert!((s.base_radius - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_monotonic_in_area() {
        let profile = DensityProfile::default();
        let first = profile.points()[0].area;
        let last = profile.points()[profile.points().len() - 1].area;

        let mut prev_count = 0;
        let mut prev_radius = 0.0;
        let steps = 500;
        for i in 0..=steps {
            let area = first + (last - first) * i as f32 / steps as f32;
            let t = profile.targets(area, 1.0, 100.0, 100.0).unwrap();
            assert!(t.star_count >= prev_count, "count decreased at area {}", area);
            assert!(t.connection_radius >= prev_radius, "radius decreased at area {}", area);
            prev_count = t.star_count;
            prev_radius = t.connection_radius;
        }
    }

    #[test]
    fn test_percentages_scale_targets() {
        let profile = DensityProfile::default();
        let full = profile.targets(1024.0, 318.0, 100.0, 100.0).unwrap();
        let half = profile.targets(1024.0, 318.0, 50.0, 50.0).unwrap();
        assert_eq!(full.star_count, 90);
        assert_eq!(half.star_count, 45);
        assert_eq!(full.connection_radius, 100.0);
        assert_eq!(half.connection_radius, 50.0);
    }

    #[test]
    fn test_zero_area_has_no_targets() {
        let profile = DensityProfile::default();
        assert!(profile.targets(0.0, 355.0, 100.0, 100.0).is_none());
        assert!(profile.targets(800.0, 0.0, 100.0, 100.0).is_none());
        assert!(profile.sample(f32::NAN).is_none());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = r#"[{"area": 10.0, "pixels_per_star": 1.0, "radius": 2.0}]"#;
        assert!(serde_json::from_str::<DensityProfile>(json).is_err());
    }
}
