//! Geometry primitives and court calibration.
//!
//! Court coordinates are metres on the ground plane. `x` runs across the
//! court (0 at the left doubles sideline), `y` runs from the far baseline (0)
//! to the near baseline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Standard court dimensions (ITF), in metres.
pub mod court {
    /// Doubles court width.
    pub const WIDTH: f64 = 10.97;
    /// Baseline to baseline.
    pub const LENGTH: f64 = 23.77;
    /// Net position along the length axis.
    pub const NET_Y: f64 = LENGTH / 2.0;
    /// Singles sideline inset from each doubles sideline.
    pub const SINGLES_INSET: f64 = 1.37;
    /// Left singles sideline.
    pub const SINGLES_LEFT: f64 = SINGLES_INSET;
    /// Right singles sideline.
    pub const SINGLES_RIGHT: f64 = WIDTH - SINGLES_INSET;
    /// Service line distance from the net.
    pub const SERVICE_LINE_FROM_NET: f64 = 6.40;
    /// Centre line (across-court midpoint).
    pub const CENTER_X: f64 = WIDTH / 2.0;
}

/// A 2D point, used for both pixel and court coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Whether a court-space point lies inside the singles court (lines are in).
    pub fn in_singles_court(&self) -> bool {
        self.x >= court::SINGLES_LEFT
            && self.x <= court::SINGLES_RIGHT
            && self.y >= 0.0
            && self.y <= court::LENGTH
    }
}

/// How a calibration was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    /// Corners derived from detected court lines
    LineDetection,
    /// Corners supplied with the match metadata
    Manual,
    /// Fixed-inset fallback used when detection failed
    Approximate,
}

/// Pixel-to-court mapping for one video.
///
/// Created once at the start of a run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CourtCalibration {
    /// Row-major homography mapping pixel coordinates to court metres
    pub homography: [[f64; 3]; 3],

    /// Metres per pixel, averaged over the two baselines
    pub pixel_to_meter: f64,

    /// Outer court corners in pixels: far-left, far-right, near-right, near-left
    pub corners: [Point2; 4],

    /// Mean reprojection error of the reference points, in metres
    pub reprojection_error_m: f64,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// How the calibration was obtained
    pub method: CalibrationMethod,

    /// True when positional statistics derived from this mapping are unreliable
    pub degraded: bool,
}

impl CourtCalibration {
    /// Map a pixel coordinate onto the court plane.
    ///
    /// Returns `None` for points on the homography's line at infinity.
    pub fn pixel_to_court(&self, p: Point2) -> Option<Point2> {
        let h = &self.homography;
        let w = h[2][0] * p.x + h[2][1] * p.y + h[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        let x = (h[0][0] * p.x + h[0][1] * p.y + h[0][2]) / w;
        let y = (h[1][0] * p.x + h[1][1] * p.y + h[1][2]) / w;
        let out = Point2::new(x, y);
        out.is_finite().then_some(out)
    }

    /// Whether positional statistics can be trusted.
    pub fn is_reliable(&self) -> bool {
        !self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale_calibration() -> CourtCalibration {
        CourtCalibration {
            homography: [[0.01, 0.0, 0.0], [0.0, 0.02, 0.0], [0.0, 0.0, 1.0]],
            pixel_to_meter: 0.01,
            corners: [Point2::default(); 4],
            reprojection_error_m: 0.0,
            confidence: 1.0,
            method: CalibrationMethod::Manual,
            degraded: false,
        }
    }

    #[test]
    fn test_pixel_to_court_applies_homography() {
        let cal = scale_calibration();
        let p = cal.pixel_to_court(Point2::new(100.0, 100.0)).unwrap();
        assert!((p.x - 1.0).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_to_court_rejects_line_at_infinity() {
        let mut cal = scale_calibration();
        cal.homography[2] = [1.0, 0.0, -100.0];
        assert!(cal.pixel_to_court(Point2::new(100.0, 5.0)).is_none());
    }

    #[test]
    fn test_singles_court_bounds() {
        assert!(Point2::new(court::CENTER_X, court::NET_Y).in_singles_court());
        assert!(Point2::new(court::SINGLES_LEFT, 0.0).in_singles_court());
        assert!(!Point2::new(0.5, 5.0).in_singles_court());
        assert!(!Point2::new(5.0, court::LENGTH + 0.1).in_singles_court());
    }
}
