//! Court line detection over Canny edges.

use image::RgbImage;
use imageproc::edges::canny;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use tennis_models::Point2;
use tracing::debug;

use crate::config::CalibrationConfig;

/// A line in Hesse normal form: `x·cos θ + y·sin θ = r`, θ measured from the
/// x-axis to the line normal with y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourtLine {
    pub r: f64,
    pub theta_deg: f64,
}

impl CourtLine {
    fn from_polar(line: &PolarLine) -> Self {
        Self {
            r: line.r as f64,
            theta_deg: line.angle_in_degrees as f64,
        }
    }

    fn trig(&self) -> (f64, f64) {
        let t = self.theta_deg.to_radians();
        (t.cos(), t.sin())
    }

    /// y where the line crosses column `x`; `None` for vertical lines.
    pub fn y_at(&self, x: f64) -> Option<f64> {
        let (c, s) = self.trig();
        (s.abs() > 1e-6).then(|| (self.r - x * c) / s)
    }

    /// x where the line crosses row `y`; `None` for horizontal lines.
    pub fn x_at(&self, y: f64) -> Option<f64> {
        let (c, s) = self.trig();
        (c.abs() > 1e-6).then(|| (self.r - y * s) / c)
    }

    pub fn intersect(&self, other: &CourtLine) -> Option<Point2> {
        let (c1, s1) = self.trig();
        let (c2, s2) = other.trig();
        let det = c1 * s2 - s1 * c2;
        if det.abs() < 1e-6 {
            return None;
        }
        let x = (self.r * s2 - other.r * s1) / det;
        let y = (c1 * other.r - c2 * self.r) / det;
        Some(Point2::new(x, y))
    }
}

/// Detected lines split by orientation.
#[derive(Debug, Clone, Default)]
pub struct DetectedLines {
    /// Baselines, service lines and the net band
    pub horizontal: Vec<CourtLine>,
    /// Sidelines and the centre service line
    pub slanted: Vec<CourtLine>,
}

/// Outermost lines of the court; any may be missing.
#[derive(Debug, Clone, Default)]
pub struct CourtBoundary {
    pub far_baseline: Option<CourtLine>,
    pub near_baseline: Option<CourtLine>,
    pub left_sideline: Option<CourtLine>,
    pub right_sideline: Option<CourtLine>,
}

pub fn detect_court_lines(image: &RgbImage, config: &CalibrationConfig) -> DetectedLines {
    let gray = image::imageops::grayscale(image);
    let edges = canny(&gray, config.canny_low, config.canny_high);
    let options = LineDetectionOptions {
        vote_threshold: config.hough_vote_threshold,
        suppression_radius: config.hough_suppression_radius,
    };

    let mut lines = DetectedLines::default();
    for polar in detect_lines(&edges, options) {
        let line = CourtLine::from_polar(&polar);
        if (line.theta_deg - 90.0).abs() <= config.horizontal_tolerance_deg {
            lines.horizontal.push(line);
        } else {
            lines.slanted.push(line);
        }
    }

    debug!(
        horizontal = lines.horizontal.len(),
        slanted = lines.slanted.len(),
        "Detected court line candidates"
    );
    lines
}

/// Pick the outermost baselines and sidelines.
///
/// Sidelines closer than 10% of the frame width are treated as one line.
pub fn court_boundary(lines: &DetectedLines, width: u32, height: u32) -> CourtBoundary {
    let cx = width as f64 / 2.0;
    let min_separation = width as f64 * 0.1;

    let mut horizontals: Vec<(f64, CourtLine)> = lines
        .horizontal
        .iter()
        .filter_map(|l| l.y_at(cx).map(|y| (y, *l)))
        .collect();
    horizontals.sort_by(|a, b| a.0.total_cmp(&b.0));

    let far_baseline = horizontals.first().map(|(_, l)| *l);
    let near_baseline = match (horizontals.first(), horizontals.last()) {
        (Some(first), Some(last)) if last.0 - first.0 > height as f64 * 0.1 => Some(last.1),
        _ => None,
    };

    let mid_y = match (far_baseline, near_baseline) {
        (Some(f), Some(n)) => match (f.y_at(cx), n.y_at(cx)) {
            (Some(a), Some(b)) => (a + b) / 2.0,
            _ => height as f64 / 2.0,
        },
        _ => height as f64 / 2.0,
    };

    let mut sides: Vec<(f64, CourtLine)> = lines
        .slanted
        .iter()
        .filter_map(|l| l.x_at(mid_y).map(|x| (x, *l)))
        .collect();
    sides.sort_by(|a, b| a.0.total_cmp(&b.0));

    let left_sideline = sides.first().map(|(_, l)| *l);
    let right_sideline = match (sides.first(), sides.last()) {
        (Some(first), Some(last)) if last.0 - first.0 > min_separation => Some(last.1),
        _ => None,
    };

    CourtBoundary {
        far_baseline,
        near_baseline,
        left_sideline,
        right_sideline,
    }
}

/// Corner intersections in far-left, far-right, near-right, near-left order.
///
/// Intersections outside the frame (with a 5% margin) are discarded.
pub fn boundary_corners(boundary: &CourtBoundary, width: u32, height: u32) -> [Option<Point2>; 4] {
    let margin_x = width as f64 * 0.05;
    let margin_y = height as f64 * 0.05;
    let inside = |p: Point2| {
        p.x >= -margin_x
            && p.x <= width as f64 + margin_x
            && p.y >= -margin_y
            && p.y <= height as f64 + margin_y
    };
    let corner = |a: Option<CourtLine>, b: Option<CourtLine>| {
        a.zip(b)
            .and_then(|(a, b)| a.intersect(&b))
            .filter(|p| inside(*p))
    };

    [
        corner(boundary.far_baseline, boundary.left_sideline),
        corner(boundary.far_baseline, boundary.right_sideline),
        corner(boundary.near_baseline, boundary.right_sideline),
        corner(boundary.near_baseline, boundary.left_sideline),
    ]
}
