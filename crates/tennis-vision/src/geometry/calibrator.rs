//! Court calibration: corners → homography → inner-line check → confidence.

use image::RgbImage;
use rayon::prelude::*;
use std::sync::Arc;
use tennis_models::{court, CalibrationMethod, CourtCalibration, Point2};
use tracing::{debug, info, warn};

use super::homography::Homography;
use super::lines::{boundary_corners, court_boundary, detect_court_lines, DetectedLines};
use crate::config::CalibrationConfig;
use crate::error::{CalibrationError, CalibrationResult};

/// Court-space positions of the outer corners, matching `CourtCalibration::corners` order.
pub const COURT_CORNERS: [Point2; 4] = [
    Point2 { x: 0.0, y: 0.0 },
    Point2 {
        x: court::WIDTH,
        y: 0.0,
    },
    Point2 {
        x: court::WIDTH,
        y: court::LENGTH,
    },
    Point2 {
        x: 0.0,
        y: court::LENGTH,
    },
];

const FAR_SERVICE_Y: f64 = court::NET_Y - court::SERVICE_LINE_FROM_NET;
const NEAR_SERVICE_Y: f64 = court::NET_Y + court::SERVICE_LINE_FROM_NET;
const SINGLES_WIDTH: f64 = court::SINGLES_RIGHT - court::SINGLES_LEFT;

/// Inner court points a fit is checked against: each service line meets the
/// two singles sidelines and the centre service line.
pub const REFERENCE_POINTS: [Point2; 6] = [
    Point2 { x: court::SINGLES_LEFT, y: FAR_SERVICE_Y },
    Point2 { x: court::CENTER_X, y: FAR_SERVICE_Y },
    Point2 { x: court::SINGLES_RIGHT, y: FAR_SERVICE_Y },
    Point2 { x: court::SINGLES_LEFT, y: NEAR_SERVICE_Y },
    Point2 { x: court::CENTER_X, y: NEAR_SERVICE_Y },
    Point2 { x: court::SINGLES_RIGHT, y: NEAR_SERVICE_Y },
];

/// Ends of the far and near service lines in [`REFERENCE_POINTS`].
const SERVICE_LINES: [(usize, usize); 2] = [(0, 2), (3, 5)];

/// Calibration plus the error that forced degraded mode, if any.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub calibration: CourtCalibration,
    pub error: Option<CalibrationError>,
}

impl CalibrationOutcome {
    pub fn is_degraded(&self) -> bool {
        self.calibration.degraded
    }
}

/// Computes the pixel→court mapping for a video.
#[derive(Debug, Clone, Default)]
pub struct CourtCalibrator {
    config: CalibrationConfig,
}

impl CourtCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Calibrate from a single frame via line detection.
    pub fn calibrate(&self, image: &RgbImage) -> CalibrationResult<CourtCalibration> {
        let (width, height) = image.dimensions();
        let lines = detect_court_lines(image, &self.config);
        self.calibrate_lines(&lines, width, height)
    }

    /// Calibrate from already detected lines.
    ///
    /// The outer lines give the corners; the inner lines are checked against
    /// the fitted homography.
    pub fn calibrate_lines(
        &self,
        lines: &DetectedLines,
        width: u32,
        height: u32,
    ) -> CalibrationResult<CourtCalibration> {
        let boundary = court_boundary(lines, width, height);
        let corners = boundary_corners(&boundary, width, height);

        let found = corners.iter().flatten().count();
        match corners {
            [Some(a), Some(b), Some(c), Some(d)] => self.fit(
                [a, b, c, d],
                width,
                height,
                CalibrationMethod::LineDetection,
                Some(lines),
            ),
            _ => Err(CalibrationError::InsufficientCorners { found }),
        }
    }

    /// Calibrate several frames in parallel and keep the most confident result.
    ///
    /// On total failure returns the error that got furthest.
    pub fn calibrate_best(&self, images: &[Arc<RgbImage>]) -> CalibrationResult<CourtCalibration> {
        if images.is_empty() {
            return Err(CalibrationError::InsufficientCorners { found: 0 });
        }

        let results: Vec<CalibrationResult<CourtCalibration>> =
            images.par_iter().map(|img| self.calibrate(img)).collect();

        let mut best: Option<CourtCalibration> = None;
        let mut best_error: Option<CalibrationError> = None;
        for result in results {
            match result {
                Ok(cal) => {
                    if best.as_ref().map_or(true, |b| cal.confidence > b.confidence) {
                        best = Some(cal);
                    }
                }
                Err(err) => {
                    if best_error
                        .as_ref()
                        .map_or(true, |b| progress(&err) > progress(b))
                    {
                        best_error = Some(err);
                    }
                }
            }
        }

        match (best, best_error) {
            (Some(cal), _) => Ok(cal),
            (None, Some(err)) => Err(err),
            (None, None) => Err(CalibrationError::InsufficientCorners { found: 0 }),
        }
    }

    /// Build a calibration from four pixel corners
    /// (far-left, far-right, near-right, near-left).
    ///
    /// With no image evidence the corners are taken as given; only their
    /// shape limits the confidence.
    pub fn from_corners(
        &self,
        corners: [Point2; 4],
        width: u32,
        height: u32,
        method: CalibrationMethod,
    ) -> CalibrationResult<CourtCalibration> {
        self.fit(corners, width, height, method, None)
    }

    fn fit(
        &self,
        corners: [Point2; 4],
        width: u32,
        height: u32,
        method: CalibrationMethod,
        lines: Option<&DetectedLines>,
    ) -> CalibrationResult<CourtCalibration> {
        let area = quad_area(&corners);
        if !is_convex(&corners) {
            return Err(CalibrationError::degenerate("court corners do not form a convex quad"));
        }
        let frame_area = width as f64 * height as f64;
        if frame_area <= 0.0 || area / frame_area < self.config.min_area_fraction {
            return Err(CalibrationError::degenerate(format!(
                "court covers {:.1}% of the frame",
                if frame_area > 0.0 { 100.0 * area / frame_area } else { 0.0 }
            )));
        }

        let homography = Homography::estimate(&corners, &COURT_CORNERS)?;
        let court_to_pixel = homography
            .inverse()
            .ok_or_else(|| CalibrationError::degenerate("court homography is singular"))?;

        let evidence = lines.map(|lines| {
            ReferenceEvidence::collect(
                &homography,
                &court_to_pixel,
                lines,
                width,
                height,
                self.config.reference_match_radius_m,
            )
        });
        let corner_residual = homography.mean_reprojection_error(&corners, &COURT_CORNERS);
        let (error_m, support) = match &evidence {
            Some(e) => (e.error_m.unwrap_or(corner_residual), e.support()),
            None => (corner_residual, 1.0),
        };
        if error_m > self.config.reprojection_tolerance_m {
            return Err(CalibrationError::ReprojectionTooLarge {
                error_m,
                tolerance_m: self.config.reprojection_tolerance_m,
            });
        }

        let far_len = corners[0].distance(&corners[1]);
        let near_len = corners[3].distance(&corners[2]);
        let mut ratios = vec![court::WIDTH / far_len, court::WIDTH / near_len];
        ratios.extend(
            service_line_lengths(&court_to_pixel, evidence.as_ref())
                .into_iter()
                .map(|len| SINGLES_WIDTH / len),
        );
        let pixel_to_meter = ratios.iter().sum::<f64>() / ratios.len() as f64;

        // At the tolerance the fit is worth half a perfect one.
        let reprojection_quality =
            (1.0 - 0.5 * error_m / self.config.reprojection_tolerance_m).clamp(0.5, 1.0);
        // Camera sits behind the near baseline, so the far baseline should not look longer.
        let plausibility = if far_len <= near_len * 1.05 { 1.0 } else { 0.4 };
        let confidence = (support * reprojection_quality * plausibility).clamp(0.0, 1.0);
        let degraded = confidence < self.config.min_confidence;

        debug!(
            ?method,
            error_m,
            support,
            confidence,
            pixel_to_meter,
            "Solved court homography"
        );

        Ok(CourtCalibration {
            homography: homography.to_rows(),
            pixel_to_meter,
            corners,
            reprojection_error_m: error_m,
            confidence,
            method,
            degraded,
        })
    }

    /// Fixed-inset mapping used when calibration fails: the court is assumed
    /// to span 10%..90% of the frame in both directions.
    pub fn approximate(width: u32, height: u32) -> CourtCalibration {
        let (w, h) = (width.max(1) as f64, height.max(1) as f64);
        let corners = [
            Point2::new(0.1 * w, 0.1 * h),
            Point2::new(0.9 * w, 0.1 * h),
            Point2::new(0.9 * w, 0.9 * h),
            Point2::new(0.1 * w, 0.9 * h),
        ];
        let homography =
            Homography::estimate(&corners, &COURT_CORNERS).unwrap_or_else(|_| Homography::identity());
        CourtCalibration {
            homography: homography.to_rows(),
            pixel_to_meter: court::WIDTH / (0.8 * w),
            corners,
            reprojection_error_m: 0.0,
            confidence: 0.0,
            method: CalibrationMethod::Approximate,
            degraded: true,
        }
    }

    /// Calibrate the run: manual corners win, then line detection over the
    /// sample frames, then the approximate fallback.
    pub fn resolve(
        &self,
        manual_corners: Option<[Point2; 4]>,
        images: &[Arc<RgbImage>],
        width: u32,
        height: u32,
    ) -> CalibrationOutcome {
        let attempt = match manual_corners {
            Some(corners) => self.from_corners(corners, width, height, CalibrationMethod::Manual),
            None => self.calibrate_best(images),
        };

        match attempt {
            Ok(calibration) if !calibration.degraded => {
                info!(
                    method = ?calibration.method,
                    confidence = calibration.confidence,
                    "Court calibration accepted"
                );
                CalibrationOutcome {
                    calibration,
                    error: None,
                }
            }
            Ok(calibration) => {
                let error = CalibrationError::LowConfidence {
                    confidence: calibration.confidence,
                    threshold: self.config.min_confidence,
                };
                warn!(error = %error, "Court calibration below threshold, running degraded");
                CalibrationOutcome {
                    calibration,
                    error: Some(error),
                }
            }
            Err(error) => {
                warn!(error = %error, "Court calibration failed, using approximate mapping");
                CalibrationOutcome {
                    calibration: Self::approximate(width, height),
                    error: Some(error),
                }
            }
        }
    }
}

/// Detected line crossings matched to [`REFERENCE_POINTS`].
#[derive(Debug, Clone, Default)]
struct ReferenceEvidence {
    /// Pixel crossing seen for each reference point
    matched: [Option<Point2>; 6],
    /// Reference points that project inside the frame
    visible: usize,
    /// Mean court distance between matched crossings and their reference
    error_m: Option<f64>,
}

impl ReferenceEvidence {
    fn collect(
        pixel_to_court: &Homography,
        court_to_pixel: &Homography,
        lines: &DetectedLines,
        width: u32,
        height: u32,
        radius_m: f64,
    ) -> Self {
        let in_frame = |p: &Point2| {
            p.x >= 0.0 && p.x <= width as f64 && p.y >= 0.0 && p.y <= height as f64
        };
        let crossings: Vec<(Point2, Point2)> = lines
            .horizontal
            .iter()
            .flat_map(|h| lines.slanted.iter().filter_map(move |s| h.intersect(s)))
            .filter(|p| in_frame(p))
            .filter_map(|p| pixel_to_court.project(p).map(|c| (p, c)))
            .collect();

        let mut evidence = Self::default();
        let mut total = 0.0;
        let mut count = 0usize;
        for (i, reference) in REFERENCE_POINTS.iter().enumerate() {
            let Some(expected) = court_to_pixel.project(*reference) else {
                continue;
            };
            if !in_frame(&expected) {
                continue;
            }
            evidence.visible += 1;

            let nearest = crossings
                .iter()
                .map(|(pixel, at)| (*pixel, at.distance(reference)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((pixel, d)) = nearest.filter(|(_, d)| *d <= radius_m) {
                evidence.matched[i] = Some(pixel);
                total += d;
                count += 1;
            }
        }
        evidence.error_m = (count > 0).then(|| total / count as f64);
        evidence
    }

    /// Fraction of visible reference points backed by a detected crossing.
    fn support(&self) -> f64 {
        if self.visible == 0 {
            return 0.0;
        }
        self.matched.iter().flatten().count() as f64 / self.visible as f64
    }
}

/// Pixel lengths of the far and near service lines, measured where both ends
/// were detected and projected through the fit otherwise.
fn service_line_lengths(court_to_pixel: &Homography, evidence: Option<&ReferenceEvidence>) -> Vec<f64> {
    SERVICE_LINES
        .iter()
        .filter_map(|&(left, right)| {
            let measured = evidence.and_then(|e| e.matched[left].zip(e.matched[right]));
            let (a, b) = match measured {
                Some(ends) => ends,
                None => (
                    court_to_pixel.project(REFERENCE_POINTS[left])?,
                    court_to_pixel.project(REFERENCE_POINTS[right])?,
                ),
            };
            let len = a.distance(&b);
            (len > 0.0).then_some(len)
        })
        .collect()
}

/// How far a failed attempt got, for picking the most informative error.
fn progress(err: &CalibrationError) -> usize {
    match err {
        CalibrationError::InsufficientCorners { found } => *found,
        CalibrationError::DegenerateGeometry(_) => 4,
        CalibrationError::ReprojectionTooLarge { .. } => 5,
        CalibrationError::LowConfidence { .. } => 6,
    }
}

fn quad_area(c: &[Point2; 4]) -> f64 {
    let mut sum = 0.0;
    for i in 0..4 {
        let (a, b) = (c[i], c[(i + 1) % 4]);
        sum += a.x * b.y - b.x * a.y;
    }
    sum.abs() / 2.0
}

fn is_convex(c: &[Point2; 4]) -> bool {
    let mut sign = 0.0f64;
    for i in 0..4 {
        let (a, b, d) = (c[i], c[(i + 1) % 4], c[(i + 2) % 4]);
        let cross = (b.x - a.x) * (d.y - b.y) - (b.y - a.y) * (d.x - b.x);
        if cross.abs() < 1e-9 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::lines::CourtLine;
    use crate::geometry::overlay::{court_segments, draw_court, draw_segments};
    use image::Rgb;

    const W: u32 = 640;
    const H: u32 = 360;

    fn broadcast_corners() -> [Point2; 4] {
        [
            Point2::new(200.0, 60.0),
            Point2::new(440.0, 60.0),
            Point2::new(600.0, 330.0),
            Point2::new(40.0, 330.0),
        ]
    }

    fn court_to_pixel() -> Homography {
        Homography::estimate(&COURT_CORNERS, &broadcast_corners()).unwrap()
    }

    #[test]
    fn test_from_corners_maps_corners_to_court() {
        let cal = CourtCalibrator::default()
            .from_corners(broadcast_corners(), W, H, CalibrationMethod::Manual)
            .unwrap();
        assert!(!cal.degraded);
        assert!(cal.confidence > 0.9);
        let near_right = cal.pixel_to_court(Point2::new(600.0, 330.0)).unwrap();
        assert!(near_right.distance(&Point2::new(court::WIDTH, court::LENGTH)) < 1e-6);
        assert!(cal.pixel_to_meter > 0.0);
    }

    #[test]
    fn test_from_corners_rejects_self_intersecting_quad() {
        let mut corners = broadcast_corners();
        corners.swap(2, 3);
        let err = CourtCalibrator::default()
            .from_corners(corners, W, H, CalibrationMethod::Manual)
            .unwrap_err();
        assert!(matches!(err, CalibrationError::DegenerateGeometry(_)));
    }

    #[test]
    fn test_from_corners_rejects_tiny_court() {
        let corners = [
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(10.0, 20.0),
        ];
        assert!(CourtCalibrator::default()
            .from_corners(corners, W, H, CalibrationMethod::Manual)
            .is_err());
    }

    #[test]
    fn test_calibrate_from_drawn_court() {
        let (w, h) = (2 * W, 2 * H);
        let corners = broadcast_corners().map(|p| Point2::new(2.0 * p.x, 2.0 * p.y));
        let mut image = RgbImage::new(w, h);
        draw_court(&mut image, &Homography::estimate(&COURT_CORNERS, &corners).unwrap(), 3);

        let cal = CourtCalibrator::default().calibrate(&image).unwrap();
        assert_eq!(cal.method, CalibrationMethod::LineDetection);
        for (found, expected) in cal.corners.iter().zip(corners.iter()) {
            assert!(
                found.distance(expected) < 24.0,
                "corner {:?} too far from {:?}",
                found,
                expected
            );
        }
        assert!(cal.reprojection_error_m < 0.5);
        assert!(!cal.degraded);
    }

    /// Lines of a top-down court at 24 px/m with its far-left corner at
    /// (60, 5). `service_shift_m` moves both service lines towards the net.
    fn top_down_lines(service_shift_m: f64, with_inner: bool) -> DetectedLines {
        let x = |m: f64| CourtLine { r: 60.0 + 24.0 * m, theta_deg: 0.0 };
        let y = |m: f64| CourtLine { r: 5.0 + 24.0 * m, theta_deg: 90.0 };
        let mut lines = DetectedLines {
            horizontal: vec![y(0.0), y(court::LENGTH)],
            slanted: vec![x(0.0), x(court::WIDTH)],
        };
        if with_inner {
            lines.horizontal.extend([
                y(FAR_SERVICE_Y + service_shift_m),
                y(court::NET_Y),
                y(NEAR_SERVICE_Y - service_shift_m),
            ]);
            lines
                .slanted
                .extend([x(court::SINGLES_LEFT), x(court::CENTER_X), x(court::SINGLES_RIGHT)]);
        }
        lines
    }

    #[test]
    fn test_inner_lines_confirm_fit() {
        let cal = CourtCalibrator::default()
            .calibrate_lines(&top_down_lines(0.0, true), 400, 600)
            .unwrap();
        assert!(cal.reprojection_error_m < 1e-6);
        assert!((cal.confidence - 1.0).abs() < 1e-6);
        assert!(!cal.degraded);
        // Baselines and service lines agree on the scale.
        assert!((cal.pixel_to_meter - 1.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_inner_lines_off_the_fit_fail_reprojection() {
        let err = CourtCalibrator::default()
            .calibrate_lines(&top_down_lines(1.0, true), 400, 600)
            .unwrap_err();
        match err {
            CalibrationError::ReprojectionTooLarge { error_m, tolerance_m } => {
                assert!((error_m - 1.0).abs() < 1e-6);
                assert_eq!(tolerance_m, 0.5);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_outer_lines_alone_are_degraded() {
        let calibrator = CourtCalibrator::default();
        let cal = calibrator
            .calibrate_lines(&top_down_lines(0.0, false), 400, 600)
            .unwrap();
        assert_eq!(cal.confidence, 0.0);
        assert!(cal.degraded);

        // The same corners given by hand are trusted.
        let outcome = calibrator.resolve(Some(cal.corners), &[], 400, 600);
        assert!(!outcome.is_degraded());
    }

    #[test]
    fn test_inverted_perspective_is_degraded() {
        // Far baseline drawn longer than the near one.
        let corners = [
            Point2::new(20.0, 20.0),
            Point2::new(630.0, 100.0),
            Point2::new(420.0, 300.0),
            Point2::new(250.0, 340.0),
        ];
        let calibrator = CourtCalibrator::default();
        let cal = calibrator
            .from_corners(corners, W, H, CalibrationMethod::Manual)
            .unwrap();
        assert!(cal.confidence < 0.5);
        assert!(cal.degraded);

        let outcome = calibrator.resolve(Some(corners), &[], W, H);
        assert!(outcome.is_degraded());
        assert!(matches!(outcome.error, Some(CalibrationError::LowConfidence { .. })));
    }

    #[test]
    fn test_two_corners_falls_back_to_degraded_mapping() {
        let segments = court_segments();
        // Both baselines and the left doubles sideline only.
        let partial = [segments[0], segments[1], segments[2]];
        let mut image = RgbImage::new(W, H);
        draw_segments(&mut image, &court_to_pixel(), &partial, 3, Rgb([255, 255, 255]));

        let calibrator = CourtCalibrator::default();
        assert_eq!(
            calibrator.calibrate(&image),
            Err(CalibrationError::InsufficientCorners { found: 2 })
        );

        let outcome = calibrator.resolve(None, &[Arc::new(image)], W, H);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.calibration.method, CalibrationMethod::Approximate);
        assert_eq!(outcome.calibration.confidence, 0.0);
        assert_eq!(
            outcome.error,
            Some(CalibrationError::InsufficientCorners { found: 2 })
        );
    }

    #[test]
    fn test_blank_frames_report_no_corners() {
        let images = vec![Arc::new(RgbImage::new(W, H)); 3];
        assert_eq!(
            CourtCalibrator::default().calibrate_best(&images),
            Err(CalibrationError::InsufficientCorners { found: 0 })
        );
    }

    #[test]
    fn test_manual_corners_skip_detection() {
        let outcome =
            CourtCalibrator::default().resolve(Some(broadcast_corners()), &[], W, H);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.calibration.method, CalibrationMethod::Manual);
    }

    #[test]
    fn test_approximate_mapping() {
        let cal = CourtCalibrator::approximate(W, H);
        assert!(cal.degraded);
        let p = cal.pixel_to_court(Point2::new(0.1 * W as f64, 0.1 * H as f64)).unwrap();
        assert!(p.distance(&Point2::new(0.0, 0.0)) < 1e-6);
    }
}
