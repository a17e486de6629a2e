//! A short scripted match for self-checks and end-to-end tests.
//!
//! Two points on a top-down court view, 200 frames at 25 fps:
//! 1. the near player serves an ace into the far service box
//! 2. the near player serves again, the far player returns a cross-court
//!    forehand winner that bounces deep on the near side
//!
//! The ball is out of view between the points, which shows up as one ball
//! tracking gap.

use std::sync::Arc;

use image::RgbImage;
use tennis_models::{court, AnalysisJob, BoundingBox, MatchMetadata, Point2, ScoredBox, ShotType};
use tennis_vision::detection::{ScriptedDetector, ScriptedShotClassifier};
use tennis_vision::geometry::overlay::draw_court;
use tennis_vision::{FrameDetections, Homography, SharedModels, ShotTypePrediction, VecFrameSource};

pub const FPS: f64 = 25.0;
pub const FRAME_COUNT: u64 = 200;
pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 480;

/// Court outline in pixels: far-left, far-right, near-right, near-left.
pub const COURT_CORNERS_PX: [Point2; 4] = [
    Point2 { x: 100.0, y: 20.0 },
    Point2 { x: 300.0, y: 20.0 },
    Point2 { x: 300.0, y: 454.0 },
    Point2 { x: 100.0, y: 454.0 },
];

/// Server, standing behind the near baseline.
const NEAR_PLAYER: BoundingBox = BoundingBox {
    x: 188.0,
    y: 407.0,
    width: 24.0,
    height: 60.0,
};

const FAR_PLAYER: BoundingBox = BoundingBox {
    x: 183.0,
    y: 8.0,
    width: 16.0,
    height: 30.0,
};

/// Ball keyframes `(frame, x, y)` in pixels, linearly interpolated.
/// Contacts: 10, 150 (serves), 170 (return). Bounces: 24, 161, 185.
const BALL_PATH: [&[(u64, f64, f64)]; 2] = [
    &[
        (0, 210.0, 380.0),
        (10, 210.0, 420.0),
        (20, 180.0, 120.0),
        (24, 173.0, 200.0),
        (30, 160.0, 80.0),
    ],
    &[
        (140, 210.0, 380.0),
        (150, 210.0, 420.0),
        (158, 190.0, 140.0),
        (161, 186.0, 200.0),
        (170, 198.0, 26.0),
        (185, 240.0, 330.0),
        (191, 250.0, 210.0),
    ],
];

/// Everything needed to run the scripted match.
pub struct SyntheticMatch {
    pub job: AnalysisJob,
    pub models: SharedModels,
    image: RgbImage,
}

impl SyntheticMatch {
    /// Match with manual court corners, so calibration is exact.
    pub fn new(match_id: &str) -> Self {
        let metadata = MatchMetadata::new(match_id).with_court_corners(COURT_CORNERS_PX);
        Self::with_metadata(metadata)
    }

    /// Same footage and script under caller-supplied metadata.
    pub fn with_metadata(metadata: MatchMetadata) -> Self {
        let detector = ScriptedDetector::new(script());
        let classifier = ScriptedShotClassifier::new(vec![
            ShotTypePrediction::new(ShotType::Serve, 0.95),
            ShotTypePrediction::new(ShotType::Serve, 0.95),
            ShotTypePrediction::new(ShotType::Forehand, 0.9),
        ]);

        Self {
            job: AnalysisJob::new(metadata),
            models: SharedModels::new(Arc::new(detector), Arc::new(classifier)),
            image: court_image(),
        }
    }

    /// A fresh frame source over the whole match.
    pub fn source(&self) -> VecFrameSource {
        VecFrameSource::repeat(FPS, self.image.clone(), FRAME_COUNT)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Court-metre to pixel mapping for the drawn court.
pub fn court_to_pixel() -> Homography {
    let [far_left, far_right, _, near_left] = COURT_CORNERS_PX;
    let sx = (far_right.x - far_left.x) / court::WIDTH;
    let sy = (near_left.y - far_left.y) / court::LENGTH;
    Homography::from_rows([
        [sx, 0.0, far_left.x],
        [0.0, sy, far_left.y],
        [0.0, 0.0, 1.0],
    ])
}

fn court_image() -> RgbImage {
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, image::Rgb([40, 110, 60]));
    draw_court(&mut image, &court_to_pixel(), 2);
    image
}

fn script() -> Vec<FrameDetections> {
    (0..FRAME_COUNT)
        .map(|frame| FrameDetections {
            players: vec![
                ScoredBox::new(NEAR_PLAYER, 0.92),
                ScoredBox::new(FAR_PLAYER, 0.88),
            ],
            ball: ball_at(frame).map(|p| {
                ScoredBox::new(BoundingBox::new(p.x - 2.0, p.y - 2.0, 4.0, 4.0), 0.8)
            }),
        })
        .collect()
}

fn ball_at(frame: u64) -> Option<Point2> {
    BALL_PATH.iter().find_map(|path| {
        path.windows(2).find_map(|pair| {
            let ((f0, x0, y0), (f1, x1, y1)) = (pair[0], pair[1]);
            if frame < f0 || frame > f1 {
                return None;
            }
            let t = (frame - f0) as f64 / (f1 - f0) as f64;
            Some(Point2::new(x0 + t * (x1 - x0), y0 + t * (y1 - y0)))
        })
    })
}
