//! Geometry module: pixel→court mapping computed once per video.

pub mod calibrator;
pub mod homography;
pub mod lines;
pub mod overlay;

pub use calibrator::{CalibrationOutcome, CourtCalibrator, COURT_CORNERS, REFERENCE_POINTS};
pub use homography::Homography;
pub use lines::{CourtBoundary, CourtLine, DetectedLines};
