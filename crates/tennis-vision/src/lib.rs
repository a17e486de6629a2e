#![deny(unreachable_patterns)]
//! Vision stages of the tennis analytics pipeline.
//!
//! This crate provides:
//! - Court line detection and pixel→court homography calibration
//! - The detection adapter seam around external player/ball/pose models
//! - Player tracking with occlusion-aware re-acquisition
//! - Kalman-filtered ball tracking with gap handling and bounce detection
//! - Contact detection and shot classification

pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod shots;
pub mod tracking;

pub use config::{
    BallTrackerConfig, CalibrationConfig, DetectionConfig, PlayerTrackerConfig, ShotConfig,
};
pub use detection::{
    DetectionAdapter, DetectionModel, FrameDetections, FrameObservation, HeuristicShotClassifier,
    PlayerObservation, SharedModels, ShotClassifierModel, ShotFeatures, ShotTypePrediction,
};
pub use error::{
    CalibrationError, CalibrationResult, DecodeError, TrackingGapError, VisionError, VisionResult,
};
pub use frame::{Frame, FrameSource, VecFrameSource};
pub use geometry::{CourtCalibrator, Homography};
pub use shots::{ShotDetector, ShotDetectorOutput};
pub use tracking::{BallTracker, KalmanFilter2D, PlayerTracker, PlayerTrackingOutput};
