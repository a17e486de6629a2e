//! Detection adapter: the seam between the pipeline and external models.
//!
//! The pipeline only depends on the traits in this module. Concrete model
//! runtimes live outside this crate; [`scripted`] provides deterministic
//! doubles and [`heuristic`] a model-free shot classifier.

pub mod adapter;
pub mod heuristic;
pub mod scripted;

use async_trait::async_trait;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tennis_models::{BoundingBox, CourtSide, Point2, PoseKeypoints, ScoredBox, ShotType};

use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

pub use adapter::{DetectionAdapter, FrameObservation, PlayerObservation};
pub use heuristic::HeuristicShotClassifier;
pub use scripted::{template_pose, ScriptedDetector, ScriptedShotClassifier};

/// Raw per-frame model output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameDetections {
    pub players: Vec<ScoredBox>,
    pub ball: Option<ScoredBox>,
}

/// Object and pose model.
#[async_trait]
pub trait DetectionModel: Send + Sync {
    /// Player boxes and at most one ball box for a frame.
    async fn detect(&self, frame: &Frame) -> VisionResult<FrameDetections>;

    /// Exactly `POSE_KEYPOINTS` keypoints for the player inside `bbox`.
    async fn pose(&self, frame: &Frame, bbox: &BoundingBox) -> VisionResult<PoseKeypoints>;
}

/// Classifier input for one contact.
#[derive(Debug, Clone)]
pub struct ShotFeatures {
    /// `window_len × (POSE_KEYPOINTS * 3)`: per keypoint x, y normalized to
    /// the player box, then score
    pub pose_window: Array2<f32>,
    /// Filtered ball pixel positions around the contact, oldest first
    pub trajectory: Vec<Point2>,
    /// Ball pixel position at contact
    pub ball_at_contact: Point2,
    pub player_bbox: BoundingBox,
    pub player_side: CourtSide,
    /// Player court position at contact
    pub contact_court: Option<Point2>,
    /// Ball speed right after contact
    pub ball_speed_mps: Option<f64>,
    /// Time since the previous contact by anyone
    pub secs_since_previous_contact: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotTypePrediction {
    pub shot_type: ShotType,
    pub confidence: f64,
}

impl ShotTypePrediction {
    pub fn new(shot_type: ShotType, confidence: f64) -> Self {
        Self {
            shot_type,
            confidence,
        }
    }

    pub fn validate(&self) -> VisionResult<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(VisionError::contract(format!(
                "shot confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Sequence classifier over a pose window and trajectory segment.
#[async_trait]
pub trait ShotClassifierModel: Send + Sync {
    async fn classify_shot(&self, features: &ShotFeatures) -> VisionResult<ShotTypePrediction>;
}

/// Model handles loaded once per process and shared read-only by every run.
#[derive(Clone)]
pub struct SharedModels {
    pub detector: Arc<dyn DetectionModel>,
    pub classifier: Arc<dyn ShotClassifierModel>,
}

impl SharedModels {
    pub fn new(detector: Arc<dyn DetectionModel>, classifier: Arc<dyn ShotClassifierModel>) -> Self {
        Self {
            detector,
            classifier,
        }
    }
}

impl std::fmt::Debug for SharedModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedModels").finish_non_exhaustive()
    }
}
