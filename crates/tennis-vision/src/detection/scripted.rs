//! Deterministic model doubles with canned outputs.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tennis_models::{keypoint, BoundingBox, Keypoint, PoseKeypoints, ShotType, POSE_KEYPOINTS};

use super::{DetectionModel, FrameDetections, ShotClassifierModel, ShotFeatures, ShotTypePrediction};
use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

/// Detector replaying a per-frame script indexed by frame number.
///
/// Frames past the end of the script have no detections. Poses are a
/// standing template fitted to the box unless overridden.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: Vec<FrameDetections>,
    pose_overrides: HashMap<u64, PoseKeypoints>,
    fail_at: Option<u64>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<FrameDetections>) -> Self {
        Self {
            script,
            pose_overrides: HashMap::new(),
            fail_at: None,
        }
    }

    /// Use `pose` for every player in frame `index`.
    pub fn with_pose(mut self, index: u64, pose: PoseKeypoints) -> Self {
        self.pose_overrides.insert(index, pose);
        self
    }

    /// Report a model failure on frame `index`.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

#[async_trait]
impl DetectionModel for ScriptedDetector {
    async fn detect(&self, frame: &Frame) -> VisionResult<FrameDetections> {
        if self.fail_at == Some(frame.index) {
            return Err(VisionError::model(format!(
                "scripted failure at frame {}",
                frame.index
            )));
        }
        Ok(usize::try_from(frame.index)
            .ok()
            .and_then(|i| self.script.get(i))
            .cloned()
            .unwrap_or_default())
    }

    async fn pose(&self, frame: &Frame, bbox: &BoundingBox) -> VisionResult<PoseKeypoints> {
        Ok(self
            .pose_overrides
            .get(&frame.index)
            .cloned()
            .unwrap_or_else(|| template_pose(bbox)))
    }
}

/// Standing pose fitted to a player box, arms slightly out.
pub fn template_pose(bbox: &BoundingBox) -> PoseKeypoints {
    let (y, w, h) = (bbox.y, bbox.width, bbox.height);
    let cx = bbox.cx();
    let at = |dx: f64, dy: f64| Keypoint::new(cx + dx * w, y + dy * h, 0.9);

    let mut points = [Keypoint::default(); POSE_KEYPOINTS];
    points[keypoint::NOSE] = at(0.0, 0.08);
    points[1] = at(-0.05, 0.06);
    points[2] = at(0.05, 0.06);
    points[3] = at(-0.1, 0.07);
    points[4] = at(0.1, 0.07);
    points[keypoint::LEFT_SHOULDER] = at(-0.2, 0.22);
    points[keypoint::RIGHT_SHOULDER] = at(0.2, 0.22);
    points[keypoint::LEFT_ELBOW] = at(-0.3, 0.38);
    points[keypoint::RIGHT_ELBOW] = at(0.3, 0.38);
    points[keypoint::LEFT_WRIST] = at(-0.4, 0.5);
    points[keypoint::RIGHT_WRIST] = at(0.4, 0.5);
    points[keypoint::LEFT_HIP] = at(-0.15, 0.55);
    points[keypoint::RIGHT_HIP] = at(0.15, 0.55);
    points[13] = at(-0.15, 0.75);
    points[14] = at(0.15, 0.75);
    points[keypoint::LEFT_ANKLE] = at(-0.15, 0.97);
    points[keypoint::RIGHT_ANKLE] = at(0.15, 0.97);

    PoseKeypoints::new(points)
}

/// Classifier returning canned predictions in call order.
#[derive(Debug)]
pub struct ScriptedShotClassifier {
    predictions: Mutex<VecDeque<ShotTypePrediction>>,
    fallback: ShotTypePrediction,
}

impl ScriptedShotClassifier {
    pub fn new(predictions: Vec<ShotTypePrediction>) -> Self {
        Self {
            predictions: Mutex::new(predictions.into()),
            fallback: ShotTypePrediction::new(ShotType::Forehand, 0.9),
        }
    }

    /// Prediction used once the script runs out.
    pub fn with_fallback(mut self, fallback: ShotTypePrediction) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl ShotClassifierModel for ScriptedShotClassifier {
    async fn classify_shot(&self, _features: &ShotFeatures) -> VisionResult<ShotTypePrediction> {
        let mut queue = self
            .predictions
            .lock()
            .map_err(|_| VisionError::internal("scripted classifier lock poisoned"))?;
        Ok(queue.pop_front().unwrap_or(self.fallback))
    }
}
