//! Contract enforcement and thresholding around a [`DetectionModel`].

use std::sync::Arc;
use tennis_models::{PoseKeypoints, ScoredBox};
use tracing::trace;

use super::DetectionModel;
use crate::config::DetectionConfig;
use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

/// A kept player detection with its pose.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerObservation {
    pub detection: ScoredBox,
    pub pose: Option<PoseKeypoints>,
}

/// Everything the trackers need from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub index: u64,
    pub timestamp: f64,
    pub players: Vec<PlayerObservation>,
    pub ball: Option<ScoredBox>,
}

/// Wraps a detection model with validation and confidence thresholds.
#[derive(Clone)]
pub struct DetectionAdapter {
    model: Arc<dyn DetectionModel>,
    config: DetectionConfig,
}

impl DetectionAdapter {
    pub fn new(model: Arc<dyn DetectionModel>, config: DetectionConfig) -> Self {
        Self { model, config }
    }

    /// Run detection and pose on one frame.
    ///
    /// Malformed model output is a [`VisionError::ModelContract`]; low
    /// confidence detections are dropped, not reported.
    pub async fn observe(&self, frame: &Frame) -> VisionResult<FrameObservation> {
        let raw = self.model.detect(frame).await?;

        for det in raw.players.iter().chain(raw.ball.iter()) {
            validate_box(frame.index, det)?;
        }

        let mut players: Vec<ScoredBox> = raw
            .players
            .into_iter()
            .filter(|p| p.confidence >= self.config.player_min_confidence)
            .collect();
        players.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        players.truncate(self.config.max_players_per_frame);

        let ball = raw
            .ball
            .filter(|b| b.confidence >= self.config.ball_min_confidence);

        let mut observations = Vec::with_capacity(players.len());
        for detection in players {
            let pose = self.model.pose(frame, &detection.bbox).await?;
            if !pose.is_well_formed() {
                return Err(VisionError::contract(format!(
                    "malformed pose keypoints at frame {}",
                    frame.index
                )));
            }
            observations.push(PlayerObservation {
                detection,
                pose: Some(pose),
            });
        }

        trace!(
            frame = frame.index,
            players = observations.len(),
            ball = ball.is_some(),
            "Observed frame"
        );

        Ok(FrameObservation {
            index: frame.index,
            timestamp: frame.timestamp,
            players: observations,
            ball,
        })
    }
}

fn validate_box(frame_index: u64, det: &ScoredBox) -> VisionResult<()> {
    if !det.bbox.is_well_formed() {
        return Err(VisionError::contract(format!(
            "malformed bounding box at frame {}: {:?}",
            frame_index, det.bbox
        )));
    }
    if !det.confidence.is_finite() || !(0.0..=1.0).contains(&det.confidence) {
        return Err(VisionError::contract(format!(
            "detection confidence {} outside [0, 1] at frame {}",
            det.confidence, frame_index
        )));
    }
    Ok(())
}
