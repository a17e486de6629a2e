//! Model-free shot classifier.
//!
//! Rules, checked in order:
//! - ball above the head, first contact after a pause, player behind the baseline → serve
//! - ball above the head → overhead
//! - player within 3 m of the net → volley
//! - slow ball after contact → drop shot
//! - otherwise forehand/backhand from the ball's side of the body, assuming a
//!   right-handed player (far-side players face the camera, so sides flip)

use async_trait::async_trait;
use tennis_models::{court, CourtSide, ShotType};

use super::{ShotClassifierModel, ShotFeatures, ShotTypePrediction};
use crate::error::VisionResult;

#[derive(Debug, Clone)]
pub struct HeuristicShotClassifier {
    /// Head line as a fraction of box height from the top
    pub head_fraction: f64,
    /// Minimum pause before a serve, seconds
    pub serve_pause_secs: f64,
    /// Distance from the baseline still counted as behind it, metres
    pub baseline_margin_m: f64,
    /// Distance from the net for volleys, metres
    pub volley_distance_m: f64,
    /// Ball speed below which a groundstroke is a drop shot, m/s
    pub drop_shot_max_speed_mps: f64,
}

impl Default for HeuristicShotClassifier {
    fn default() -> Self {
        Self {
            head_fraction: 0.15,
            serve_pause_secs: 2.5,
            baseline_margin_m: 1.5,
            volley_distance_m: 3.0,
            drop_shot_max_speed_mps: 8.0,
        }
    }
}

impl HeuristicShotClassifier {
    pub fn classify(&self, f: &ShotFeatures) -> ShotTypePrediction {
        let head_y = f.player_bbox.y + self.head_fraction * f.player_bbox.height;
        let above_head = f.ball_at_contact.y < head_y;
        let after_pause = f
            .secs_since_previous_contact
            .map_or(true, |s| s >= self.serve_pause_secs);
        let behind_baseline = f.contact_court.map_or(true, |c| {
            c.y <= self.baseline_margin_m || c.y >= court::LENGTH - self.baseline_margin_m
        });

        if above_head && after_pause && behind_baseline {
            return ShotTypePrediction::new(ShotType::Serve, 0.85);
        }
        if above_head {
            return ShotTypePrediction::new(ShotType::Overhead, 0.75);
        }
        if let Some(c) = f.contact_court {
            if (c.y - court::NET_Y).abs() < self.volley_distance_m {
                return ShotTypePrediction::new(ShotType::Volley, 0.7);
            }
        }
        if f
            .ball_speed_mps
            .is_some_and(|s| s < self.drop_shot_max_speed_mps)
        {
            return ShotTypePrediction::new(ShotType::DropShot, 0.55);
        }

        let ball_right_of_body = f.ball_at_contact.x >= f.player_bbox.cx();
        let forehand = match f.player_side {
            CourtSide::Near => ball_right_of_body,
            CourtSide::Far => !ball_right_of_body,
        };
        if forehand {
            ShotTypePrediction::new(ShotType::Forehand, 0.7)
        } else {
            ShotTypePrediction::new(ShotType::Backhand, 0.7)
        }
    }
}

#[async_trait]
impl ShotClassifierModel for HeuristicShotClassifier {
    async fn classify_shot(&self, features: &ShotFeatures) -> VisionResult<ShotTypePrediction> {
        Ok(self.classify(features))
    }
}
