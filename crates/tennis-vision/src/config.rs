//! Per-stage configuration for the vision pipeline.
//!
//! Every struct deserializes with defaults for missing fields so a pipeline
//! config file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

/// Court calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Below this confidence the run is marked degraded (default: 0.5)
    pub min_confidence: f64,

    /// Maximum mean reprojection error of reference points, metres (default: 0.5)
    pub reprojection_tolerance_m: f64,

    /// A detected line crossing further than this from a reference point does
    /// not count as seeing it, metres (default: 2.0)
    pub reference_match_radius_m: f64,

    /// Frames from the start of the video used for calibration (default: 5)
    pub sample_frames: usize,

    /// Canny hysteresis thresholds (default: 50 / 150)
    pub canny_low: f32,
    pub canny_high: f32,

    /// Hough accumulator votes for a line (default: 120)
    pub hough_vote_threshold: u32,

    /// Hough non-maximum suppression radius (default: 8)
    pub hough_suppression_radius: u32,

    /// Lines within this many degrees of horizontal are baselines/service lines (default: 12)
    pub horizontal_tolerance_deg: f64,

    /// Minimum court quad area as a fraction of the frame (default: 0.05)
    pub min_area_fraction: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            reprojection_tolerance_m: 0.5,
            reference_match_radius_m: 2.0,
            sample_frames: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_threshold: 120,
            hough_suppression_radius: 8,
            horizontal_tolerance_deg: 12.0,
            min_area_fraction: 0.05,
        }
    }
}

/// Detection adapter thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum player box confidence (default: 0.5)
    pub player_min_confidence: f64,

    /// Minimum ball box confidence (default: 0.3)
    pub ball_min_confidence: f64,

    /// Player boxes kept per frame, highest confidence first (default: 4)
    pub max_players_per_frame: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            player_min_confidence: 0.5,
            ball_min_confidence: 0.3,
            max_players_per_frame: 4,
        }
    }
}

/// Player tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTrackerConfig {
    /// Fastest plausible player speed, m/s (default: 9.0)
    pub max_speed_mps: f64,

    /// Extra association radius for detection jitter, metres (default: 1.0)
    pub association_slack_m: f64,

    /// Exponential smoothing factor for court position, 0..1 (default: 0.6)
    pub smoothing_alpha: f64,

    /// Consecutive misses before a track goes stale (default: 5)
    pub stale_after_frames: u32,

    /// Consecutive misses before a stale track is lost (default: 150)
    pub lost_after_frames: u32,

    /// Cap on the extrapolated re-acquisition window, metres (default: 6.0)
    pub max_reacquire_radius_m: f64,

    /// Consecutive frames across the net before a track changes side (default: 15)
    pub side_transition_frames: u32,

    /// Both tracks stale for longer than this reports a tracking gap (default: 30)
    pub both_stale_gap_frames: u32,
}

impl Default for PlayerTrackerConfig {
    fn default() -> Self {
        Self {
            max_speed_mps: 9.0,
            association_slack_m: 1.0,
            smoothing_alpha: 0.6,
            stale_after_frames: 5,
            lost_after_frames: 150,
            max_reacquire_radius_m: 6.0,
            side_transition_frames: 15,
            both_stale_gap_frames: 30,
        }
    }
}

/// Ball tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallTrackerConfig {
    /// Standard deviation of raw detections, pixels (default: 3.0)
    pub measurement_noise_px: f64,

    /// Acceleration noise of the constant-velocity model, px/frame² (default: 2.0)
    pub process_noise: f64,

    /// Initial velocity variance for a fresh track (default: 400.0)
    pub initial_velocity_variance: f64,

    /// Longest run of missing detections filled by prediction (default: 8)
    pub max_gap_frames: u32,

    /// Innovation beyond this many sigmas is treated as a hit/bounce (default: 4.0)
    pub maneuver_gate_sigmas: f64,

    /// Filtered position stays within this many measurement sigmas of the raw detection (default: 3.0)
    pub max_correction_sigmas: f64,

    /// Frames either side of a bounce candidate checked for reversal (default: 3)
    pub bounce_window: usize,

    /// Minimum vertical travel on each side of a reversal, pixels (default: 4.0)
    pub min_reversal_px: f64,

    /// Below this detection rate ball stats are unreliable (default: 0.3)
    pub min_detection_rate: f64,
}

impl Default for BallTrackerConfig {
    fn default() -> Self {
        Self {
            measurement_noise_px: 3.0,
            process_noise: 2.0,
            initial_velocity_variance: 400.0,
            max_gap_frames: 8,
            maneuver_gate_sigmas: 4.0,
            max_correction_sigmas: 3.0,
            bounce_window: 3,
            min_reversal_px: 4.0,
            min_detection_rate: 0.3,
        }
    }
}

/// Contact detection and shot classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotConfig {
    /// Frames before/after a sample used to measure direction change (default: 3)
    pub deflection_span: usize,

    /// Minimum velocity direction change for a contact, degrees (default: 45)
    pub min_deflection_deg: f64,

    /// Reach envelope radius as a fraction of player box height (default: 0.6)
    pub reach_scale: f64,

    /// Minimum keypoint score for a wrist to define the reach envelope (default: 0.3)
    pub pose_min_score: f64,

    /// Contacts closer than this many frames are merged (default: 10)
    pub contact_nms_frames: u64,

    /// Pose frames before the contact fed to the classifier (default: 15)
    pub frames_before: usize,

    /// Pose frames after the contact fed to the classifier (default: 15)
    pub frames_after: usize,

    /// Classifier confidence below this is flagged low-confidence (default: 0.5)
    pub low_confidence_threshold: f64,

    /// Lateral travel across the centre line for cross-court, metres (default: 1.0)
    pub cross_court_min_m: f64,

    /// Maximum angle to the centre line for down-the-line, degrees (default: 12)
    pub down_the_line_max_deg: f64,

    /// Bounces this close to a contact are ignored, frames (default: 3)
    pub contact_exclusion_frames: u64,

    /// Time without a return before a shot is considered unanswered, seconds (default: 4.0)
    pub rally_timeout_secs: f64,

    /// Window after contact used for ball speed, frames (default: 6)
    pub speed_window_frames: usize,
}

impl Default for ShotConfig {
    fn default() -> Self {
        Self {
            deflection_span: 3,
            min_deflection_deg: 45.0,
            reach_scale: 0.6,
            pose_min_score: 0.3,
            contact_nms_frames: 10,
            frames_before: 15,
            frames_after: 15,
            low_confidence_threshold: 0.5,
            cross_court_min_m: 1.0,
            down_the_line_max_deg: 12.0,
            contact_exclusion_frames: 3,
            rally_timeout_secs: 4.0,
            speed_window_frames: 6,
        }
    }
}

impl ShotConfig {
    /// Total pose window length.
    pub fn window_len(&self) -> usize {
        self.frames_before + 1 + self.frames_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: BallTrackerConfig = serde_json::from_str(r#"{"max_gap_frames": 12}"#).unwrap();
        assert_eq!(cfg.max_gap_frames, 12);
        assert_eq!(cfg.bounce_window, BallTrackerConfig::default().bounce_window);
    }

    #[test]
    fn test_window_len() {
        let cfg = ShotConfig {
            frames_before: 4,
            frames_after: 2,
            ..Default::default()
        };
        assert_eq!(cfg.window_len(), 7);
    }
}
