//! The atomic analytics record handed to the persistence layer.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    CourtCalibration, CourtSide, JobId, MatchId, MatchStats, PlayerId, Point, Rally, ShotEvent,
    TrackState, TrackingGap,
};

/// A recoverable problem that lowered confidence in part of the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Court calibration failed or scored below threshold
    Calibration { reason: String, confidence: f64 },
    /// Player or ball tracking lost beyond tolerance
    TrackingGap { gap: TrackingGap },
    /// Ball seen in too few frames
    LowBallDetectionRate { rate: f64 },
}

/// Per-track summary kept in the result instead of full per-frame data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlayerTrackSummary {
    pub track_id: u32,
    pub player: PlayerId,
    pub side: CourtSide,
    pub final_state: TrackState,
    pub frames_observed: usize,
    pub total_distance_m: f64,
    pub reacquisitions: u32,
}

/// Complete output of one successful run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsResult {
    pub job_id: JobId,
    pub match_id: MatchId,
    pub stats: MatchStats,
    pub shots: Vec<ShotEvent>,
    pub rallies: Vec<Rally>,
    pub points: Vec<Point>,
    pub calibration: CourtCalibration,
    pub degradations: Vec<Degradation>,
    pub players: Vec<PlayerTrackSummary>,
    pub frames_processed: u64,
    pub fps: f64,
    pub processed_at: DateTime<Utc>,
}

impl AnalyticsResult {
    /// Result should be presented as provisional.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty() || self.stats.low_confidence
    }
}
