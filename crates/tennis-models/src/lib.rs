//! Shared data models for the tennis match analytics pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs and match metadata
//! - Court calibration and geometry primitives
//! - Player/ball detections and tracks
//! - Shot events, rallies and points
//! - Aggregated match statistics and the final analytics record

pub mod detection;
pub mod geometry;
pub mod job;
pub mod metadata;
pub mod rally;
pub mod result;
pub mod shot;
pub mod stats;
pub mod track;

// Re-export common types
pub use detection::{keypoint, BoundingBox, Keypoint, PoseKeypoints, ScoredBox, POSE_KEYPOINTS};
pub use geometry::{court, CalibrationMethod, CourtCalibration, Point2};
pub use job::{AnalysisJob, JobId, JobState, MatchId};
pub use metadata::{CourtSurface, MatchMetadata};
pub use rally::{Point, Rally, RallyEnd, ServeOutcome};
pub use result::{AnalyticsResult, Degradation, PlayerTrackSummary};
pub use shot::{ServeType, ShotDirection, ShotEvent, ShotOutcome, ShotType};
pub use stats::{
    HighlightCandidate, HighlightKind, Heatmap, MatchStats, MovementStats, PlayerStats,
    ServeStats,
};
pub use track::{
    BallSample, BallTrajectory, CourtSide, PlayerFrame, PlayerId, PlayerTrack, TrackState,
    TrackingGap, TrackingSubject,
};
