//! Player and ball track models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{court, BoundingBox, Point2, PoseKeypoints};

/// Which half of the court a player occupies, relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourtSide {
    Near,
    Far,
}

impl CourtSide {
    /// Side of a court-space point; the net line itself counts as near.
    pub fn of(point: &Point2) -> Self {
        if point.y >= court::NET_Y {
            CourtSide::Near
        } else {
            CourtSide::Far
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            CourtSide::Near => CourtSide::Far,
            CourtSide::Far => CourtSide::Near,
        }
    }
}

/// Stable player identity for the whole video.
///
/// Player one is whoever is first seen on the near side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerId {
    One,
    Two,
}

impl PlayerId {
    pub fn opponent(&self) -> Self {
        match self {
            PlayerId::One => PlayerId::Two,
            PlayerId::Two => PlayerId::One,
        }
    }

    pub fn for_initial_side(side: CourtSide) -> Self {
        match side {
            CourtSide::Near => PlayerId::One,
            CourtSide::Far => PlayerId::Two,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerId::One => "player_one",
            PlayerId::Two => "player_two",
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-track occlusion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Matched this frame or recently
    #[default]
    Active,
    /// Missed for several frames, kept for re-acquisition
    Stale,
    /// Matched again after being stale; becomes active on the next match
    Reacquired,
    /// Unmatched for too long; no further updates
    Lost,
}

/// One observed frame of a player track.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlayerFrame {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Foot point in pixels
    pub pixel: Point2,
    /// Smoothed court position in metres
    pub court: Point2,
    pub bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseKeypoints>,
    /// Court velocity in m/s
    pub velocity: Point2,
    pub speed_mps: f64,
    /// Distance travelled since the track started, excluding gaps
    pub cumulative_distance_m: f64,
}

/// A persistent player track.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlayerTrack {
    pub track_id: u32,
    pub player: PlayerId,
    pub side: CourtSide,
    pub state: TrackState,
    pub frames: Vec<PlayerFrame>,
    pub total_distance_m: f64,
    pub reacquisitions: u32,
}

impl PlayerTrack {
    /// Latest observed frame at or before `frame_index`.
    pub fn frame_at_or_before(&self, frame_index: u64) -> Option<&PlayerFrame> {
        let idx = self
            .frames
            .partition_point(|f| f.frame_index <= frame_index);
        idx.checked_sub(1).map(|i| &self.frames[i])
    }

    pub fn last_frame(&self) -> Option<&PlayerFrame> {
        self.frames.last()
    }
}

/// What a tracking gap refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackingSubject {
    Players,
    Ball,
}

impl fmt::Display for TrackingSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingSubject::Players => f.write_str("players"),
            TrackingSubject::Ball => f.write_str("ball"),
        }
    }
}

/// Inclusive frame span where tracking was lost beyond tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackingGap {
    pub subject: TrackingSubject,
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: f64,
    pub end_time: f64,
}

impl TrackingGap {
    pub fn contains(&self, frame_index: u64) -> bool {
        frame_index >= self.start_frame && frame_index <= self.end_frame
    }

    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }
}

/// One frame of the ball trajectory.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BallSample {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Raw detection centre, if the detector saw the ball
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Point2>,
    /// Filtered pixel position; `None` while the track is lost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point2>,
    /// Filtered pixel velocity, px/frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Point2>,
    /// Ground projection in court metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_position: Option<Point2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    /// Reconstructed by the filter rather than observed
    pub interpolated: bool,
    pub bounce: bool,
}

/// Whole-video ball trajectory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BallTrajectory {
    pub samples: Vec<BallSample>,
    /// Fraction of frames with a raw detection
    pub detection_rate: f64,
    /// False when the detection rate is below the configured minimum
    pub reliable: bool,
    pub gaps: Vec<TrackingGap>,
}

impl BallTrajectory {
    pub fn bounces(&self) -> impl Iterator<Item = &BallSample> {
        self.samples.iter().filter(|s| s.bounce)
    }
}
