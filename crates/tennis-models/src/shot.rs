//! Shot events.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{PlayerId, Point2};

/// Stroke classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    Forehand,
    Backhand,
    Volley,
    Slice,
    DropShot,
    Overhead,
    Serve,
}

impl ShotType {
    pub const ALL: [ShotType; 7] = [
        ShotType::Forehand,
        ShotType::Backhand,
        ShotType::Volley,
        ShotType::Slice,
        ShotType::DropShot,
        ShotType::Overhead,
        ShotType::Serve,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShotType::Forehand => "forehand",
            ShotType::Backhand => "backhand",
            ShotType::Volley => "volley",
            ShotType::Slice => "slice",
            ShotType::DropShot => "drop_shot",
            ShotType::Overhead => "overhead",
            ShotType::Serve => "serve",
        }
    }

    pub fn is_serve(&self) -> bool {
        matches!(self, ShotType::Serve)
    }
}

/// Placement relative to the centre line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShotDirection {
    CrossCourt,
    DownTheLine,
    Unknown,
}

/// Result of a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    /// Landed in and was not returned
    Winner,
    /// Out of bounds or netted
    Error,
    InPlay,
}

impl ShotOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ShotOutcome::InPlay)
    }
}

/// Serve delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServeType {
    Flat,
    Slice,
    Kick,
}

/// A single racket contact. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShotEvent {
    /// Sequential ID within the video (1-indexed)
    pub id: u32,

    /// Contact time in seconds from the start of the video
    pub timestamp: f64,

    pub contact_frame: u64,

    pub player: PlayerId,

    /// Player track that owned the contact
    pub track_id: u32,

    pub shot_type: ShotType,

    pub direction: ShotDirection,

    pub outcome: ShotOutcome,

    /// Contact position in court metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_position: Option<Point2>,

    /// First bounce after contact, in court metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing: Option<Point2>,

    /// Classifier confidence in [0, 1]
    pub confidence: f64,

    /// Classifier confidence fell below the configured threshold
    pub low_confidence: bool,

    /// Peak ball speed shortly after contact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball_speed_mps: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve_type: Option<ServeType>,
}

impl ShotEvent {
    pub fn is_serve(&self) -> bool {
        self.shot_type.is_serve()
    }
}
