//! Aggregated match statistics.
//!
//! Everything here is derived from the shot/rally/point collections and is
//! regenerable. Maps are `BTreeMap` so serialization order is stable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{PlayerId, ServeType, ShotDirection, ShotType};

/// Match-level statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MatchStats {
    pub total_points: usize,
    pub total_rallies: usize,
    pub total_shots: usize,
    pub longest_rally: usize,
    pub average_rally_length: f64,

    /// Rally count per length bucket ("1-3", "4-6", "7-9", "10+")
    pub rally_length_distribution: BTreeMap<String, usize>,

    pub players: BTreeMap<PlayerId, PlayerStats>,

    /// Shots left out of distributions because of low classifier confidence
    pub excluded_low_confidence_shots: usize,

    /// Calibration was degraded; present results as provisional
    pub low_confidence: bool,

    /// Court positions can be trusted
    pub positional_reliable: bool,

    /// Ball detection rate cleared the reliability threshold
    pub ball_reliable: bool,

    pub highlights: Vec<HighlightCandidate>,
}

/// Per-player statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PlayerStats {
    pub points_won: usize,
    pub winners: usize,
    pub errors: usize,
    pub shots: usize,
    pub shot_types: BTreeMap<ShotType, usize>,
    pub directions: BTreeMap<ShotDirection, usize>,
    pub serve: ServeStats,

    /// Movement over tracked spans; `None` when the player was never tracked
    pub movement: Option<MovementStats>,

    /// Percentage of heatmap cells visited; `None` when positions are unreliable
    pub court_coverage_pct: Option<f64>,

    /// `None` when positions are unreliable
    pub heatmap: Option<Heatmap>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ServeStats {
    pub points_served: usize,
    pub points_won_on_serve: usize,
    pub first_serves_in: usize,
    /// First serves in / points served, 0-100
    pub first_serve_pct: Option<f64>,
    pub aces: usize,
    pub faults: usize,
    pub double_faults: usize,
    /// Serve speeds only count when the ball trajectory is reliable
    pub average_speed_mps: Option<f64>,
    pub max_speed_mps: Option<f64>,
    pub serve_types: BTreeMap<ServeType, usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MovementStats {
    pub distance_m: f64,
    pub max_speed_mps: f64,
    pub average_speed_mps: f64,
    /// Frames dropped because they fall inside a tracking gap
    pub excluded_frames: usize,
}

/// Occupancy grid over the court plus run-off margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Heatmap {
    pub columns: usize,
    pub rows: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Row-major, `rows` vectors of `columns` counts
    pub bins: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    Winner,
    Ace,
    Overhead,
    LongRally,
}

/// A time window worth clipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightCandidate {
    /// All kinds merged into this window
    pub kinds: Vec<HighlightKind>,
    pub start: f64,
    pub end: f64,
    /// Ranking score, higher is better
    pub score: f64,
    pub shot_ids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerId>,
}
