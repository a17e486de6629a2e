//! Rallies and points.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{PlayerId, ServeType};

/// Why a rally closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RallyEnd {
    /// Last shot was a winner
    Winner,
    /// Last shot was an error
    Error,
    /// No shot arrived within the inter-shot gap
    Timeout,
    /// A new serve arrived while the rally was still open
    InterruptedByServe,
    /// The video ended with the rally open
    StreamEnd,
}

/// Continuous exchange of shots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rally {
    /// Sequential ID (1-indexed)
    pub id: u32,

    /// Point this rally belongs to
    pub point_id: u32,

    /// Shot IDs in time order
    pub shot_ids: Vec<u32>,

    pub start_time: f64,
    pub end_time: f64,

    /// Shot count
    pub length: usize,

    pub end: RallyEnd,

    /// The rally did not open with a serve
    pub serve_missing: bool,

    /// Second serve continuing the previous rally's point
    pub continues_point: bool,

    /// Shots hit by the same player as the preceding shot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_alternating: Vec<u32>,
}

/// How the serve of a point resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServeOutcome {
    /// Returned
    In,
    /// Unreturned, landed in
    Ace,
    /// Single fault followed by a second serve
    Fault,
    DoubleFault,
    #[default]
    Unknown,
}

/// Scoring unit made of one or more rallies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    /// Sequential ID (1-indexed)
    pub id: u32,

    pub rally_ids: Vec<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<PlayerId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,

    /// Winner derived from the last hitter rather than a terminal shot
    pub winner_inferred: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub serve_type: Option<ServeType>,

    pub serve_outcome: ServeOutcome,

    pub start_time: f64,
    pub end_time: f64,
}
