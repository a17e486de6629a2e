//! Match-level analytics over classified shots.
//!
//! - [`rally`]: shot stream → rallies and points
//! - [`aggregator`]: pure reduction to [`MatchStats`](tennis_models::MatchStats)
//! - [`heatmap`] and [`highlights`]: positional grids and clip candidates

pub mod aggregator;
pub mod config;
pub mod heatmap;
pub mod highlights;
pub mod rally;

pub use aggregator::{AggregationInput, MatchAggregator};
pub use config::{AggregationConfig, AnalyticsConfig, HighlightConfig, RallyConfig};
pub use heatmap::{coverage_pct, HeatmapGrid};
pub use highlights::highlight_candidates;
pub use rally::{segment_rallies, RallyOutput, RallyStateMachine};

#[cfg(test)]
pub(crate) mod testing;
