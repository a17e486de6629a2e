//! Analytics configuration.

use serde::{Deserialize, Serialize};

/// All analytics settings, nested under `analytics` in the pipeline config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub rally: RallyConfig,
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RallyConfig {
    /// Longest pause between shots of one rally, seconds (default: 4.0)
    pub inter_shot_gap_secs: f64,
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            inter_shot_gap_secs: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Shots below this classifier confidence stay out of distributions (default: 0.5)
    pub min_shot_confidence: f64,

    /// Heatmap columns across the court (default: 10)
    pub heatmap_columns: usize,

    /// Heatmap rows along the court (default: 20)
    pub heatmap_rows: usize,

    pub highlights: HighlightConfig,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_shot_confidence: 0.5,
            heatmap_columns: 10,
            heatmap_rows: 20,
            highlights: HighlightConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Rallies with at least this many shots are highlights (default: 8)
    pub long_rally_min_shots: usize,

    /// Windows closer than this are merged, seconds (default: 1.0)
    pub merge_gap_secs: f64,

    /// Highlights kept after ranking (default: 10)
    pub max_highlights: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            long_rally_min_shots: 8,
            merge_gap_secs: 1.0,
            max_highlights: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_partial_config() {
        let cfg: AnalyticsConfig =
            serde_json::from_str(r#"{"aggregation": {"highlights": {"max_highlights": 3}}}"#).unwrap();
        assert_eq!(cfg.aggregation.highlights.max_highlights, 3);
        assert_eq!(cfg.aggregation.heatmap_rows, 20);
        assert_eq!(cfg.rally, RallyConfig::default());
    }
}
