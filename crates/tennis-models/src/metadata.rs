//! Match metadata supplied alongside the video.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{MatchId, Point2};

/// Playing surface, informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CourtSurface {
    Hard,
    Clay,
    Grass,
    Carpet,
    #[serde(other)]
    Other,
}

/// Metadata for one match video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchMetadata {
    /// Caller-assigned match ID
    pub match_id: MatchId,

    /// Known court surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<CourtSurface>,

    /// Manually marked court corners in pixels (far-left, far-right, near-right, near-left).
    /// When present, line detection is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court_corners: Option<[Point2; 4]>,
}

impl MatchMetadata {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: MatchId::new(match_id),
            surface: None,
            court_corners: None,
        }
    }

    pub fn with_surface(mut self, surface: CourtSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_court_corners(mut self, corners: [Point2; 4]) -> Self {
        self.court_corners = Some(corners);
        self
    }

    /// Validate the metadata.
    pub fn validate(&self) -> Result<(), String> {
        let id = self.match_id.as_str();
        if id.trim().is_empty() {
            return Err("Match ID is required".to_string());
        }

        if id.len() > 128 {
            return Err("Match ID must be at most 128 characters".to_string());
        }

        if let Some(corners) = &self.court_corners {
            if corners.iter().any(|c| !c.is_finite() || c.x < 0.0 || c.y < 0.0) {
                return Err("Court corners must be finite, non-negative pixel coordinates".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_match_id() {
        assert!(MatchMetadata::new("  ").validate().is_err());
        assert!(MatchMetadata::new("m-1").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_corners() {
        let meta = MatchMetadata::new("m-1").with_court_corners([
            Point2::new(0.0, 0.0),
            Point2::new(f64::NAN, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]);
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_metadata_deserializes_without_optional_fields() {
        let meta: MatchMetadata = serde_json::from_str(r#"{"match_id":"abc"}"#).unwrap();
        assert_eq!(meta.match_id.as_str(), "abc");
        assert!(meta.surface.is_none());
        assert!(meta.court_corners.is_none());
    }

    #[test]
    fn test_unknown_surface_maps_to_other() {
        let meta: MatchMetadata =
            serde_json::from_str(r#"{"match_id":"abc","surface":"acrylic"}"#).unwrap();
        assert_eq!(meta.surface, Some(CourtSurface::Other));
    }
}
