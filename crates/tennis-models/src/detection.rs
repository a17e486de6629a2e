//! Detection primitives shared by the model adapter and the trackers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Point2;

/// Number of pose keypoints produced per player (COCO layout).
pub const POSE_KEYPOINTS: usize = 17;

/// COCO keypoint indices used by the pipeline.
pub mod keypoint {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 5;
    pub const RIGHT_SHOULDER: usize = 6;
    pub const LEFT_ELBOW: usize = 7;
    pub const RIGHT_ELBOW: usize = 8;
    pub const LEFT_WRIST: usize = 9;
    pub const RIGHT_WRIST: usize = 10;
    pub const LEFT_HIP: usize = 11;
    pub const RIGHT_HIP: usize = 12;
    pub const LEFT_ANKLE: usize = 15;
    pub const RIGHT_ANKLE: usize = 16;
}

/// Axis-aligned pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> Point2 {
        Point2::new(self.cx(), self.cy())
    }

    /// Bottom-centre point, used as the player's ground contact.
    #[inline]
    pub fn foot_point(&self) -> Point2 {
        Point2::new(self.cx(), self.y2())
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Finite coordinates and non-negative size.
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// A detection with its model confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoredBox {
    pub bbox: BoundingBox,
    pub confidence: f64,
}

impl ScoredBox {
    pub fn new(bbox: BoundingBox, confidence: f64) -> Self {
        Self { bbox, confidence }
    }
}

/// A single 2D body landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Visibility score in [0, 1]
    pub score: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, score: f64) -> Self {
        Self { x, y, score }
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Fixed-length pose for one player in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PoseKeypoints {
    pub keypoints: [Keypoint; POSE_KEYPOINTS],
}

impl PoseKeypoints {
    pub fn new(keypoints: [Keypoint; POSE_KEYPOINTS]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// Wrist keypoints whose score clears `min_score`.
    pub fn visible_wrists(&self, min_score: f64) -> impl Iterator<Item = &Keypoint> {
        [keypoint::LEFT_WRIST, keypoint::RIGHT_WRIST]
            .into_iter()
            .filter_map(move |i| self.keypoints.get(i))
            .filter(move |k| k.score >= min_score)
    }

    pub fn mean_score(&self) -> f64 {
        self.keypoints.iter().map(|k| k.score).sum::<f64>() / POSE_KEYPOINTS as f64
    }

    pub fn is_well_formed(&self) -> bool {
        self.keypoints.iter().all(|k| {
            k.x.is_finite() && k.y.is_finite() && (0.0..=1.0).contains(&k.score)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_foot_point() {
        let b = BoundingBox::new(10.0, 20.0, 40.0, 100.0);
        assert_eq!(b.foot_point(), Point2::new(30.0, 120.0));
    }

    #[test]
    fn test_bbox_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_bbox_well_formed() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(0.0, 0.0, -1.0, 1.0).is_well_formed());
    }

    #[test]
    fn test_visible_wrists_filters_by_score() {
        let mut pose = PoseKeypoints::default();
        pose.keypoints[keypoint::LEFT_WRIST] = Keypoint::new(1.0, 1.0, 0.9);
        pose.keypoints[keypoint::RIGHT_WRIST] = Keypoint::new(2.0, 2.0, 0.1);
        let wrists: Vec<_> = pose.visible_wrists(0.3).collect();
        assert_eq!(wrists.len(), 1);
        assert_eq!(wrists[0].x, 1.0);
    }
}
