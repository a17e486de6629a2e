//! Contact detection over the filtered ball trajectory.
//!
//! A contact is a sharp change in ball direction that happens within reach of
//! a player. Reach is a circle around the visible wrists scaled by the
//! player's box height; without a usable pose the box itself, grown by half
//! that radius, stands in. Candidates closer than `contact_nms_frames` are
//! suppressed down to the one with the largest deflection.

use tennis_models::{BallSample, PlayerFrame, PlayerId, PlayerTrack, Point2};
use tracing::debug;

use crate::config::ShotConfig;

/// Player frames older than this are not used for reach checks.
const MAX_POSE_AGE_FRAMES: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ContactCandidate {
    /// Index into the ball sample list
    pub sample_index: usize,
    pub frame_index: u64,
    pub timestamp: f64,
    pub track_id: u32,
    pub player: PlayerId,
    /// Ball pixel position at contact
    pub ball: Point2,
    pub deflection_deg: f64,
    /// Distance from the ball to the reach anchor, pixels
    pub reach_px: f64,
}

/// Find contacts in time order.
pub fn find_contacts(
    samples: &[BallSample],
    tracks: &[PlayerTrack],
    config: &ShotConfig,
) -> Vec<ContactCandidate> {
    let span = config.deflection_span.max(1);
    if samples.len() < 2 * span + 1 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for i in span..samples.len() - span {
        let (Some(before), Some(at), Some(after)) = (
            samples[i - span].position,
            samples[i].position,
            samples[i + span].position,
        ) else {
            continue;
        };
        let Some(deflection) = deflection_deg(before, at, after) else {
            continue;
        };
        if deflection < config.min_deflection_deg {
            continue;
        }

        let frame_index = samples[i].frame_index;
        let nearest = tracks
            .iter()
            .filter_map(|t| {
                let frame = t.frame_at_or_before(frame_index)?;
                if frame_index - frame.frame_index > MAX_POSE_AGE_FRAMES {
                    return None;
                }
                reach_distance(frame, at, config).map(|d| (t, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((track, reach_px)) = nearest {
            candidates.push(ContactCandidate {
                sample_index: i,
                frame_index,
                timestamp: samples[i].timestamp,
                track_id: track.track_id,
                player: track.player,
                ball: at,
                deflection_deg: deflection,
                reach_px,
            });
        }
    }

    let raw = candidates.len();
    let contacts = suppress(candidates, config.contact_nms_frames);
    debug!(candidates = raw, contacts = contacts.len(), "Contact detection");
    contacts
}

/// Angle between the incoming and outgoing displacement, degrees.
fn deflection_deg(before: Point2, at: Point2, after: Point2) -> Option<f64> {
    let (ax, ay) = (at.x - before.x, at.y - before.y);
    let (bx, by) = (after.x - at.x, after.y - at.y);
    let na = (ax * ax + ay * ay).sqrt();
    let nb = (bx * bx + by * by).sqrt();
    if na < 1.0 || nb < 1.0 {
        return None;
    }
    let cos = ((ax * bx + ay * by) / (na * nb)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Distance to the closest reach anchor if the ball is inside the envelope.
fn reach_distance(frame: &PlayerFrame, ball: Point2, config: &ShotConfig) -> Option<f64> {
    let radius = config.reach_scale * frame.bbox.height;

    if let Some(pose) = &frame.pose {
        let nearest_wrist = pose
            .visible_wrists(config.pose_min_score)
            .map(|k| k.position().distance(&ball))
            .min_by(|a, b| a.total_cmp(b));
        if let Some(d) = nearest_wrist {
            return (d <= radius).then_some(d);
        }
    }

    let pad = radius * 0.5;
    let b = &frame.bbox;
    let inside = ball.x >= b.x - pad && ball.x <= b.x2() + pad && ball.y >= b.y - pad && ball.y <= b.y2() + pad;
    inside.then(|| b.center().distance(&ball))
}

fn suppress(candidates: Vec<ContactCandidate>, window: u64) -> Vec<ContactCandidate> {
    let mut kept: Vec<ContactCandidate> = Vec::new();
    for c in candidates {
        match kept.last_mut() {
            Some(last) if c.frame_index - last.frame_index <= window => {
                if c.deflection_deg > last.deflection_deg {
                    *last = c;
                }
            }
            _ => kept.push(c),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::template_pose;
    use tennis_models::{BoundingBox, CourtSide, TrackState};

    fn sample(i: u64, p: Point2) -> BallSample {
        BallSample {
            frame_index: i,
            timestamp: i as f64 / 25.0,
            raw: Some(p),
            position: Some(p),
            velocity: None,
            court_position: None,
            speed_mps: None,
            interpolated: false,
            bounce: false,
        }
    }

    /// Ball travels right, turns at frame 10 at (300, 200) and goes back up-left.
    fn v_path() -> Vec<BallSample> {
        (0..21u64)
            .map(|i| {
                let p = if i <= 10 {
                    Point2::new(200.0 + 10.0 * i as f64, 200.0)
                } else {
                    let k = (i - 10) as f64;
                    Point2::new(300.0 - 8.0 * k, 200.0 - 6.0 * k)
                };
                sample(i, p)
            })
            .collect()
    }

    fn track(bbox: BoundingBox, with_pose: bool) -> PlayerTrack {
        PlayerTrack {
            track_id: 7,
            player: PlayerId::One,
            side: CourtSide::Near,
            state: TrackState::Active,
            frames: (0..21u64)
                .map(|i| PlayerFrame {
                    frame_index: i,
                    timestamp: i as f64 / 25.0,
                    pixel: bbox.foot_point(),
                    court: Point2::new(5.0, 22.0),
                    bbox,
                    pose: with_pose.then(|| template_pose(&bbox)),
                    velocity: Point2::default(),
                    speed_mps: 0.0,
                    cumulative_distance_m: 0.0,
                })
                .collect(),
            total_distance_m: 0.0,
            reacquisitions: 0,
        }
    }

    #[test]
    fn test_contact_at_turn_near_wrist() {
        // Right wrist of the template pose sits at (cx + 0.4w, y + 0.5h) = (296, 200).
        let bbox = BoundingBox::new(260.0, 150.0, 40.0, 100.0);
        let contacts = find_contacts(&v_path(), &[track(bbox, true)], &ShotConfig::default());
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].frame_index, 10);
        assert_eq!(contacts[0].track_id, 7);
        assert!(contacts[0].deflection_deg > 120.0);
    }

    #[test]
    fn test_turn_out_of_reach_is_not_a_contact() {
        let bbox = BoundingBox::new(600.0, 400.0, 40.0, 100.0);
        let contacts = find_contacts(&v_path(), &[track(bbox, true)], &ShotConfig::default());
        assert!(contacts.is_empty());
    }

    #[test]
    fn test_box_fallback_without_pose() {
        let bbox = BoundingBox::new(280.0, 180.0, 40.0, 100.0);
        let contacts = find_contacts(&v_path(), &[track(bbox, false)], &ShotConfig::default());
        assert_eq!(contacts.len(), 1);
    }

    #[test]
    fn test_straight_flight_has_no_contacts() {
        let samples: Vec<_> = (0..30u64)
            .map(|i| sample(i, Point2::new(100.0 + 5.0 * i as f64, 200.0)))
            .collect();
        let bbox = BoundingBox::new(150.0, 150.0, 40.0, 100.0);
        assert!(find_contacts(&samples, &[track(bbox, true)], &ShotConfig::default()).is_empty());
    }

    #[test]
    fn test_suppression_keeps_sharpest() {
        let mk = |frame: u64, deg: f64| ContactCandidate {
            sample_index: frame as usize,
            frame_index: frame,
            timestamp: 0.0,
            track_id: 1,
            player: PlayerId::One,
            ball: Point2::default(),
            deflection_deg: deg,
            reach_px: 0.0,
        };
        let kept = suppress(vec![mk(10, 60.0), mk(11, 150.0), mk(12, 90.0), mk(40, 50.0)], 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].frame_index, 11);
        assert_eq!(kept[1].frame_index, 40);
    }

    #[test]
    fn test_deflection_angle() {
        let d = deflection_deg(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0));
        assert!((d.unwrap_or_default() - 90.0).abs() < 1e-9);
        assert!(deflection_deg(Point2::new(0.0, 0.0), Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)).is_none());
    }
}
