//! Player tracker for singles: at most two ID-stable tracks.
//!
//! Each track runs its own occlusion state machine:
//!
//! ```text
//! Active ──(stale_after misses)──► Stale ──(lost_after misses)──► Lost
//!   ▲                                │
//!   └──── next match ◄── Reacquired ◄┘ (detection inside extrapolated window)
//! ```
//!
//! Association is greedy nearest-neighbour in court space, gated by the
//! fastest plausible player speed. A track only changes court side after
//! `side_transition_frames` consecutive frames on the other side.

use std::collections::BTreeMap;
use tennis_models::{
    CourtCalibration, CourtSide, PlayerFrame, PlayerId, PlayerTrack, Point2, TrackState,
    TrackingSubject,
};
use tracing::{debug, info};

use crate::config::PlayerTrackerConfig;
use crate::detection::{FrameObservation, PlayerObservation};
use crate::error::TrackingGapError;

/// Final player tracker output.
#[derive(Debug, Clone)]
pub struct PlayerTrackingOutput {
    /// All tracks ever created, ordered by track ID
    pub tracks: Vec<PlayerTrack>,
    pub gaps: Vec<TrackingGapError>,
    pub frames: u64,
    /// Frames where the detector returned at least one player
    pub frames_with_players: u64,
}

impl PlayerTrackingOutput {
    pub fn track(&self, player: PlayerId) -> impl Iterator<Item = &PlayerTrack> {
        self.tracks.iter().filter(move |t| t.player == player)
    }
}

#[derive(Debug)]
struct TrackSlot {
    track: PlayerTrack,
    smoothed: Point2,
    velocity: Point2,
    misses: u32,
    other_side_streak: u32,
}

impl TrackSlot {
    fn is_live(&self) -> bool {
        self.track.state != TrackState::Lost
    }

    /// Expected court position after the current run of misses.
    fn extrapolated(&self, dt: f64) -> Point2 {
        let t = dt * self.misses as f64;
        Point2::new(
            self.smoothed.x + self.velocity.x * t,
            self.smoothed.y + self.velocity.y * t,
        )
    }
}

struct Candidate<'a> {
    court: Point2,
    observation: &'a PlayerObservation,
}

pub struct PlayerTracker {
    config: PlayerTrackerConfig,
    calibration: CourtCalibration,
    dt: f64,
    slots: Vec<TrackSlot>,
    next_track_id: u32,
    last_side: BTreeMap<PlayerId, CourtSide>,
    all_stale_since: Option<(u64, f64)>,
    last_frame: Option<(u64, f64)>,
    gaps: Vec<TrackingGapError>,
    frames: u64,
    frames_with_players: u64,
}

impl PlayerTracker {
    pub fn new(config: PlayerTrackerConfig, calibration: CourtCalibration, fps: f64) -> Self {
        Self {
            config,
            calibration,
            dt: 1.0 / fps,
            slots: Vec::new(),
            next_track_id: 1,
            last_side: BTreeMap::new(),
            all_stale_since: None,
            last_frame: None,
            gaps: Vec::new(),
            frames: 0,
            frames_with_players: 0,
        }
    }

    /// Process one frame of observations. Must be called for every frame, in order.
    pub fn update(&mut self, obs: &FrameObservation) {
        self.frames += 1;
        if !obs.players.is_empty() {
            self.frames_with_players += 1;
        }

        let candidates: Vec<Candidate<'_>> = obs
            .players
            .iter()
            .filter_map(|o| {
                self.calibration
                    .pixel_to_court(o.detection.bbox.foot_point())
                    .map(|court| Candidate {
                        court,
                        observation: o,
                    })
            })
            .collect();

        // Greedy nearest-neighbour inside each track's gate.
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (ti, slot) in self.slots.iter().enumerate() {
            if !slot.is_live() {
                continue;
            }
            let expected = slot.extrapolated(self.dt);
            let gate = self.gate(slot);
            for (ci, cand) in candidates.iter().enumerate() {
                let d = expected.distance(&cand.court);
                if d <= gate {
                    pairs.push((d, ti, ci));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut track_taken = vec![false; self.slots.len()];
        let mut cand_taken = vec![false; candidates.len()];
        for (_, ti, ci) in pairs {
            if track_taken[ti] || cand_taken[ci] {
                continue;
            }
            track_taken[ti] = true;
            cand_taken[ci] = true;
            self.apply_match(ti, &candidates[ci], obs);
        }

        for (ti, taken) in track_taken.iter().enumerate() {
            if !taken {
                self.apply_miss(ti, obs.index);
            }
        }

        for (ci, cand) in candidates.iter().enumerate() {
            if !cand_taken[ci] {
                self.maybe_spawn(cand, obs);
            }
        }

        self.update_gap_span(obs.index, obs.timestamp, track_taken.iter().any(|t| *t));
        self.last_frame = Some((obs.index, obs.timestamp));
    }

    fn gate(&self, slot: &TrackSlot) -> f64 {
        let reach = self.config.max_speed_mps * self.dt * (slot.misses + 1) as f64
            + self.config.association_slack_m;
        match slot.track.state {
            TrackState::Stale => reach.min(self.config.max_reacquire_radius_m),
            _ => reach,
        }
    }

    fn apply_match(&mut self, ti: usize, cand: &Candidate<'_>, obs: &FrameObservation) {
        let alpha = self.config.smoothing_alpha;
        let transition_frames = self.config.side_transition_frames;
        let dt = self.dt;
        let slot = &mut self.slots[ti];

        let reacquired = slot.track.state == TrackState::Stale;
        let previous = slot.smoothed;
        let elapsed = dt * (slot.misses + 1) as f64;

        if reacquired {
            // New segment: no smoothing or distance across the gap.
            slot.smoothed = cand.court;
            slot.velocity = Point2::default();
            slot.track.state = TrackState::Reacquired;
            slot.track.reacquisitions += 1;
            debug!(
                track_id = slot.track.track_id,
                player = %slot.track.player,
                frame = obs.index,
                "Player track re-acquired"
            );
        } else {
            slot.smoothed = Point2::new(
                alpha * cand.court.x + (1.0 - alpha) * previous.x,
                alpha * cand.court.y + (1.0 - alpha) * previous.y,
            );
            slot.velocity = Point2::new(
                (slot.smoothed.x - previous.x) / elapsed,
                (slot.smoothed.y - previous.y) / elapsed,
            );
            slot.track.total_distance_m += slot.smoothed.distance(&previous);
            slot.track.state = TrackState::Active;
        }
        slot.misses = 0;

        if CourtSide::of(&slot.smoothed) != slot.track.side {
            slot.other_side_streak += 1;
            if slot.other_side_streak >= transition_frames {
                slot.track.side = slot.track.side.opposite();
                slot.other_side_streak = 0;
                debug!(
                    track_id = slot.track.track_id,
                    side = ?slot.track.side,
                    "Player changed court side"
                );
            }
        } else {
            slot.other_side_streak = 0;
        }
        self.last_side.insert(slot.track.player, slot.track.side);

        let speed = (slot.velocity.x.powi(2) + slot.velocity.y.powi(2)).sqrt();
        slot.track.frames.push(PlayerFrame {
            frame_index: obs.index,
            timestamp: obs.timestamp,
            pixel: cand.observation.detection.bbox.foot_point(),
            court: slot.smoothed,
            bbox: cand.observation.detection.bbox,
            pose: cand.observation.pose.clone(),
            velocity: slot.velocity,
            speed_mps: speed,
            cumulative_distance_m: slot.track.total_distance_m,
        });
    }

    fn apply_miss(&mut self, ti: usize, frame_index: u64) {
        let slot = &mut self.slots[ti];
        if !slot.is_live() {
            return;
        }
        slot.misses += 1;
        if slot.misses >= self.config.lost_after_frames {
            slot.track.state = TrackState::Lost;
            info!(
                track_id = slot.track.track_id,
                player = %slot.track.player,
                frame = frame_index,
                "Player track lost"
            );
        } else if slot.misses >= self.config.stale_after_frames
            && slot.track.state != TrackState::Stale
        {
            slot.track.state = TrackState::Stale;
            debug!(
                track_id = slot.track.track_id,
                frame = frame_index,
                "Player track stale"
            );
        }
    }

    /// Start a track for an unmatched detection when its side is free.
    fn maybe_spawn(&mut self, cand: &Candidate<'_>, obs: &FrameObservation) {
        let side = CourtSide::of(&cand.court);
        let live: Vec<&TrackSlot> = self.slots.iter().filter(|s| s.is_live()).collect();
        if live.len() >= 2 || live.iter().any(|s| s.track.side == side) {
            return;
        }

        let in_use: Vec<PlayerId> = live.iter().map(|s| s.track.player).collect();
        let available: Vec<PlayerId> = [PlayerId::One, PlayerId::Two]
            .into_iter()
            .filter(|p| !in_use.contains(p))
            .collect();
        // Replacement inherits the identity last seen on this side.
        let player = available
            .iter()
            .copied()
            .find(|p| self.last_side.get(p) == Some(&side))
            .or_else(|| {
                let initial = PlayerId::for_initial_side(side);
                available.contains(&initial).then_some(initial)
            })
            .or_else(|| available.first().copied());
        let Some(player) = player else {
            return;
        };

        let track_id = self.next_track_id;
        self.next_track_id += 1;
        info!(track_id, %player, ?side, frame = obs.index, "Player track created");

        self.last_side.insert(player, side);
        self.slots.push(TrackSlot {
            track: PlayerTrack {
                track_id,
                player,
                side,
                state: TrackState::Active,
                frames: vec![PlayerFrame {
                    frame_index: obs.index,
                    timestamp: obs.timestamp,
                    pixel: cand.observation.detection.bbox.foot_point(),
                    court: cand.court,
                    bbox: cand.observation.detection.bbox,
                    pose: cand.observation.pose.clone(),
                    velocity: Point2::default(),
                    speed_mps: 0.0,
                    cumulative_distance_m: 0.0,
                }],
                total_distance_m: 0.0,
                reacquisitions: 0,
            },
            smoothed: cand.court,
            velocity: Point2::default(),
            misses: 0,
            other_side_streak: 0,
        });
    }

    /// Track spans where every existing track is stale or lost.
    fn update_gap_span(&mut self, frame_index: u64, timestamp: f64, any_matched: bool) {
        let all_stale = !self.slots.is_empty()
            && !any_matched
            && self
                .slots
                .iter()
                .all(|s| matches!(s.track.state, TrackState::Stale | TrackState::Lost));

        match (all_stale, self.all_stale_since) {
            (true, None) => self.all_stale_since = Some((frame_index, timestamp)),
            (false, Some(start)) => {
                self.all_stale_since = None;
                if let Some(end) = self.last_frame {
                    self.close_gap(start, end);
                }
            }
            _ => {}
        }
    }

    fn close_gap(&mut self, start: (u64, f64), end: (u64, f64)) {
        let span = end.0.saturating_sub(start.0) + 1;
        if span > self.config.both_stale_gap_frames as u64 {
            let gap = TrackingGapError::new(TrackingSubject::Players, start, end);
            info!(error = %gap, "Player tracking gap");
            self.gaps.push(gap);
        }
    }

    pub fn finish(mut self) -> PlayerTrackingOutput {
        if let (Some(start), Some(end)) = (self.all_stale_since.take(), self.last_frame) {
            self.close_gap(start, end);
        }
        let mut tracks: Vec<PlayerTrack> = self.slots.into_iter().map(|s| s.track).collect();
        tracks.sort_by_key(|t| t.track_id);

        PlayerTrackingOutput {
            tracks,
            gaps: self.gaps,
            frames: self.frames,
            frames_with_players: self.frames_with_players,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tennis_models::{BoundingBox, CalibrationMethod, ScoredBox};

    const FPS: f64 = 25.0;

    /// 50 px per metre, court origin at pixel (100, 100).
    fn calibration() -> CourtCalibration {
        CourtCalibration {
            homography: [[0.02, 0.0, -2.0], [0.0, 0.02, -2.0], [0.0, 0.0, 1.0]],
            pixel_to_meter: 0.02,
            corners: [Point2::default(); 4],
            reprojection_error_m: 0.0,
            confidence: 1.0,
            method: CalibrationMethod::Manual,
            degraded: false,
        }
    }

    /// Player box whose feet are at court position (x, y).
    fn at_court(x: f64, y: f64) -> PlayerObservation {
        let (fx, fy) = (100.0 + 50.0 * x, 100.0 + 50.0 * y);
        PlayerObservation {
            detection: ScoredBox::new(BoundingBox::new(fx - 20.0, fy - 90.0, 40.0, 90.0), 0.9),
            pose: None,
        }
    }

    fn frame(index: u64, players: Vec<PlayerObservation>) -> FrameObservation {
        FrameObservation {
            index,
            timestamp: index as f64 / FPS,
            players,
            ball: None,
        }
    }

    fn tracker() -> PlayerTracker {
        PlayerTracker::new(PlayerTrackerConfig::default(), calibration(), FPS)
    }

    #[test]
    fn test_two_players_get_stable_ids() {
        let mut t = tracker();
        for i in 0..50 {
            let dx = 0.05 * i as f64;
            t.update(&frame(i, vec![at_court(2.0, 2.0 + dx), at_court(5.0 + dx, 22.0)]));
        }
        let out = t.finish();
        assert_eq!(out.tracks.len(), 2);
        let near = out.track(PlayerId::One).next().unwrap();
        let far = out.track(PlayerId::Two).next().unwrap();
        assert_eq!(near.side, CourtSide::Near);
        assert_eq!(far.side, CourtSide::Far);
        assert_eq!(near.frames.len(), 50);
        assert_eq!(far.frames.len(), 50);
        assert!(out.gaps.is_empty());
    }

    #[test]
    fn test_cumulative_distance_and_speed() {
        let mut t = tracker();
        // 0.1 m per frame = 2.5 m/s
        for i in 0..100 {
            t.update(&frame(i, vec![at_court(1.0 + 0.1 * i as f64, 20.0)]));
        }
        let out = t.finish();
        let track = &out.tracks[0];
        let total = track.total_distance_m;
        assert!((total - 9.9).abs() < 0.3, "distance = {}", total);
        let last = track.last_frame().unwrap();
        assert!((last.speed_mps - 2.5).abs() < 0.2, "speed = {}", last.speed_mps);
        assert_eq!(last.cumulative_distance_m, total);
    }

    #[test]
    fn test_implausible_jump_is_not_associated() {
        let mut t = tracker();
        t.update(&frame(0, vec![at_court(2.0, 20.0)]));
        // 6 m in one frame is far beyond max speed; same side so no new track either.
        t.update(&frame(1, vec![at_court(8.0, 20.0)]));
        let out = t.finish();
        assert_eq!(out.tracks.len(), 1);
        assert_eq!(out.tracks[0].frames.len(), 1);
    }

    #[test]
    fn test_reacquisition_keeps_identity() {
        let mut t = tracker();
        for i in 0..10 {
            t.update(&frame(i, vec![at_court(3.0, 20.0)]));
        }
        // Occluded for 20 frames: goes stale.
        for i in 10..30 {
            t.update(&frame(i, vec![]));
        }
        for i in 30..40 {
            t.update(&frame(i, vec![at_court(4.0, 20.5)]));
        }
        let out = t.finish();
        assert_eq!(out.tracks.len(), 1);
        let track = &out.tracks[0];
        assert_eq!(track.player, PlayerId::One);
        assert_eq!(track.reacquisitions, 1);
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.frames.len(), 20);
        // No distance across the occlusion.
        assert!(track.total_distance_m < 0.2);
    }

    #[test]
    fn test_side_change_needs_sustained_crossing() {
        let mut t = tracker();
        // Walk from just inside the near half to just past the net.
        for i in 0..=10u64 {
            t.update(&frame(i, vec![at_court(5.0, 12.5 - 0.1 * i as f64)]));
        }
        assert_eq!(t.slots[0].track.side, CourtSide::Near);
        for i in 11..31 {
            t.update(&frame(i, vec![at_court(5.0, 11.5)]));
        }
        let out = t.finish();
        assert_eq!(out.tracks.len(), 1);
        assert_eq!(out.tracks[0].side, CourtSide::Far);
    }

    #[test]
    fn test_both_stale_span_reports_gap() {
        let config = PlayerTrackerConfig::default();
        let mut t = tracker();
        for i in 0..10 {
            t.update(&frame(i, vec![at_court(3.0, 20.0), at_court(5.0, 3.0)]));
        }
        let dark = 10 + config.stale_after_frames as u64 + config.both_stale_gap_frames as u64 + 10;
        for i in 10..dark {
            t.update(&frame(i, vec![]));
        }
        for i in dark..dark + 5 {
            t.update(&frame(i, vec![at_court(3.0, 20.0), at_court(5.0, 3.0)]));
        }
        let out = t.finish();
        assert_eq!(out.gaps.len(), 1);
        let gap = out.gaps[0].gap;
        assert_eq!(gap.subject, TrackingSubject::Players);
        assert_eq!(gap.end_frame, dark - 1);
        assert!(gap.start_frame >= 10);
    }

    #[test]
    fn test_short_occlusion_reports_no_gap() {
        let mut t = tracker();
        for i in 0..10 {
            t.update(&frame(i, vec![at_court(3.0, 20.0), at_court(5.0, 3.0)]));
        }
        for i in 10..20 {
            t.update(&frame(i, vec![]));
        }
        for i in 20..25 {
            t.update(&frame(i, vec![at_court(3.0, 20.0), at_court(5.0, 3.0)]));
        }
        assert!(t.finish().gaps.is_empty());
    }

    #[test]
    fn test_replacement_inherits_missing_identity() {
        let config = PlayerTrackerConfig {
            lost_after_frames: 10,
            ..Default::default()
        };
        let mut t = PlayerTracker::new(config, calibration(), FPS);
        for i in 0..5 {
            t.update(&frame(i, vec![at_court(3.0, 20.0), at_court(5.0, 3.0)]));
        }
        // Far player vanishes until lost, then someone appears far away on that side.
        for i in 5..20 {
            t.update(&frame(i, vec![at_court(3.0, 20.0)]));
        }
        for i in 20..25 {
            t.update(&frame(i, vec![at_court(3.0, 20.0), at_court(9.0, 1.0)]));
        }
        let out = t.finish();
        assert_eq!(out.tracks.len(), 3);
        assert_eq!(out.tracks[1].state, TrackState::Lost);
        assert_eq!(out.tracks[2].player, PlayerId::Two);
        assert_eq!(out.tracks[2].side, CourtSide::Far);
    }

    #[test]
    fn test_counts_frames_with_players() {
        let mut t = tracker();
        t.update(&frame(0, vec![]));
        t.update(&frame(1, vec![at_court(3.0, 20.0)]));
        let out = t.finish();
        assert_eq!(out.frames, 2);
        assert_eq!(out.frames_with_players, 1);
    }
}
