//! Pure reduction of shots, rallies, points and tracks into [`MatchStats`].
//!
//! Deterministic: identical inputs give identical (and identically
//! serialized) output. Positional statistics are withheld when the court
//! calibration is degraded; serve speeds when the ball track is unreliable.

use std::collections::BTreeMap;
use tennis_models::{
    CourtCalibration, MatchStats, MovementStats, PlayerId, PlayerStats, PlayerTrack, Point, Rally,
    ServeOutcome, ShotEvent, ShotOutcome, TrackingGap, TrackingSubject,
};
use tracing::debug;

use crate::config::AggregationConfig;
use crate::heatmap::{coverage_pct, HeatmapGrid};
use crate::highlights::highlight_candidates;

/// Rally length buckets, inclusive upper bounds.
const RALLY_BUCKETS: [(&str, usize); 4] = [("1-3", 3), ("4-6", 6), ("7-9", 9), ("10+", usize::MAX)];

/// Everything the aggregator reads.
#[derive(Debug, Clone, Copy)]
pub struct AggregationInput<'a> {
    pub shots: &'a [ShotEvent],
    pub rallies: &'a [Rally],
    pub points: &'a [Point],
    pub tracks: &'a [PlayerTrack],
    /// Tracking gaps; player gaps are left out of movement statistics
    pub gaps: &'a [TrackingGap],
    pub calibration: &'a CourtCalibration,
    pub ball_reliable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MatchAggregator {
    config: AggregationConfig,
}

impl MatchAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(&self, input: &AggregationInput<'_>) -> MatchStats {
        let positional_reliable = !input.calibration.degraded;
        let mut stats = MatchStats {
            total_points: input.points.len(),
            total_rallies: input.rallies.len(),
            total_shots: input.shots.len(),
            low_confidence: input.calibration.degraded,
            positional_reliable,
            ball_reliable: input.ball_reliable,
            ..Default::default()
        };

        stats.longest_rally = input.rallies.iter().map(|r| r.length).max().unwrap_or(0);
        if !input.rallies.is_empty() {
            let total: usize = input.rallies.iter().map(|r| r.length).sum();
            stats.average_rally_length = total as f64 / input.rallies.len() as f64;
        }
        stats.rally_length_distribution = rally_distribution(input.rallies);

        for player in involved_players(input) {
            stats.players.insert(player, PlayerStats::default());
        }

        for shot in input.shots {
            let Some(ps) = stats.players.get_mut(&shot.player) else {
                continue;
            };
            ps.shots += 1;
            match shot.outcome {
                ShotOutcome::Winner => ps.winners += 1,
                ShotOutcome::Error if !shot.is_serve() => ps.errors += 1,
                _ => {}
            }
            if shot.low_confidence || shot.confidence < self.config.min_shot_confidence {
                stats.excluded_low_confidence_shots += 1;
                continue;
            }
            *ps.shot_types.entry(shot.shot_type).or_default() += 1;
            *ps.directions.entry(shot.direction).or_default() += 1;
        }

        for point in input.points {
            if let Some(ps) = point.winner.and_then(|w| stats.players.get_mut(&w)) {
                ps.points_won += 1;
            }
        }

        for (player, ps) in stats.players.iter_mut() {
            self.serve_stats(*player, ps, input);
            if positional_reliable {
                self.positional_stats(*player, ps, input);
            }
        }

        stats.highlights =
            highlight_candidates(input.shots, input.rallies, &self.config.highlights);

        debug!(
            points = stats.total_points,
            rallies = stats.total_rallies,
            shots = stats.total_shots,
            excluded = stats.excluded_low_confidence_shots,
            highlights = stats.highlights.len(),
            "Match statistics aggregated"
        );
        stats
    }

    fn serve_stats(&self, player: PlayerId, ps: &mut PlayerStats, input: &AggregationInput<'_>) {
        let serve = &mut ps.serve;
        for point in input.points.iter().filter(|p| p.server == Some(player)) {
            serve.points_served += 1;
            if point.winner == Some(player) {
                serve.points_won_on_serve += 1;
            }
            let first_serve_faulted = input
                .rallies
                .iter()
                .any(|r| r.point_id == point.id && r.continues_point);
            if first_serve_faulted {
                serve.faults += 1;
            }
            match point.serve_outcome {
                ServeOutcome::In | ServeOutcome::Ace if !first_serve_faulted => serve.first_serves_in += 1,
                _ => {}
            }
            match point.serve_outcome {
                ServeOutcome::Ace => serve.aces += 1,
                ServeOutcome::DoubleFault => serve.double_faults += 1,
                _ => {}
            }
        }
        if serve.points_served > 0 {
            serve.first_serve_pct =
                Some(100.0 * serve.first_serves_in as f64 / serve.points_served as f64);
        }

        let serves = input
            .shots
            .iter()
            .filter(|s| s.player == player && s.is_serve());
        for s in serves.clone() {
            if let Some(t) = s.serve_type {
                *serve.serve_types.entry(t).or_default() += 1;
            }
        }
        if input.ball_reliable {
            let speeds: Vec<f64> = serves.filter_map(|s| s.ball_speed_mps).collect();
            if !speeds.is_empty() {
                serve.average_speed_mps = Some(speeds.iter().sum::<f64>() / speeds.len() as f64);
                serve.max_speed_mps = speeds.iter().copied().reduce(f64::max);
            }
        }
    }

    fn positional_stats(&self, player: PlayerId, ps: &mut PlayerStats, input: &AggregationInput<'_>) {
        let player_gaps: Vec<&TrackingGap> = input
            .gaps
            .iter()
            .filter(|g| g.subject == TrackingSubject::Players)
            .collect();
        let in_gap = |frame: u64| player_gaps.iter().any(|g| g.contains(frame));

        let mut movement = MovementStats::default();
        let mut speed_sum = 0.0;
        let mut counted = 0usize;
        let mut positions = Vec::new();

        for track in input.tracks.iter().filter(|t| t.player == player) {
            let mut previous: Option<f64> = None;
            for frame in &track.frames {
                if in_gap(frame.frame_index) {
                    movement.excluded_frames += 1;
                    previous = None;
                    continue;
                }
                if let Some(prev) = previous {
                    movement.distance_m += (frame.cumulative_distance_m - prev).max(0.0);
                }
                previous = Some(frame.cumulative_distance_m);
                movement.max_speed_mps = movement.max_speed_mps.max(frame.speed_mps);
                speed_sum += frame.speed_mps;
                counted += 1;
                positions.push(frame.court);
            }
        }

        if counted == 0 {
            return;
        }
        movement.average_speed_mps = speed_sum / counted as f64;
        ps.movement = Some(movement);

        let grid = HeatmapGrid::new(self.config.heatmap_columns, self.config.heatmap_rows);
        let heatmap = grid.accumulate(positions.iter());
        ps.court_coverage_pct = Some(coverage_pct(&heatmap));
        ps.heatmap = Some(heatmap);
    }
}

fn rally_distribution(rallies: &[Rally]) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = RALLY_BUCKETS
        .iter()
        .map(|(name, _)| (name.to_string(), 0))
        .collect();
    for rally in rallies {
        if let Some((name, _)) = RALLY_BUCKETS.iter().find(|(_, max)| rally.length <= *max) {
            *dist.entry(name.to_string()).or_default() += 1;
        }
    }
    dist
}

fn involved_players(input: &AggregationInput<'_>) -> Vec<PlayerId> {
    let mut players: Vec<PlayerId> = input
        .tracks
        .iter()
        .map(|t| t.player)
        .chain(input.shots.iter().map(|s| s.player))
        .chain(input.points.iter().filter_map(|p| p.server))
        .chain(input.points.iter().filter_map(|p| p.winner))
        .collect();
    players.sort();
    players.dedup();
    players
}
