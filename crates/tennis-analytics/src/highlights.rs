//! Highlight candidate generation.
//!
//! Each notable event opens a clip window around its contact time. Windows
//! that overlap (or nearly touch) are merged, then ranked by score.

use tennis_models::{
    HighlightCandidate, HighlightKind, Rally, ShotEvent, ShotOutcome, ShotType,
};

use crate::config::HighlightConfig;

/// Seconds before/after the contact, and base score, per kind.
fn window(kind: HighlightKind) -> (f64, f64, f64) {
    match kind {
        HighlightKind::Winner => (5.0, 2.0, 3.0),
        HighlightKind::Ace => (2.0, 3.0, 2.5),
        HighlightKind::Overhead => (2.0, 2.0, 2.0),
        HighlightKind::LongRally => (1.0, 2.0, 1.0),
    }
}

/// Ranked, merged highlight windows.
pub fn highlight_candidates(
    shots: &[ShotEvent],
    rallies: &[Rally],
    config: &HighlightConfig,
) -> Vec<HighlightCandidate> {
    let mut raw: Vec<HighlightCandidate> = Vec::new();

    for shot in shots {
        let kind = match (shot.shot_type, shot.outcome) {
            (ShotType::Serve, ShotOutcome::Winner) => Some(HighlightKind::Ace),
            (_, ShotOutcome::Winner) => Some(HighlightKind::Winner),
            (ShotType::Overhead, _) => Some(HighlightKind::Overhead),
            _ => None,
        };
        if let Some(kind) = kind {
            let (before, after, score) = window(kind);
            raw.push(HighlightCandidate {
                kinds: vec![kind],
                start: (shot.timestamp - before).max(0.0),
                end: shot.timestamp + after,
                score,
                shot_ids: vec![shot.id],
                player: Some(shot.player),
            });
        }
    }

    for rally in rallies.iter().filter(|r| r.length >= config.long_rally_min_shots) {
        let (before, after, score) = window(HighlightKind::LongRally);
        raw.push(HighlightCandidate {
            kinds: vec![HighlightKind::LongRally],
            start: (rally.start_time - before).max(0.0),
            end: rally.end_time + after,
            score: score + 0.1 * rally.length as f64,
            shot_ids: rally.shot_ids.clone(),
            player: None,
        });
    }

    let mut merged = merge(raw, config.merge_gap_secs);
    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.start.total_cmp(&b.start))
    });
    merged.truncate(config.max_highlights);
    merged
}

fn merge(mut raw: Vec<HighlightCandidate>, gap: f64) -> Vec<HighlightCandidate> {
    raw.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));

    let mut merged: Vec<HighlightCandidate> = Vec::new();
    for c in raw {
        match merged.last_mut() {
            Some(last) if c.start <= last.end + gap => {
                last.end = last.end.max(c.end);
                last.score += c.score;
                last.kinds.extend(c.kinds);
                last.kinds.sort();
                last.kinds.dedup();
                last.shot_ids.extend(c.shot_ids);
                last.shot_ids.sort_unstable();
                last.shot_ids.dedup();
                if last.player != c.player {
                    last.player = None;
                }
            }
            _ => merged.push(c),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::shot;
    use tennis_models::{PlayerId, RallyEnd};

    fn rally(shot_ids: Vec<u32>, start: f64, end: f64) -> Rally {
        Rally {
            id: 1,
            point_id: 1,
            length: shot_ids.len(),
            shot_ids,
            start_time: start,
            end_time: end,
            end: RallyEnd::Winner,
            serve_missing: false,
            continues_point: false,
            non_alternating: vec![],
        }
    }

    #[test]
    fn test_winner_window() {
        let shots = [shot(1, 10.0, PlayerId::One, ShotType::Forehand, ShotOutcome::Winner)];
        let h = highlight_candidates(&shots, &[], &HighlightConfig::default());
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].kinds, vec![HighlightKind::Winner]);
        assert_eq!((h[0].start, h[0].end), (5.0, 12.0));
        assert_eq!(h[0].player, Some(PlayerId::One));
    }

    #[test]
    fn test_ace_window_clamped_at_zero() {
        let shots = [shot(1, 1.0, PlayerId::Two, ShotType::Serve, ShotOutcome::Winner)];
        let h = highlight_candidates(&shots, &[], &HighlightConfig::default());
        assert_eq!(h[0].kinds, vec![HighlightKind::Ace]);
        assert_eq!((h[0].start, h[0].end), (0.0, 4.0));
    }

    #[test]
    fn test_overlapping_windows_merge() {
        let shots = [
            shot(1, 10.0, PlayerId::One, ShotType::Overhead, ShotOutcome::InPlay),
            shot(2, 11.0, PlayerId::Two, ShotType::Forehand, ShotOutcome::Winner),
        ];
        let h = highlight_candidates(&shots, &[], &HighlightConfig::default());
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].kinds, vec![HighlightKind::Winner, HighlightKind::Overhead]);
        assert_eq!(h[0].shot_ids, vec![1, 2]);
        assert_eq!(h[0].player, None);
        assert!((h[0].score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_rally_and_ranking() {
        let shots = [shot(1, 100.0, PlayerId::One, ShotType::Overhead, ShotOutcome::InPlay)];
        let long = rally((10..20).collect(), 20.0, 40.0);
        let short = rally(vec![30, 31], 60.0, 62.0);
        let h = highlight_candidates(&shots, &[long, short], &HighlightConfig::default());
        assert_eq!(h.len(), 2);
        // Long rally: 1.0 + 0.1 * 10 = 2.0, ties the overhead and starts earlier.
        assert_eq!(h[0].kinds, vec![HighlightKind::LongRally]);
        assert_eq!(h[1].kinds, vec![HighlightKind::Overhead]);
    }

    #[test]
    fn test_limit() {
        let shots: Vec<_> = (0..20)
            .map(|i| shot(i, 100.0 * i as f64, PlayerId::One, ShotType::Forehand, ShotOutcome::Winner))
            .collect();
        let config = HighlightConfig {
            max_highlights: 3,
            ..Default::default()
        };
        assert_eq!(highlight_candidates(&shots, &[], &config).len(), 3);
    }
}
