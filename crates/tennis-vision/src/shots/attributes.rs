//! Court-space shot attributes: direction, outcome and serve type.

use tennis_models::{court, CourtSide, Point2, ServeType, ShotDirection, ShotOutcome};

use crate::config::ShotConfig;

/// Lateral over depth travel above which a serve counts as sliced.
const SLICE_LATERAL_RATIO: f64 = 0.2;
/// Serve speed below which a non-sliced serve counts as kick, m/s.
const KICK_MAX_SPEED_MPS: f64 = 35.0;

/// Direction from contact position to landing position.
pub fn shot_direction(from: Option<Point2>, landing: Option<Point2>, config: &ShotConfig) -> ShotDirection {
    let (Some(from), Some(landing)) = (from, landing) else {
        return ShotDirection::Unknown;
    };
    let from_off = from.x - court::CENTER_X;
    let land_off = landing.x - court::CENTER_X;
    let lateral = (landing.x - from.x).abs();
    let depth = (landing.y - from.y).abs();

    if from_off * land_off < 0.0 && lateral >= config.cross_court_min_m {
        return ShotDirection::CrossCourt;
    }
    if depth > 0.0 && from_off * land_off >= 0.0 {
        let angle = lateral.atan2(depth).to_degrees();
        if angle <= config.down_the_line_max_deg {
            return ShotDirection::DownTheLine;
        }
    }
    ShotDirection::Unknown
}

/// Whether a serve from `server_side` landed in a service box.
pub fn serve_landed_in(landing: &Point2, server_side: CourtSide) -> bool {
    let in_width = landing.x >= court::SINGLES_LEFT && landing.x <= court::SINGLES_RIGHT;
    let depth = match server_side {
        CourtSide::Near => court::NET_Y - landing.y,
        CourtSide::Far => landing.y - court::NET_Y,
    };
    in_width && (0.0..=court::SERVICE_LINE_FROM_NET).contains(&depth)
}

/// Outcome of one shot.
///
/// A returned shot is in play. An unreturned shot is a winner when it landed
/// in on the opponent's side, an error when it landed out or on the hitter's
/// own side, and in play when no landing was observed.
pub fn shot_outcome(
    is_serve: bool,
    hitter_side: CourtSide,
    landing: Option<Point2>,
    returned: bool,
) -> ShotOutcome {
    if returned {
        return ShotOutcome::InPlay;
    }
    let Some(landing) = landing else {
        return ShotOutcome::InPlay;
    };
    let good = if is_serve {
        serve_landed_in(&landing, hitter_side)
    } else {
        landing.in_singles_court() && CourtSide::of(&landing) != hitter_side
    };
    if good {
        ShotOutcome::Winner
    } else {
        ShotOutcome::Error
    }
}

/// Serve type from the serve's court path and speed.
pub fn serve_type(from: Option<Point2>, landing: Option<Point2>, speed_mps: Option<f64>) -> ServeType {
    if let (Some(from), Some(landing)) = (from, landing) {
        let depth = (landing.y - from.y).abs();
        if depth > 0.0 && (landing.x - from.x).abs() / depth > SLICE_LATERAL_RATIO {
            return ServeType::Slice;
        }
    }
    match speed_mps {
        Some(s) if s < KICK_MAX_SPEED_MPS => ServeType::Kick,
        _ => ServeType::Flat,
    }
}
