//! Shot builders shared by the unit tests.

use tennis_models::{PlayerId, Point2, ServeType, ShotDirection, ShotEvent, ShotOutcome, ShotType};

pub fn shot(id: u32, t: f64, player: PlayerId, shot_type: ShotType, outcome: ShotOutcome) -> ShotEvent {
    let is_serve = shot_type == ShotType::Serve;
    ShotEvent {
        id,
        timestamp: t,
        contact_frame: (t * 25.0).round() as u64,
        player,
        track_id: match player {
            PlayerId::One => 1,
            PlayerId::Two => 2,
        },
        shot_type,
        direction: ShotDirection::Unknown,
        outcome,
        court_position: Some(Point2::new(5.0, 22.0)),
        landing: None,
        confidence: 0.9,
        low_confidence: false,
        ball_speed_mps: is_serve.then_some(40.0),
        serve_type: is_serve.then_some(ServeType::Flat),
    }
}
