//! State machine turning the shot stream into rallies and points.
//!
//! # State Machine
//!
//! ```text
//!                serve (or any shot, flagged serve_missing)
//!  ┌─────────────┐ ─────────────────────────────────► ┌─────────────┐
//!  │AwaitingServe│                                    │ RallyActive │◄─┐ shot within gap
//!  └─────────────┘ ◄──────── point resolved ───────── └─────────────┘ ─┘
//!         ▲                                                  │
//!         │ other shot: pending point resolved               │ lone unanswered serve
//!         │                                                  ▼
//!         │                                           ┌─────────────┐
//!         └────────────────────────────────────────── │ RallyEnded  │
//!                                                     └─────────────┘
//!                          same server serves again: second serve, same point
//! ```
//!
//! A rally closes on a winner or error, on a pause longer than
//! `inter_shot_gap_secs`, when a new serve arrives, or at the end of the
//! stream. Every shot lands in exactly one rally.

use tennis_models::{PlayerId, Point, Rally, RallyEnd, ServeOutcome, ShotEvent, ShotOutcome};
use tracing::debug;

use crate::config::RallyConfig;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RallyOutput {
    pub rallies: Vec<Rally>,
    pub points: Vec<Point>,
}

/// Point under construction.
struct OpenPoint {
    point: Point,
    /// Outcome of an unanswered first serve awaiting the second serve
    first_serve: Option<ShotOutcome>,
}

struct OpenRally {
    rally: Rally,
    point: OpenPoint,
    last_player: PlayerId,
    last_outcome: ShotOutcome,
    opened_by_serve: bool,
}

enum State {
    AwaitingServe,
    RallyActive(OpenRally),
    /// A lone serve went unanswered; the point waits for a second serve
    RallyEnded(OpenPoint),
}

pub struct RallyStateMachine {
    config: RallyConfig,
    state: State,
    rallies: Vec<Rally>,
    points: Vec<Point>,
    next_point_id: u32,
}

impl RallyStateMachine {
    pub fn new(config: RallyConfig) -> Self {
        Self {
            config,
            state: State::AwaitingServe,
            rallies: Vec::new(),
            points: Vec::new(),
            next_point_id: 0,
        }
    }

    /// Feed the next shot. Shots must arrive in contact order.
    pub fn ingest(&mut self, shot: &ShotEvent) {
        match std::mem::replace(&mut self.state, State::AwaitingServe) {
            State::AwaitingServe => self.start_point(shot),
            State::RallyActive(open) => {
                if shot.timestamp - open.rally.end_time > self.config.inter_shot_gap_secs {
                    self.close_rally(open, RallyEnd::Timeout);
                    self.ingest(shot);
                } else if shot.is_serve() {
                    self.close_rally(open, RallyEnd::InterruptedByServe);
                    self.ingest(shot);
                } else {
                    self.extend_rally(open, shot);
                }
            }
            State::RallyEnded(pending) => {
                if shot.is_serve() && pending.point.server == Some(shot.player) {
                    self.open_rally(pending, shot, true);
                } else {
                    self.resolve_pending(pending);
                    self.start_point(shot);
                }
            }
        }
    }

    /// Close whatever is open and return everything segmented.
    pub fn finish(mut self) -> RallyOutput {
        match std::mem::replace(&mut self.state, State::AwaitingServe) {
            State::RallyActive(open) => self.close_rally(open, RallyEnd::StreamEnd),
            other => self.state = other,
        }
        if let State::RallyEnded(pending) = std::mem::replace(&mut self.state, State::AwaitingServe) {
            self.resolve_pending(pending);
        }

        debug!(
            rallies = self.rallies.len(),
            points = self.points.len(),
            "Rally segmentation finished"
        );
        RallyOutput {
            rallies: self.rallies,
            points: self.points,
        }
    }

    fn start_point(&mut self, shot: &ShotEvent) {
        self.next_point_id += 1;
        let point = OpenPoint {
            point: Point {
                id: self.next_point_id,
                rally_ids: Vec::new(),
                server: None,
                winner: None,
                winner_inferred: false,
                serve_type: None,
                serve_outcome: ServeOutcome::Unknown,
                start_time: shot.timestamp,
                end_time: shot.timestamp,
            },
            first_serve: None,
        };
        self.open_rally(point, shot, false);
    }

    fn open_rally(&mut self, mut point: OpenPoint, shot: &ShotEvent, continues_point: bool) {
        // Only one rally is open at a time, so the next ID is known.
        let id = self.rallies.len() as u32 + 1;
        point.point.rally_ids.push(id);
        if shot.is_serve() {
            point.point.server = Some(shot.player);
            point.point.serve_type = shot.serve_type.or(point.point.serve_type);
        }

        let open = OpenRally {
            rally: Rally {
                id,
                point_id: point.point.id,
                shot_ids: vec![shot.id],
                start_time: shot.timestamp,
                end_time: shot.timestamp,
                length: 1,
                end: RallyEnd::StreamEnd,
                serve_missing: !shot.is_serve(),
                continues_point,
                non_alternating: Vec::new(),
            },
            point,
            last_player: shot.player,
            last_outcome: shot.outcome,
            opened_by_serve: shot.is_serve(),
        };

        match terminal_end(shot.outcome) {
            Some(end) => self.close_rally(open, end),
            None => self.state = State::RallyActive(open),
        }
    }

    fn extend_rally(&mut self, mut open: OpenRally, shot: &ShotEvent) {
        if shot.player == open.last_player {
            open.rally.non_alternating.push(shot.id);
        }
        open.rally.shot_ids.push(shot.id);
        open.rally.length += 1;
        open.rally.end_time = shot.timestamp;
        open.last_player = shot.player;
        open.last_outcome = shot.outcome;

        match terminal_end(shot.outcome) {
            Some(end) => self.close_rally(open, end),
            None => self.state = State::RallyActive(open),
        }
    }

    fn close_rally(&mut self, open: OpenRally, end: RallyEnd) {
        let OpenRally {
            mut rally,
            mut point,
            last_player,
            last_outcome,
            opened_by_serve,
        } = open;
        rally.end = end;
        point.point.end_time = rally.end_time;
        let lone_serve = opened_by_serve && rally.length == 1;
        debug!(rally_id = rally.id, length = rally.length, end = ?end, "Rally closed");
        self.rallies.push(rally);

        if lone_serve && last_outcome != ShotOutcome::Winner {
            if point.first_serve.is_none() {
                point.first_serve = Some(last_outcome);
                self.state = State::RallyEnded(point);
                return;
            }
            if last_outcome == ShotOutcome::Error {
                self.finish_point(point, last_player.opponent(), false, ServeOutcome::DoubleFault);
            } else {
                self.finish_point(point, last_player, true, ServeOutcome::Fault);
            }
            return;
        }

        let (winner, inferred) = match last_outcome {
            ShotOutcome::Winner => (last_player, false),
            ShotOutcome::Error => (last_player.opponent(), false),
            ShotOutcome::InPlay => (last_player, true),
        };
        let serve_outcome = if lone_serve {
            ServeOutcome::Ace
        } else if point.first_serve.is_some() {
            ServeOutcome::Fault
        } else if opened_by_serve {
            ServeOutcome::In
        } else {
            ServeOutcome::Unknown
        };
        self.finish_point(point, winner, inferred, serve_outcome);
    }

    /// No second serve came: settle the point from the first serve alone.
    fn resolve_pending(&mut self, pending: OpenPoint) {
        let server = pending.point.server;
        let winner = match pending.first_serve {
            Some(ShotOutcome::Error) => server.map(|p| p.opponent()),
            _ => server,
        };
        let mut point = pending.point;
        point.winner = winner;
        point.winner_inferred = true;
        point.serve_outcome = ServeOutcome::Unknown;
        self.points.push(point);
        self.state = State::AwaitingServe;
    }

    fn finish_point(
        &mut self,
        open: OpenPoint,
        winner: PlayerId,
        inferred: bool,
        serve_outcome: ServeOutcome,
    ) {
        let mut point = open.point;
        point.winner = Some(winner);
        point.winner_inferred = inferred;
        point.serve_outcome = serve_outcome;
        debug!(point_id = point.id, winner = %winner, inferred, "Point resolved");
        self.points.push(point);
        self.state = State::AwaitingServe;
    }
}

fn terminal_end(outcome: ShotOutcome) -> Option<RallyEnd> {
    match outcome {
        ShotOutcome::Winner => Some(RallyEnd::Winner),
        ShotOutcome::Error => Some(RallyEnd::Error),
        ShotOutcome::InPlay => None,
    }
}

/// Segment a whole shot list in one go.
pub fn segment_rallies(shots: &[ShotEvent], config: &RallyConfig) -> RallyOutput {
    let mut machine = RallyStateMachine::new(config.clone());
    for shot in shots {
        machine.ingest(shot);
    }
    machine.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::shot;
    use tennis_models::ShotType;

    use PlayerId::{One, Two};
    use ShotOutcome::{Error, InPlay, Winner};
    use ShotType::{Backhand, Forehand, Serve};

    fn run(shots: &[ShotEvent]) -> RallyOutput {
        segment_rallies(shots, &RallyConfig::default())
    }

    #[test]
    fn test_serve_then_winner() {
        let out = run(&[
            shot(1, 1.0, One, Serve, InPlay),
            shot(2, 2.0, Two, Forehand, Winner),
        ]);
        assert_eq!(out.rallies.len(), 1);
        assert_eq!(out.points.len(), 1);
        let rally = &out.rallies[0];
        assert_eq!(rally.shot_ids, vec![1, 2]);
        assert_eq!(rally.end, RallyEnd::Winner);
        assert!(!rally.serve_missing);
        let point = &out.points[0];
        assert_eq!(point.server, Some(One));
        assert_eq!(point.winner, Some(Two));
        assert!(!point.winner_inferred);
        assert_eq!(point.serve_outcome, ServeOutcome::In);
    }

    #[test]
    fn test_ace() {
        let out = run(&[shot(1, 1.0, One, Serve, Winner)]);
        assert_eq!(out.points[0].serve_outcome, ServeOutcome::Ace);
        assert_eq!(out.points[0].winner, Some(One));
    }

    #[test]
    fn test_double_fault_is_one_point() {
        let out = run(&[shot(1, 1.0, One, Serve, Error), shot(2, 9.0, One, Serve, Error)]);
        assert_eq!(out.rallies.len(), 2);
        assert_eq!(out.points.len(), 1);
        assert!(out.rallies[1].continues_point);
        let point = &out.points[0];
        assert_eq!(point.rally_ids, vec![1, 2]);
        assert_eq!(point.serve_outcome, ServeOutcome::DoubleFault);
        assert_eq!(point.winner, Some(Two));
        assert!(!point.winner_inferred);
    }

    #[test]
    fn test_fault_then_second_serve_played() {
        let out = run(&[
            shot(1, 1.0, One, Serve, Error),
            shot(2, 6.0, One, Serve, InPlay),
            shot(3, 7.0, Two, Backhand, InPlay),
            shot(4, 8.0, One, Forehand, Error),
        ]);
        assert_eq!(out.points.len(), 1);
        let point = &out.points[0];
        assert_eq!(point.serve_outcome, ServeOutcome::Fault);
        assert_eq!(point.winner, Some(Two));
        assert_eq!(out.rallies[1].length, 3);
    }

    #[test]
    fn test_timeout_infers_last_hitter() {
        let out = run(&[
            shot(1, 1.0, One, Serve, InPlay),
            shot(2, 2.0, Two, Forehand, InPlay),
            shot(3, 20.0, Two, Serve, Winner),
        ]);
        assert_eq!(out.rallies[0].end, RallyEnd::Timeout);
        assert_eq!(out.points[0].winner, Some(Two));
        assert!(out.points[0].winner_inferred);
        assert_eq!(out.points.len(), 2);
        assert_eq!(out.points[1].server, Some(Two));
    }

    #[test]
    fn test_new_serve_interrupts_rally() {
        let out = run(&[
            shot(1, 1.0, One, Serve, InPlay),
            shot(2, 2.0, Two, Forehand, InPlay),
            shot(3, 3.0, Two, Serve, InPlay),
        ]);
        assert_eq!(out.rallies[0].end, RallyEnd::InterruptedByServe);
        assert_eq!(out.rallies[1].end, RallyEnd::StreamEnd);
    }

    #[test]
    fn test_missing_serve_still_opens_rally() {
        let out = run(&[
            shot(1, 1.0, One, Forehand, InPlay),
            shot(2, 2.0, Two, Backhand, InPlay),
        ]);
        assert_eq!(out.rallies.len(), 1);
        assert!(out.rallies[0].serve_missing);
        assert_eq!(out.rallies[0].end, RallyEnd::StreamEnd);
        assert_eq!(out.points[0].server, None);
        assert_eq!(out.points[0].serve_outcome, ServeOutcome::Unknown);
    }

    #[test]
    fn test_non_alternating_shots_flagged() {
        let out = run(&[
            shot(1, 1.0, One, Serve, InPlay),
            shot(2, 1.8, One, Forehand, InPlay),
            shot(3, 2.6, Two, Backhand, InPlay),
        ]);
        assert_eq!(out.rallies[0].non_alternating, vec![2]);
    }

    #[test]
    fn test_pending_point_resolved_by_other_server() {
        let out = run(&[
            shot(1, 1.0, One, Serve, Error),
            shot(2, 30.0, Two, Serve, Winner),
        ]);
        assert_eq!(out.points.len(), 2);
        assert_eq!(out.points[0].winner, Some(Two));
        assert!(out.points[0].winner_inferred);
        assert_eq!(out.points[1].serve_outcome, ServeOutcome::Ace);
    }

    #[test]
    fn test_every_shot_in_exactly_one_rally() {
        let shots = vec![
            shot(1, 0.5, Two, Backhand, InPlay),
            shot(2, 1.0, One, Serve, Error),
            shot(3, 4.0, One, Serve, InPlay),
            shot(4, 5.0, Two, Forehand, InPlay),
            shot(5, 6.0, Two, Forehand, InPlay),
            shot(6, 20.0, Two, Serve, InPlay),
            shot(7, 21.0, One, Backhand, Winner),
            shot(8, 22.0, Two, Forehand, InPlay),
        ];
        let out = run(&shots);
        let mut seen: Vec<u32> = out.rallies.iter().flat_map(|r| r.shot_ids.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=8).collect::<Vec<_>>());
        for rally in &out.rallies {
            assert_eq!(rally.length, rally.shot_ids.len());
            assert!(out.points.iter().any(|p| p.id == rally.point_id && p.rally_ids.contains(&rally.id)));
        }
    }
}
