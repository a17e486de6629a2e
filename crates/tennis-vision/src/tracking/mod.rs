//! Per-frame tracking of players and ball.

pub mod ball;
pub mod kalman;
pub mod player;

pub use ball::{BallTracker, BallTrackingOutput};
pub use kalman::KalmanFilter2D;
pub use player::{PlayerTracker, PlayerTrackingOutput};
