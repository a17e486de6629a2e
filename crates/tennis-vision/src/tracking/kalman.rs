//! Constant-velocity Kalman filter over a 2D pixel position.
//!
//! # State Vector
//! ```text
//! [x, y, vx, vy]
//!  ^position ^velocity (px/frame)
//! ```
//!
//! One step is one frame. Process noise is white acceleration with standard
//! deviation `process_noise` px/frame²; measurements observe position only.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use tennis_models::Point2;

use crate::config::BallTrackerConfig;

#[derive(Debug, Clone)]
pub struct KalmanFilter2D {
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    transition: Matrix4<f64>,
    process: Matrix4<f64>,
    observation: Matrix2x4<f64>,
    measurement: Matrix2<f64>,
}

impl KalmanFilter2D {
    /// Start a track at `position` with an initial velocity guess.
    pub fn new(position: Point2, velocity: Point2, config: &BallTrackerConfig) -> Self {
        let r = config.measurement_noise_px.powi(2);
        let q = config.process_noise.powi(2);
        let v0 = config.initial_velocity_variance;

        #[rustfmt::skip]
        let transition = Matrix4::new(
            1.0, 0.0, 1.0, 0.0,
            0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let process = Matrix4::new(
            0.25, 0.0,  0.5, 0.0,
            0.0,  0.25, 0.0, 0.5,
            0.5,  0.0,  1.0, 0.0,
            0.0,  0.5,  0.0, 1.0,
        ) * q;
        #[rustfmt::skip]
        let observation = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        Self {
            state: Vector4::new(position.x, position.y, velocity.x, velocity.y),
            covariance: Matrix4::from_diagonal(&Vector4::new(r, r, v0, v0)),
            transition,
            process,
            observation,
            measurement: Matrix2::from_diagonal(&Vector2::new(r, r)),
        }
    }

    /// Advance one frame and return the predicted position.
    pub fn predict(&mut self) -> Point2 {
        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process;
        self.position()
    }

    /// Mahalanobis distance of a measurement from the current prediction.
    pub fn innovation_sigmas(&self, z: Point2) -> f64 {
        let innovation = Vector2::new(z.x, z.y) - self.observation * self.state;
        let s = self.innovation_covariance();
        match s.try_inverse() {
            Some(s_inv) => (innovation.transpose() * s_inv * innovation)[(0, 0)].max(0.0).sqrt(),
            None => f64::INFINITY,
        }
    }

    /// Fold in a measurement and return the filtered position.
    pub fn update(&mut self, z: Point2) -> Point2 {
        let innovation = Vector2::new(z.x, z.y) - self.observation * self.state;
        let s = self.innovation_covariance();
        let Some(s_inv) = s.try_inverse() else {
            return self.position();
        };
        let gain = self.covariance * self.observation.transpose() * s_inv;
        self.state += gain * innovation;
        self.covariance = (Matrix4::identity() - gain * self.observation) * self.covariance;
        self.position()
    }

    /// Pull the position estimate to within `max_distance` of `anchor`.
    pub fn clamp_towards(&mut self, anchor: Point2, max_distance: f64) {
        let pos = self.position();
        let d = pos.distance(&anchor);
        if d > max_distance && d > 0.0 {
            let k = max_distance / d;
            self.state[0] = anchor.x + (pos.x - anchor.x) * k;
            self.state[1] = anchor.y + (pos.y - anchor.y) * k;
        }
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> Point2 {
        Point2::new(self.state[2], self.state[3])
    }

    fn innovation_covariance(&self) -> Matrix2<f64> {
        self.observation * self.covariance * self.observation.transpose() + self.measurement
    }
}
