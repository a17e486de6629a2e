//! Ball tracker: Kalman smoothing, bounded gap filling and bounce detection.
//!
//! Short detection gaps are filled with the filter's prediction and flagged
//! `interpolated`. Once a gap exceeds `max_gap_frames` the track is lost: the
//! filter is dropped, a [`TrackingGapError`] is recorded for the span, and a
//! fresh filter starts on the next detection.
//!
//! Bounces are found in a post pass as local maxima of image-y (the ball is
//! lowest there) with a minimum pixel reversal on both sides. Monocular
//! footage has no true height, so this is approximate.

use tennis_models::{BallSample, BallTrajectory, CourtCalibration, Point2, ScoredBox, TrackingSubject};
use tracing::{debug, info};

use super::kalman::KalmanFilter2D;
use crate::config::BallTrackerConfig;
use crate::error::TrackingGapError;

/// Final ball tracker output.
#[derive(Debug, Clone)]
pub struct BallTrackingOutput {
    pub trajectory: BallTrajectory,
    pub gaps: Vec<TrackingGapError>,
}

pub struct BallTracker {
    config: BallTrackerConfig,
    calibration: CourtCalibration,
    fps: f64,
    filter: Option<KalmanFilter2D>,
    /// Consecutive frames without a detection while the filter is alive
    missed: u32,
    /// Frame/time where the current lost span began
    lost_since: Option<(u64, f64)>,
    last_frame: Option<(u64, f64)>,
    samples: Vec<BallSample>,
    gaps: Vec<TrackingGapError>,
    detections: u64,
    maneuvers: u64,
}

impl BallTracker {
    pub fn new(config: BallTrackerConfig, calibration: CourtCalibration, fps: f64) -> Self {
        Self {
            config,
            calibration,
            fps,
            filter: None,
            missed: 0,
            lost_since: None,
            last_frame: None,
            samples: Vec::new(),
            gaps: Vec::new(),
            detections: 0,
            maneuvers: 0,
        }
    }

    /// Process one frame. Must be called for every frame, in order.
    pub fn update(&mut self, frame_index: u64, timestamp: f64, detection: Option<&ScoredBox>) {
        let raw = detection.map(|d| d.bbox.center());
        let mut interpolated = false;

        let estimate = match raw {
            Some(z) => {
                self.detections += 1;
                Some(self.observe(z, frame_index, timestamp))
            }
            None => match self.filter.as_mut() {
                Some(filter) if self.missed < self.config.max_gap_frames => {
                    self.missed += 1;
                    interpolated = true;
                    filter.predict();
                    Some((filter.position(), filter.velocity()))
                }
                Some(_) => {
                    debug!(frame = frame_index, "Ball track lost");
                    self.filter = None;
                    self.missed = 0;
                    self.lost_since = Some((frame_index, timestamp));
                    None
                }
                None => None,
            },
        };

        let (position, velocity) = match estimate {
            Some((p, v)) => (Some(p), Some(v)),
            None => (None, None),
        };
        self.samples.push(BallSample {
            frame_index,
            timestamp,
            raw,
            position,
            velocity,
            court_position: position.and_then(|p| self.calibration.pixel_to_court(p)),
            speed_mps: velocity.map(|v| self.speed_mps(v)),
            interpolated,
            bounce: false,
        });
        self.last_frame = Some((frame_index, timestamp));
    }

    fn observe(&mut self, z: Point2, frame_index: u64, timestamp: f64) -> (Point2, Point2) {
        if let Some(start) = self.lost_since.take() {
            self.close_gap(start, frame_index, timestamp);
        }

        let max_correction = self.config.max_correction_sigmas * self.config.measurement_noise_px;
        let filter = match self.filter.take() {
            None => KalmanFilter2D::new(z, Point2::default(), &self.config),
            Some(mut filter) => {
                let previous = filter.position();
                let steps = (self.missed + 1) as f64;
                filter.predict();
                if filter.innovation_sigmas(z) > self.config.maneuver_gate_sigmas {
                    // Racket hit or bounce: restart from the measurement.
                    self.maneuvers += 1;
                    let velocity = Point2::new((z.x - previous.x) / steps, (z.y - previous.y) / steps);
                    KalmanFilter2D::new(z, velocity, &self.config)
                } else {
                    filter.update(z);
                    filter.clamp_towards(z, max_correction);
                    filter
                }
            }
        };

        self.missed = 0;
        let out = (filter.position(), filter.velocity());
        self.filter = Some(filter);
        out
    }

    fn close_gap(&mut self, start: (u64, f64), frame_index: u64, timestamp: f64) {
        let end_frame = frame_index.saturating_sub(1).max(start.0);
        let end_time = (timestamp - 1.0 / self.fps).max(start.1);
        let gap = TrackingGapError::new(TrackingSubject::Ball, start, (end_frame, end_time));
        debug!(error = %gap, "Ball tracking gap");
        self.gaps.push(gap);
    }

    fn speed_mps(&self, velocity_px_per_frame: Point2) -> f64 {
        let px = (velocity_px_per_frame.x.powi(2) + velocity_px_per_frame.y.powi(2)).sqrt();
        px * self.fps * self.calibration.pixel_to_meter
    }

    /// Close open gaps, detect bounces and summarize.
    pub fn finish(mut self) -> BallTrackingOutput {
        if let (Some(start), Some((last_index, last_time))) = (self.lost_since.take(), self.last_frame) {
            let gap = TrackingGapError::new(TrackingSubject::Ball, start, (last_index, last_time));
            self.gaps.push(gap);
        }

        let bounces = detect_bounces(&mut self.samples, &self.config);

        let frames = self.samples.len();
        let detection_rate = if frames == 0 {
            0.0
        } else {
            self.detections as f64 / frames as f64
        };
        let reliable = frames > 0 && detection_rate >= self.config.min_detection_rate;

        info!(
            frames,
            detection_rate,
            reliable,
            bounces,
            maneuvers = self.maneuvers,
            gaps = self.gaps.len(),
            "Ball tracking finished"
        );

        BallTrackingOutput {
            trajectory: BallTrajectory {
                samples: self.samples,
                detection_rate,
                reliable,
                gaps: self.gaps.iter().map(|g| g.gap).collect(),
            },
            gaps: self.gaps,
        }
    }
}

/// Flag bounces in place and return how many were found.
///
/// A sample is a bounce when, over `bounce_window` frames on each side, the
/// ball descends monotonically into it and rises monotonically out of it
/// (image y), and both sides move at least `min_reversal_px`.
pub fn detect_bounces(samples: &mut [BallSample], config: &BallTrackerConfig) -> usize {
    let w = config.bounce_window.max(1);
    let n = samples.len();
    if n < 2 * w + 1 {
        return 0;
    }

    let ys: Vec<Option<f64>> = samples.iter().map(|s| s.position.map(|p| p.y)).collect();
    let mut flagged: Vec<usize> = Vec::new();

    for i in w..n - w {
        let window: Option<Vec<f64>> = ys[i - w..=i + w].iter().copied().collect();
        let Some(window) = window else {
            continue;
        };
        let centre = window[w];
        let descending = window[..=w].windows(2).all(|p| p[1] >= p[0]);
        let rising = window[w..].windows(2).all(|p| p[1] <= p[0]);
        let reversal = centre - window[0] >= config.min_reversal_px
            && centre - window[2 * w] >= config.min_reversal_px;

        if descending && rising && reversal {
            if flagged.last().is_some_and(|&prev| i - prev <= w) {
                continue;
            }
            flagged.push(i);
        }
    }

    for &i in &flagged {
        samples[i].bounce = true;
    }
    flagged.len()
}
