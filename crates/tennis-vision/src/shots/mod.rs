//! Shot segmentation and classification.
//!
//! Runs after tracking over the whole trajectory:
//! 1. [`segmenter::find_contacts`] finds racket contacts
//! 2. each contact gets a pose window and trajectory segment for the classifier
//! 3. direction, outcome and serve type come from the first bounce after the
//!    contact and whether the next shot kept the ball in play

pub mod attributes;
pub mod segmenter;
pub mod window;

use std::sync::Arc;
use tennis_models::{
    BallSample, BallTrajectory, CourtSide, PlayerTrack, Point2, ShotEvent,
};
use tracing::{debug, info};

use crate::config::ShotConfig;
use crate::detection::{ShotClassifierModel, ShotFeatures, ShotTypePrediction};
use crate::error::{VisionError, VisionResult};

pub use attributes::{serve_landed_in, serve_type, shot_direction, shot_outcome};
pub use segmenter::{find_contacts, ContactCandidate};
pub use window::{pose_window, WINDOW_COLUMNS};

#[derive(Debug, Clone, Default)]
pub struct ShotDetectorOutput {
    /// Shots in contact order with 1-indexed IDs
    pub shots: Vec<ShotEvent>,
    /// Bounces used as landing points
    pub bounces_used: usize,
    pub low_confidence: usize,
}

#[derive(Clone)]
pub struct ShotDetector {
    config: ShotConfig,
    classifier: Arc<dyn ShotClassifierModel>,
}

struct Bounce {
    frame_index: u64,
    court: Point2,
}

/// A contact with its classifier output, before the outcome is known.
struct ClassifiedContact<'a> {
    contact: &'a ContactCandidate,
    prediction: ShotTypePrediction,
    contact_court: Point2,
    hitter_side: CourtSide,
    landing: Option<Point2>,
    ball_speed_mps: Option<f64>,
}

impl ShotDetector {
    pub fn new(config: ShotConfig, classifier: Arc<dyn ShotClassifierModel>) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &ShotConfig {
        &self.config
    }

    /// Detect and classify every shot in a tracked video.
    pub async fn detect(
        &self,
        tracks: &[PlayerTrack],
        ball: &BallTrajectory,
    ) -> VisionResult<ShotDetectorOutput> {
        let samples = &ball.samples;
        let contacts = find_contacts(samples, tracks, &self.config);

        let exclusion = self.config.contact_exclusion_frames;
        let bounces: Vec<Bounce> = samples
            .iter()
            .filter(|s| s.bounce)
            .filter(|s| {
                !contacts
                    .iter()
                    .any(|c| c.frame_index.abs_diff(s.frame_index) <= exclusion)
            })
            .filter_map(|s| {
                s.court_position.map(|court| Bounce {
                    frame_index: s.frame_index,
                    court,
                })
            })
            .collect();

        // Classify every contact first: whether a shot was returned depends on
        // what the next shot is.
        let mut output = ShotDetectorOutput::default();
        let mut classified: Vec<ClassifiedContact<'_>> = Vec::with_capacity(contacts.len());
        for (k, contact) in contacts.iter().enumerate() {
            let track = tracks
                .iter()
                .find(|t| t.track_id == contact.track_id)
                .ok_or_else(|| {
                    VisionError::internal(format!("contact refers to unknown track {}", contact.track_id))
                })?;
            let Some(player_frame) = track.frame_at_or_before(contact.frame_index) else {
                continue;
            };

            let next = contacts.get(k + 1);
            let landing = bounces
                .iter()
                .find(|b| {
                    b.frame_index > contact.frame_index
                        && next.map_or(true, |n| b.frame_index < n.frame_index)
                })
                .map(|b| b.court);
            if landing.is_some() {
                output.bounces_used += 1;
            }

            let contact_court = player_frame.court;
            let hitter_side = CourtSide::of(&contact_court);
            let ball_speed_mps = peak_speed(samples, contact.sample_index, self.config.speed_window_frames);

            let features = ShotFeatures {
                pose_window: pose_window(
                    track,
                    contact.frame_index,
                    self.config.frames_before,
                    self.config.frames_after,
                ),
                trajectory: trajectory_segment(
                    samples,
                    contact.sample_index,
                    self.config.frames_before,
                    self.config.frames_after,
                ),
                ball_at_contact: contact.ball,
                player_bbox: player_frame.bbox,
                player_side: hitter_side,
                contact_court: Some(contact_court),
                ball_speed_mps,
                secs_since_previous_contact: k
                    .checked_sub(1)
                    .map(|p| contact.timestamp - contacts[p].timestamp),
            };

            let prediction = self.classifier.classify_shot(&features).await?;
            prediction.validate()?;

            classified.push(ClassifiedContact {
                contact,
                prediction,
                contact_court,
                hitter_side,
                landing,
                ball_speed_mps,
            });
        }

        for (k, c) in classified.iter().enumerate() {
            let low_confidence = c.prediction.confidence < self.config.low_confidence_threshold;
            if low_confidence {
                output.low_confidence += 1;
            }
            let is_serve = c.prediction.shot_type.is_serve();
            // Any later shot in time keeps the ball in play, including the same
            // player hitting again; a new serve does not.
            let returned = classified.get(k + 1).is_some_and(|n| {
                !n.prediction.shot_type.is_serve()
                    && n.contact.timestamp - c.contact.timestamp <= self.config.rally_timeout_secs
            });

            let shot = ShotEvent {
                id: (k + 1) as u32,
                timestamp: c.contact.timestamp,
                contact_frame: c.contact.frame_index,
                player: c.contact.player,
                track_id: c.contact.track_id,
                shot_type: c.prediction.shot_type,
                direction: shot_direction(Some(c.contact_court), c.landing, &self.config),
                outcome: shot_outcome(is_serve, c.hitter_side, c.landing, returned),
                court_position: Some(c.contact_court),
                landing: c.landing,
                confidence: c.prediction.confidence,
                low_confidence,
                ball_speed_mps: c.ball_speed_mps,
                serve_type: is_serve
                    .then(|| serve_type(Some(c.contact_court), c.landing, c.ball_speed_mps)),
            };
            debug!(
                shot_id = shot.id,
                frame = shot.contact_frame,
                player = %shot.player,
                shot_type = shot.shot_type.as_str(),
                outcome = ?shot.outcome,
                confidence = shot.confidence,
                "Shot classified"
            );
            output.shots.push(shot);
        }

        info!(
            shots = output.shots.len(),
            low_confidence = output.low_confidence,
            bounces = bounces.len(),
            "Shot detection finished"
        );
        Ok(output)
    }
}

/// Peak ball speed over the frames right after a contact.
fn peak_speed(samples: &[BallSample], at: usize, window: usize) -> Option<f64> {
    let end = (at + window).min(samples.len().saturating_sub(1));
    samples
        .get(at + 1..=end)?
        .iter()
        .filter_map(|s| s.speed_mps)
        .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
}

fn trajectory_segment(samples: &[BallSample], at: usize, before: usize, after: usize) -> Vec<Point2> {
    let start = at.saturating_sub(before);
    let end = (at + after).min(samples.len().saturating_sub(1));
    samples
        .get(start..=end)
        .map(|s| s.iter().filter_map(|s| s.position).collect())
        .unwrap_or_default()
}
