//! End-to-end analysis of one match video.
//!
//! Stages run in order: calibration on a few buffered frames, then detection
//! and tracking over the whole stream, then shot detection, rally
//! segmentation and aggregation. Detection runs in its own task and feeds
//! the trackers through a bounded channel, so a slow tracker applies
//! backpressure to decoding.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use image::RgbImage;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use tennis_analytics::{segment_rallies, AggregationInput, MatchAggregator};
use tennis_models::{
    AnalysisJob, AnalyticsResult, Degradation, PlayerTrackSummary, TrackingGap,
};
use tennis_vision::geometry::CalibrationOutcome;
use tennis_vision::tracking::BallTrackingOutput;
use tennis_vision::{
    BallTracker, CourtCalibrator, DecodeError, DetectionAdapter, Frame, FrameObservation,
    FrameSource, PlayerTracker, PlayerTrackingOutput, SharedModels, ShotDetector, VisionError,
    VisionResult,
};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Video time between tracking progress lines, seconds.
const PROGRESS_EVERY_SECS: f64 = 60.0;

/// Everything the tracking stage produced.
struct Tracked {
    players: PlayerTrackingOutput,
    ball: BallTrackingOutput,
    frames: u64,
}

/// Runs the full pipeline for one job.
#[derive(Clone)]
pub struct MatchPipeline {
    config: PipelineConfig,
    models: SharedModels,
    queue_capacity: usize,
}

impl MatchPipeline {
    pub fn new(config: PipelineConfig, models: SharedModels) -> Self {
        Self {
            config,
            models,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Frames buffered between detection and tracking.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyse one video.
    ///
    /// Returns a complete result or an error, never a partial result. The
    /// frame source is closed on every path, including cancellation.
    pub async fn run(
        &self,
        job: &AnalysisJob,
        source: Box<dyn FrameSource>,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<AnalyticsResult> {
        let logger = JobLogger::new(&job.id, &job.metadata.match_id, "pipeline");
        let span = logger.create_span();
        self.run_inner(job, source, cancel, &logger)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        job: &AnalysisJob,
        mut source: Box<dyn FrameSource>,
        cancel: watch::Receiver<bool>,
        logger: &JobLogger,
    ) -> WorkerResult<AnalyticsResult> {
        if let Err(reason) = job.metadata.validate() {
            source.close().await;
            return Err(WorkerError::invalid_metadata(reason));
        }

        let fps = source.fps();
        if !fps.is_finite() || fps <= 0.0 {
            source.close().await;
            return Err(DecodeError::InvalidFrameRate(fps).into());
        }

        // Calibration
        let calibration_log = logger.for_stage("calibration");
        calibration_log.log_start("sampling frames");
        let started = Instant::now();
        let buffered = match self.read_sample(source.as_mut(), &cancel).await {
            Ok(frames) if frames.is_empty() => {
                source.close().await;
                return Err(DecodeError::EmptyStream.into());
            }
            Ok(frames) => frames,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };
        let outcome = match self.calibrate(job, &buffered, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };
        metrics::record_stage_duration("calibration", started.elapsed().as_secs_f64());
        match &outcome.error {
            Some(err) => calibration_log.log_warning(&format!("running degraded: {}", err)),
            None => calibration_log.log_completion(&format!(
                "confidence {:.2}",
                outcome.calibration.confidence
            )),
        }

        // Detection and tracking
        let tracking_log = logger.for_stage("tracking");
        tracking_log.log_start(&format!("fps {:.2}", fps));
        let started = Instant::now();
        let tracked = self
            .track(source, buffered, &outcome, fps, cancel.clone(), &tracking_log)
            .await
            .inspect_err(|e| tracking_log.log_error(&e.to_string()))?;
        metrics::record_stage_duration("tracking", started.elapsed().as_secs_f64());
        metrics::record_frames_processed(tracked.frames);
        tracking_log.log_completion(&format!(
            "{} frames, {} player tracks, ball detection rate {:.2}",
            tracked.frames,
            tracked.players.tracks.len(),
            tracked.ball.trajectory.detection_rate
        ));
        ensure_not_cancelled(&cancel)?;

        // Shots
        let shots_log = logger.for_stage("shots");
        let started = Instant::now();
        let detector = ShotDetector::new(
            self.config.shots.clone(),
            Arc::clone(&self.models.classifier),
        );
        let detected = detector
            .detect(&tracked.players.tracks, &tracked.ball.trajectory)
            .await
            .inspect_err(|e| shots_log.log_error(&e.to_string()))?;
        metrics::record_stage_duration("shots", started.elapsed().as_secs_f64());
        metrics::record_shots_detected(detected.shots.len());
        shots_log.log_completion(&format!(
            "{} shots, {} low confidence",
            detected.shots.len(),
            detected.low_confidence
        ));
        ensure_not_cancelled(&cancel)?;

        // Rallies and aggregation
        let started = Instant::now();
        let segmented = segment_rallies(&detected.shots, &self.config.analytics.rally);

        let mut gaps: Vec<TrackingGap> = tracked
            .players
            .gaps
            .iter()
            .chain(tracked.ball.gaps.iter())
            .map(|g| g.gap)
            .collect();
        gaps.sort_by_key(|g| (g.start_frame, g.end_frame));

        let aggregator = MatchAggregator::new(self.config.analytics.aggregation.clone());
        let stats = aggregator.aggregate(&AggregationInput {
            shots: &detected.shots,
            rallies: &segmented.rallies,
            points: &segmented.points,
            tracks: &tracked.players.tracks,
            gaps: &gaps,
            calibration: &outcome.calibration,
            ball_reliable: tracked.ball.trajectory.reliable,
        });
        metrics::record_stage_duration("aggregation", started.elapsed().as_secs_f64());

        let degradations = collect_degradations(&outcome, &gaps, &tracked.ball);
        for degradation in &degradations {
            match degradation {
                Degradation::Calibration { .. } => metrics::record_degraded_run("calibration"),
                Degradation::TrackingGap { gap } => {
                    metrics::record_tracking_gap(&gap.subject.to_string())
                }
                Degradation::LowBallDetectionRate { .. } => metrics::record_degraded_run("ball"),
            }
        }
        if !degradations.is_empty() {
            logger.log_warning(&format!("{} degradations recorded", degradations.len()));
        }

        let players = tracked
            .players
            .tracks
            .iter()
            .map(|t| PlayerTrackSummary {
                track_id: t.track_id,
                player: t.player,
                side: t.side,
                final_state: t.state,
                frames_observed: t.frames.len(),
                total_distance_m: t.total_distance_m,
                reacquisitions: t.reacquisitions,
            })
            .collect();

        logger.log_completion(&format!(
            "{} points, {} rallies, {} shots",
            stats.total_points, stats.total_rallies, stats.total_shots
        ));

        Ok(AnalyticsResult {
            job_id: job.id.clone(),
            match_id: job.metadata.match_id.clone(),
            stats,
            shots: detected.shots,
            rallies: segmented.rallies,
            points: segmented.points,
            calibration: outcome.calibration,
            degradations,
            players,
            frames_processed: tracked.frames,
            fps,
            processed_at: Utc::now(),
        })
    }

    /// Buffer the first frames for calibration. They are replayed into
    /// detection afterwards.
    async fn read_sample(
        &self,
        source: &mut dyn FrameSource,
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<Vec<Frame>> {
        let wanted = self.config.calibration.sample_frames.max(1);
        let mut frames = Vec::with_capacity(wanted);
        let mut cancel = cancel.clone();
        while frames.len() < wanted {
            ensure_not_cancelled(&cancel)?;
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(WorkerError::Cancelled),
                next = source.next_frame() => next?,
            };
            match next {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        Ok(frames)
    }

    async fn calibrate(
        &self,
        job: &AnalysisJob,
        frames: &[Frame],
        cancel: &watch::Receiver<bool>,
    ) -> WorkerResult<CalibrationOutcome> {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .ok_or(DecodeError::EmptyStream)?;
        let images: Vec<Arc<RgbImage>> = frames.iter().map(|f| Arc::clone(&f.image)).collect();
        let corners = job.metadata.court_corners;
        let calibrator = CourtCalibrator::new(self.config.calibration.clone());

        let task =
            tokio::task::spawn_blocking(move || calibrator.resolve(corners, &images, width, height));
        let mut cancel = cancel.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(WorkerError::Cancelled),
            joined = task => joined
                .map_err(|e| WorkerError::stage_failed(format!("calibration task failed: {}", e))),
        }
    }

    async fn track(
        &self,
        source: Box<dyn FrameSource>,
        buffered: Vec<Frame>,
        outcome: &CalibrationOutcome,
        fps: f64,
        cancel: watch::Receiver<bool>,
        log: &JobLogger,
    ) -> WorkerResult<Tracked> {
        let (tx, mut rx) = mpsc::channel(self.queue_capacity);
        let adapter = DetectionAdapter::new(
            Arc::clone(&self.models.detector),
            self.config.detection.clone(),
        );
        let producer = tokio::spawn(
            produce_observations(source, buffered, adapter, tx, cancel.clone())
                .in_current_span(),
        );

        let mut players = PlayerTracker::new(
            self.config.player_tracker.clone(),
            outcome.calibration.clone(),
            fps,
        );
        let mut ball = BallTracker::new(
            self.config.ball_tracker.clone(),
            outcome.calibration.clone(),
            fps,
        );

        let progress_every = progress_interval(fps);
        let mut frames = 0u64;
        let mut previous: Option<u64> = None;
        let consumed: WorkerResult<()> = async {
            while let Some(message) = rx.recv().await {
                ensure_not_cancelled(&cancel)?;
                let observation = message?;
                if let Some(prev) = previous {
                    if observation.index <= prev {
                        return Err(DecodeError::OutOfOrder {
                            previous: prev,
                            got: observation.index,
                        }
                        .into());
                    }
                }
                previous = Some(observation.index);

                players.update(&observation);
                ball.update(observation.index, observation.timestamp, observation.ball.as_ref());
                frames += 1;
                if frames % progress_every == 0 {
                    log.log_progress(&format!(
                        "{} frames ({:.0}s of video)",
                        frames,
                        observation.timestamp
                    ));
                }
            }
            Ok(())
        }
        .await;

        // Unblocks the producer if tracking stopped early.
        drop(rx);
        let joined = producer.await;
        consumed?;
        joined.map_err(|e| WorkerError::stage_failed(format!("detection task failed: {}", e)))?;
        ensure_not_cancelled(&cancel)?;

        if frames == 0 {
            return Err(DecodeError::EmptyStream.into());
        }
        let players = players.finish();
        if players.frames_with_players == 0 {
            return Err(DecodeError::NoPlayersDetected { frames }.into());
        }

        Ok(Tracked {
            players,
            ball: ball.finish(),
            frames,
        })
    }
}

/// Decode and detect every frame, buffered ones first. Stops at the end of
/// the stream, on the first error, on cancellation, or when the receiver is
/// gone. A pending decode is abandoned on cancellation. The source is closed
/// before the final error is reported.
async fn produce_observations(
    mut source: Box<dyn FrameSource>,
    buffered: Vec<Frame>,
    adapter: DetectionAdapter,
    tx: mpsc::Sender<VisionResult<FrameObservation>>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut buffered = buffered.into_iter();
    let failure = loop {
        if *cancel.borrow() {
            break Some(VisionError::Cancelled);
        }

        let frame = match buffered.next() {
            Some(frame) => frame,
            None => {
                let next = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => break Some(VisionError::Cancelled),
                    next = source.next_frame() => next,
                };
                match next {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break None,
                    Err(e) => break Some(e.into()),
                }
            }
        };

        match adapter.observe(&frame).await {
            Ok(observation) => {
                if tx.send(Ok(observation)).await.is_err() {
                    break None;
                }
            }
            Err(e) => break Some(e),
        }
    };
    source.close().await;
    if let Some(e) = failure {
        let _ = tx.send(Err(e)).await;
    }
}

/// Resolves once cancellation is signalled. Never resolves if the sender
/// is gone without having signalled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Frames between tracking progress lines.
fn progress_interval(fps: f64) -> u64 {
    (fps * PROGRESS_EVERY_SECS).round().max(1.0) as u64
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> WorkerResult<()> {
    let cancelled = *cancel.borrow();
    if cancelled {
        Err(WorkerError::Cancelled)
    } else {
        Ok(())
    }
}

fn collect_degradations(
    outcome: &CalibrationOutcome,
    gaps: &[TrackingGap],
    ball: &BallTrackingOutput,
) -> Vec<Degradation> {
    let mut degradations = Vec::new();
    if let Some(err) = &outcome.error {
        degradations.push(Degradation::Calibration {
            reason: err.to_string(),
            confidence: outcome.calibration.confidence,
        });
    }
    degradations.extend(gaps.iter().map(|gap| Degradation::TrackingGap { gap: *gap }));
    if !ball.trajectory.reliable {
        degradations.push(Degradation::LowBallDetectionRate {
            rate: ball.trajectory.detection_rate,
        });
    }
    degradations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_interval_follows_frame_rate() {
        assert_eq!(progress_interval(25.0), 1500);
        assert_eq!(progress_interval(29.97), 1798);
        assert_eq!(progress_interval(0.001), 1);
    }
}
