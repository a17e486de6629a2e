//! End-to-end pipeline and executor tests over the scripted synthetic match.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use tennis_models::{
    CalibrationMethod, Degradation, JobState, MatchMetadata, PlayerId, Point2, ServeOutcome,
    ShotOutcome, ShotType, TrackingSubject,
};
use tennis_vision::detection::ScriptedDetector;
use tennis_vision::{
    DecodeError, Frame, FrameSource, HeuristicShotClassifier, SharedModels, VecFrameSource,
};
use tennis_worker::synthetic::{FPS, FRAME_COUNT};
use tennis_worker::{
    JobExecutor, MatchPipeline, MemorySink, PipelineConfig, SyntheticMatch, WorkerConfig,
    WorkerError,
};

/// Source that sleeps before every frame.
struct SlowSource {
    inner: VecFrameSource,
    delay: Duration,
}

#[async_trait]
impl FrameSource for SlowSource {
    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        tokio::time::sleep(self.delay).await;
        self.inner.next_frame().await
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

/// Source that raises the cancel flag when frame `at` is requested.
struct CancelAt {
    inner: VecFrameSource,
    at: u64,
    served: u64,
    cancel: watch::Sender<bool>,
}

#[async_trait]
impl FrameSource for CancelAt {
    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.served == self.at {
            self.cancel.send_replace(true);
        }
        self.served += 1;
        self.inner.next_frame().await
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

/// Source whose decode never completes from frame `at` on.
struct StallAt {
    inner: VecFrameSource,
    at: u64,
    served: u64,
}

#[async_trait]
impl FrameSource for StallAt {
    fn fps(&self) -> f64 {
        self.inner.fps()
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        if self.served >= self.at {
            std::future::pending::<()>().await;
        }
        self.served += 1;
        self.inner.next_frame().await
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

fn pipeline(models: SharedModels) -> MatchPipeline {
    MatchPipeline::new(PipelineConfig::default(), models)
}

fn not_cancelled() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[tokio::test]
async fn test_synthetic_match_end_to_end() {
    let synthetic = SyntheticMatch::new("synthetic-1");
    let result = pipeline(synthetic.models.clone())
        .run(&synthetic.job, Box::new(synthetic.source()), not_cancelled())
        .await
        .unwrap();

    assert_eq!(result.frames_processed, FRAME_COUNT);
    assert_eq!(result.fps, FPS);
    assert_eq!(result.match_id.as_str(), "synthetic-1");
    assert_eq!(result.calibration.method, CalibrationMethod::Manual);
    assert!(!result.calibration.degraded);
    assert_eq!(result.players.len(), 2);

    let shots = &result.shots;
    assert_eq!(shots.len(), 3);
    assert_eq!(shots[0].shot_type, ShotType::Serve);
    assert_eq!(shots[0].player, PlayerId::One);
    assert_eq!(shots[0].outcome, ShotOutcome::Winner);
    assert_eq!(shots[1].outcome, ShotOutcome::InPlay);
    assert_eq!(shots[2].player, PlayerId::Two);
    assert_eq!(shots[2].outcome, ShotOutcome::Winner);

    assert_eq!(result.points.len(), 2);
    assert_eq!(result.points[0].serve_outcome, ServeOutcome::Ace);
    assert_eq!(result.points[0].winner, Some(PlayerId::One));
    assert_eq!(result.points[1].serve_outcome, ServeOutcome::In);
    assert_eq!(result.points[1].winner, Some(PlayerId::Two));

    let stats = &result.stats;
    assert_eq!(stats.total_shots, 3);
    assert_eq!(stats.total_points, 2);
    assert!(stats.positional_reliable);
    assert!(stats.ball_reliable);
    assert_eq!(stats.players[&PlayerId::One].serve.aces, 1);
    assert!(stats.players[&PlayerId::One].heatmap.is_some());

    // The ball leaves the frame between points.
    assert!(result.degradations.iter().all(|d| matches!(
        d,
        Degradation::TrackingGap { gap } if gap.subject == TrackingSubject::Ball
    )));
    assert!(!result.degradations.is_empty());
}

#[tokio::test]
async fn test_result_is_deterministic() {
    let first = SyntheticMatch::new("det");
    let second = SyntheticMatch::new("det");
    let a = pipeline(first.models.clone())
        .run(&first.job, Box::new(first.source()), not_cancelled())
        .await
        .unwrap();
    let b = pipeline(second.models.clone())
        .run(&second.job, Box::new(second.source()), not_cancelled())
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_string(&a.stats).unwrap(),
        serde_json::to_string(&b.stats).unwrap()
    );
    assert_eq!(a.shots, b.shots);
}

#[tokio::test]
async fn test_failed_calibration_runs_degraded() {
    let tiny = [
        Point2::new(10.0, 10.0),
        Point2::new(12.0, 10.0),
        Point2::new(12.0, 12.0),
        Point2::new(10.0, 12.0),
    ];
    let synthetic =
        SyntheticMatch::with_metadata(MatchMetadata::new("degraded").with_court_corners(tiny));
    let result = pipeline(synthetic.models.clone())
        .run(&synthetic.job, Box::new(synthetic.source()), not_cancelled())
        .await
        .unwrap();

    assert!(result.calibration.degraded);
    assert_eq!(result.calibration.method, CalibrationMethod::Approximate);
    assert!(result.is_degraded());
    assert!(result
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::Calibration { .. })));
    assert!(result.stats.low_confidence);
    assert!(!result.stats.positional_reliable);
    assert!(result
        .stats
        .players
        .values()
        .all(|p| p.heatmap.is_none() && p.court_coverage_pct.is_none()));
}

#[tokio::test]
async fn test_cancel_before_start_closes_source() {
    let synthetic = SyntheticMatch::new("cancel-early");
    let source = synthetic.source();
    let closed = source.closed_flag();
    let (_tx, rx) = watch::channel(true);

    let err = pipeline(synthetic.models.clone())
        .run(&synthetic.job, Box::new(source), rx)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Cancelled));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancel_mid_stream_closes_source() {
    let synthetic = SyntheticMatch::new("cancel-mid");
    let inner = synthetic.source();
    let closed = inner.closed_flag();
    let (tx, rx) = watch::channel(false);
    let source = CancelAt {
        inner,
        at: 50,
        served: 0,
        cancel: tx,
    };

    let err = pipeline(synthetic.models.clone())
        .run(&synthetic.job, Box::new(source), rx)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Cancelled));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancel_during_stalled_sample_closes_source() {
    let synthetic = SyntheticMatch::new("stall-sample");
    let inner = synthetic.source();
    let closed = inner.closed_flag();
    let source = StallAt {
        inner,
        at: 2,
        served: 0,
    };
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(true);
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        pipeline(synthetic.models.clone()).run(&synthetic.job, Box::new(source), rx),
    )
    .await
    .expect("pipeline should unwind on cancel")
    .unwrap_err();

    assert!(matches!(err, WorkerError::Cancelled));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_decode_failure_is_fatal() {
    let synthetic = SyntheticMatch::new("corrupt");
    let source = synthetic.source().with_failure_at(20);
    let closed = source.closed_flag();

    let err = pipeline(synthetic.models.clone())
        .run(&synthetic.job, Box::new(source), not_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Decode(DecodeError::Stream { frame_index: 20, .. })
    ));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_empty_stream() {
    let synthetic = SyntheticMatch::new("empty");
    let err = pipeline(synthetic.models.clone())
        .run(
            &synthetic.job,
            Box::new(VecFrameSource::new(FPS, Vec::new())),
            not_cancelled(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Decode(DecodeError::EmptyStream)));
}

#[tokio::test]
async fn test_no_players_detected() {
    let synthetic = SyntheticMatch::new("no-players");
    let models = SharedModels::new(
        Arc::new(ScriptedDetector::new(Vec::new())),
        Arc::new(HeuristicShotClassifier::default()),
    );

    let err = pipeline(models)
        .run(&synthetic.job, Box::new(synthetic.source()), not_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkerError::Decode(DecodeError::NoPlayersDetected { frames }) if frames == FRAME_COUNT
    ));
}

#[tokio::test]
async fn test_model_failure_is_fatal() {
    let synthetic = SyntheticMatch::new("model-failure");
    let models = SharedModels::new(
        Arc::new(ScriptedDetector::default().failing_at(30)),
        Arc::new(HeuristicShotClassifier::default()),
    );
    let source = synthetic.source();
    let closed = source.closed_flag();

    let err = pipeline(models)
        .run(&synthetic.job, Box::new(source), not_cancelled())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "vision");
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_invalid_metadata_rejected() {
    let synthetic = SyntheticMatch::with_metadata(MatchMetadata::new("  "));
    let source = synthetic.source();
    let closed = source.closed_flag();

    let err = pipeline(synthetic.models.clone())
        .run(&synthetic.job, Box::new(source), not_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::InvalidMetadata(_)));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_executor_commits_result() {
    let synthetic = SyntheticMatch::new("executor-ok");
    let sink = Arc::new(MemorySink::new());
    let executor = JobExecutor::new(
        WorkerConfig::default(),
        pipeline(synthetic.models.clone()),
        sink.clone(),
    );

    let handle = executor
        .submit(synthetic.job.clone(), Box::new(synthetic.source()))
        .await
        .unwrap();
    assert_eq!(handle.join().await, JobState::Completed);

    let results = sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].job_id, synthetic.job.id);
    assert!(sink.failures().is_empty());
}

#[tokio::test]
async fn test_cancelled_job_commits_nothing() {
    let synthetic = SyntheticMatch::new("executor-cancel");
    let sink = Arc::new(MemorySink::new());
    let executor = JobExecutor::new(
        WorkerConfig::default(),
        pipeline(synthetic.models.clone()),
        sink.clone(),
    );
    let inner = synthetic.source();
    let closed = inner.closed_flag();
    let source = SlowSource {
        inner,
        delay: Duration::from_millis(5),
    };

    let handle = executor
        .submit(synthetic.job.clone(), Box::new(source))
        .await
        .unwrap();
    handle.cancel();

    assert_eq!(handle.join().await, JobState::Cancelled);
    assert!(sink.results().is_empty());
    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, "cancelled");
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_job_timeout() {
    let synthetic = SyntheticMatch::new("executor-timeout");
    let sink = Arc::new(MemorySink::new());
    let config = WorkerConfig {
        job_timeout: Duration::from_millis(100),
        ..WorkerConfig::default()
    };
    let executor = JobExecutor::new(config, pipeline(synthetic.models.clone()), sink.clone());
    let inner = synthetic.source();
    let closed = inner.closed_flag();
    let source = SlowSource {
        inner,
        delay: Duration::from_millis(10),
    };

    let handle = executor
        .submit(synthetic.job.clone(), Box::new(source))
        .await
        .unwrap();

    assert_eq!(handle.join().await, JobState::Cancelled);
    assert!(sink.results().is_empty());
    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, "timeout");
    assert!(failures[0].retryable);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_job_timeout_with_stalled_decode_closes_source() {
    let synthetic = SyntheticMatch::new("executor-stall");
    let sink = Arc::new(MemorySink::new());
    let config = WorkerConfig {
        job_timeout: Duration::from_millis(100),
        shutdown_timeout: Duration::from_secs(2),
        ..WorkerConfig::default()
    };
    let executor = JobExecutor::new(config, pipeline(synthetic.models.clone()), sink.clone());
    let inner = synthetic.source();
    let closed = inner.closed_flag();
    let source = StallAt {
        inner,
        at: 20,
        served: 0,
    };

    let started = std::time::Instant::now();
    let handle = executor
        .submit(synthetic.job.clone(), Box::new(source))
        .await
        .unwrap();

    assert_eq!(handle.join().await, JobState::Cancelled);
    // Unwound on the cancel signal rather than by abort after the grace period.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(closed.load(Ordering::SeqCst));
    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, "timeout");
}

#[tokio::test]
async fn test_shutdown_cancels_running_jobs() {
    let synthetic = SyntheticMatch::new("executor-shutdown");
    let sink = Arc::new(MemorySink::new());
    let executor = JobExecutor::new(
        WorkerConfig::default(),
        pipeline(synthetic.models.clone()),
        sink.clone(),
    );
    let source = SlowSource {
        inner: synthetic.source(),
        delay: Duration::from_millis(10),
    };

    let handle = executor
        .submit(synthetic.job.clone(), Box::new(source))
        .await
        .unwrap();

    assert!(executor.shutdown_and_wait().await);
    assert_eq!(executor.active_jobs(), 0);
    assert_eq!(handle.join().await, JobState::Cancelled);
    assert!(sink.results().is_empty());

    let late = executor
        .submit(synthetic.job.clone(), Box::new(synthetic.source()))
        .await;
    assert!(matches!(late, Err(WorkerError::ShuttingDown)));
}
