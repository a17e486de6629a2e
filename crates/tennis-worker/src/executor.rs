//! Job executor.
//!
//! Runs analysis jobs on a bounded number of slots. Each job gets its own
//! cancellation channel; a job timeout or a worker shutdown signals that
//! channel and gives the pipeline `shutdown_timeout` to unwind before the
//! run is aborted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tennis_models::{AnalysisJob, AnalyticsResult, JobId, JobState};
use tennis_vision::FrameSource;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::MatchPipeline;
use crate::sink::{JobFailure, ResultSink};

/// Handle to a submitted job.
pub struct JobHandle {
    job_id: JobId,
    cancel: Arc<watch::Sender<bool>>,
    task: JoinHandle<JobState>,
}

impl JobHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Request cooperative cancellation. Nothing is committed afterwards.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the job to reach a terminal state.
    pub async fn join(self) -> JobState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                error!(job_id = %self.job_id, "Job task failed: {}", e);
                JobState::Failed
            }
        }
    }
}

/// Job executor that runs jobs through the pipeline and hands outcomes to a sink.
pub struct JobExecutor {
    config: WorkerConfig,
    pipeline: Arc<MatchPipeline>,
    sink: Arc<dyn ResultSink>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, pipeline: MatchPipeline, sink: Arc<dyn ResultSink>) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);
        let pipeline = pipeline.with_queue_capacity(config.queue_capacity);

        Self {
            config,
            pipeline: Arc::new(pipeline),
            sink,
            job_semaphore,
            shutdown,
        }
    }

    /// Start a job once a slot is free.
    ///
    /// Waits for a slot, so a full executor applies backpressure to the
    /// caller. Fails only when the executor is shutting down; the source is
    /// closed in that case.
    pub async fn submit(
        &self,
        job: AnalysisJob,
        mut source: Box<dyn FrameSource>,
    ) -> WorkerResult<JobHandle> {
        let shutting_down = *self.shutdown.borrow();
        if shutting_down {
            source.close().await;
            return Err(WorkerError::ShuttingDown);
        }

        let permit = match Arc::clone(&self.job_semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                source.close().await;
                return Err(WorkerError::ShuttingDown);
            }
        };
        self.report_active_jobs();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel = Arc::new(cancel_tx);
        let job_id = job.id.clone();

        let ctx = JobContext {
            pipeline: Arc::clone(&self.pipeline),
            sink: Arc::clone(&self.sink),
            semaphore: Arc::clone(&self.job_semaphore),
            max_jobs: self.config.max_concurrent_jobs.max(1),
            cancel: Arc::clone(&cancel),
            shutdown: self.shutdown.subscribe(),
            job_timeout: self.config.job_timeout,
            grace: self.config.shutdown_timeout,
        };
        let task = tokio::spawn(Self::execute_job(ctx, permit, job, source, cancel_rx));

        Ok(JobHandle {
            job_id,
            cancel,
            task,
        })
    }

    /// Execute a single job and record its outcome.
    async fn execute_job(
        ctx: JobContext,
        permit: OwnedSemaphorePermit,
        job: AnalysisJob,
        source: Box<dyn FrameSource>,
        cancel_rx: watch::Receiver<bool>,
    ) -> JobState {
        let job_id = job.id.clone();
        let match_id = job.metadata.match_id.clone();
        info!(job_id = %job_id, match_id = %match_id, "Executing job");
        metrics::record_job_started();
        let started = Instant::now();

        let pipeline = Arc::clone(&ctx.pipeline);
        let run = tokio::spawn(async move { pipeline.run(&job, source, cancel_rx).await });
        let result = supervise(run, &ctx).await;

        let state = match result {
            Ok(result) => match ctx.sink.commit(result).await {
                Ok(()) => {
                    let secs = started.elapsed().as_secs_f64();
                    metrics::record_job_completed(secs);
                    info!(job_id = %job_id, duration_secs = secs, "Job completed successfully");
                    JobState::Completed
                }
                Err(e) => {
                    error!(job_id = %job_id, "Failed to commit result: {}", e);
                    record_failure(&ctx, JobFailure::new(job_id.clone(), match_id, &e), &e).await;
                    JobState::Failed
                }
            },
            Err(e) => {
                let state = if e.is_cancellation() {
                    warn!(job_id = %job_id, "Job stopped: {}", e);
                    JobState::Cancelled
                } else {
                    error!(job_id = %job_id, fatal = e.is_fatal(), "Job failed: {}", e);
                    JobState::Failed
                };
                record_failure(&ctx, JobFailure::new(job_id.clone(), match_id, &e), &e).await;
                state
            }
        };

        drop(permit);
        metrics::set_active_jobs(ctx.max_jobs - ctx.semaphore.available_permits());
        state
    }

    /// Wait for all in-flight jobs to complete.
    pub async fn wait_for_jobs(&self) {
        let max_jobs = self.config.max_concurrent_jobs.max(1);
        loop {
            let available = self.job_semaphore.available_permits();
            if available == max_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Signal shutdown. Running jobs are cancelled; new submissions fail.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Signal shutdown and wait for in-flight jobs, up to `shutdown_timeout`.
    ///
    /// Returns false if jobs were still running when the wait gave up.
    pub async fn shutdown_and_wait(&self) -> bool {
        self.shutdown();
        info!("Waiting for in-flight jobs to complete...");
        let drained = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_ok();
        if drained {
            info!("Job executor stopped");
        } else {
            warn!("Shutdown timeout elapsed with jobs still running");
        }
        drained
    }

    pub fn active_jobs(&self) -> usize {
        self.config.max_concurrent_jobs.max(1) - self.job_semaphore.available_permits()
    }

    fn report_active_jobs(&self) {
        metrics::set_active_jobs(self.active_jobs());
    }
}

/// What a running job needs besides its input.
struct JobContext {
    pipeline: Arc<MatchPipeline>,
    sink: Arc<dyn ResultSink>,
    semaphore: Arc<Semaphore>,
    max_jobs: usize,
    cancel: Arc<watch::Sender<bool>>,
    shutdown: watch::Receiver<bool>,
    job_timeout: Duration,
    grace: Duration,
}

/// Drive a pipeline run against the job timeout and worker shutdown.
///
/// A timeout or shutdown signals cancellation; if the run has not unwound
/// after the grace period it is aborted. The pipeline closes its frame
/// source as soon as it sees the signal, even mid-decode, so an abort only
/// drops a source that a stage held past the grace period.
async fn supervise(
    mut run: JoinHandle<WorkerResult<AnalyticsResult>>,
    ctx: &JobContext,
) -> WorkerResult<AnalyticsResult> {
    let mut shutdown = ctx.shutdown.clone();
    let timer = tokio::time::sleep(ctx.job_timeout);
    tokio::pin!(timer);

    let mut timed_out = false;
    let mut unwinding = false;
    let mut watching_shutdown = true;

    let result = loop {
        tokio::select! {
            joined = &mut run => break joined.map_err(|e| {
                if e.is_panic() {
                    WorkerError::JobPanicked(e.to_string())
                } else {
                    WorkerError::stage_failed(format!("pipeline task ended: {}", e))
                }
            }).and_then(|r| r),
            _ = &mut timer => {
                if unwinding {
                    warn!("Pipeline did not unwind in time, aborting");
                    run.abort();
                    break Err(WorkerError::Cancelled);
                }
                debug!(timeout = ?ctx.job_timeout, "Job timeout reached, cancelling");
                timed_out = true;
                unwinding = true;
                ctx.cancel.send_replace(true);
                timer.as_mut().reset(tokio::time::Instant::now() + ctx.grace);
            }
            changed = shutdown.changed(), if watching_shutdown => {
                if changed.is_err() {
                    watching_shutdown = false;
                    continue;
                }
                let stop = *shutdown.borrow();
                if stop && !unwinding {
                    info!("Shutdown signal received, cancelling job");
                    unwinding = true;
                    ctx.cancel.send_replace(true);
                    timer.as_mut().reset(tokio::time::Instant::now() + ctx.grace);
                }
            }
        }
    };

    if timed_out {
        return Err(WorkerError::Timeout(ctx.job_timeout));
    }
    result
}

async fn record_failure(ctx: &JobContext, failure: JobFailure, error: &WorkerError) {
    metrics::record_job_failed(error.kind());
    if let Err(e) = ctx.sink.fail(failure).await {
        error!("Failed to record job failure: {}", e);
    }
}
