//! Prometheus metrics for the analysis worker.
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests can call these freely.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_STARTED_TOTAL: &str = "tennis_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "tennis_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "tennis_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "tennis_jobs_active";
    pub const JOB_DURATION_SECONDS: &str = "tennis_job_duration_seconds";

    // Pipeline metrics
    pub const STAGE_DURATION_SECONDS: &str = "tennis_stage_duration_seconds";
    pub const FRAMES_PROCESSED_TOTAL: &str = "tennis_frames_processed_total";
    pub const SHOTS_DETECTED_TOTAL: &str = "tennis_shots_detected_total";
    pub const DEGRADED_RUNS_TOTAL: &str = "tennis_degraded_runs_total";
    pub const TRACKING_GAPS_TOTAL: &str = "tennis_tracking_gaps_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}

pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_frames_processed(count: u64) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(count);
}

pub fn record_shots_detected(count: usize) {
    counter!(names::SHOTS_DETECTED_TOTAL).increment(count as u64);
}

pub fn record_degraded_run(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::DEGRADED_RUNS_TOTAL, &labels).increment(1);
}

pub fn record_tracking_gap(subject: &str) {
    let labels = [("subject", subject.to_string())];
    counter!(names::TRACKING_GAPS_TOTAL, &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_job_started();
        record_job_failed("decode");
        record_stage_duration("tracking", 0.5);
        record_frames_processed(100);
        set_active_jobs(0);
    }

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            names::JOBS_STARTED_TOTAL,
            names::STAGE_DURATION_SECONDS,
            names::TRACKING_GAPS_TOTAL,
        ] {
            assert!(name.starts_with("tennis_"));
        }
    }
}
