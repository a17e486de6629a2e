//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for analysis runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tennis_models::{JobId, MatchId};

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the job ID, match ID and stage name.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    match_id: String,
    stage: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, match_id: &MatchId, stage: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            match_id: match_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same job and match, different stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..self.clone()
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            match_id = %self.match_id,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            match_id = %self.match_id,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            match_id = %self.match_id,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            match_id = %self.match_id,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            match_id = %self.match_id,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            match_id = %self.match_id,
            stage = %self.stage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, &MatchId::new("m-1"), "calibration");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.stage(), "calibration");
    }

    #[test]
    fn test_for_stage_keeps_ids() {
        let logger = JobLogger::new(&JobId::from_string("job-1"), &MatchId::new("m-1"), "tracking");
        let next = logger.for_stage("shots");
        assert_eq!(next.job_id(), "job-1");
        assert_eq!(next.stage(), "shots");
    }
}
