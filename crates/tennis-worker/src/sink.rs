//! Result persistence seam.
//!
//! A run either commits one complete [`AnalyticsResult`] or records one
//! [`JobFailure`]; never both, never a partial result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

use tennis_models::{AnalyticsResult, JobId, MatchId};

use crate::error::{WorkerError, WorkerResult};

/// Why a job produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub job_id: JobId,
    pub match_id: MatchId,
    /// Short error label, see [`WorkerError::kind`]
    pub kind: String,
    pub message: String,
    pub retryable: bool,
    pub failed_at: DateTime<Utc>,
}

impl JobFailure {
    pub fn new(job_id: JobId, match_id: MatchId, error: &WorkerError) -> Self {
        Self {
            job_id,
            match_id,
            kind: error.kind().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            failed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist a complete result atomically.
    async fn commit(&self, result: AnalyticsResult) -> WorkerResult<()>;

    /// Record that a job ended without a result.
    async fn fail(&self, failure: JobFailure) -> WorkerResult<()>;
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<AnalyticsResult>>,
    failures: Mutex<Vec<JobFailure>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<AnalyticsResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn failures(&self) -> Vec<JobFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn commit(&self, result: AnalyticsResult) -> WorkerResult<()> {
        self.results
            .lock()
            .map_err(|_| WorkerError::sink("result store poisoned"))?
            .push(result);
        Ok(())
    }

    async fn fail(&self, failure: JobFailure) -> WorkerResult<()> {
        self.failures
            .lock()
            .map_err(|_| WorkerError::sink("failure store poisoned"))?
            .push(failure);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_failures() {
        let sink = MemorySink::new();
        let failure = JobFailure::new(
            JobId::from_string("job-1"),
            MatchId::new("m-1"),
            &WorkerError::Cancelled,
        );
        tokio_test::assert_ok!(sink.fail(failure).await);

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, "cancelled");
        assert!(sink.results().is_empty());
    }
}
