//! Worker and pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tennis_analytics::AnalyticsConfig;
use tennis_vision::{
    BallTrackerConfig, CalibrationConfig, DetectionConfig, PlayerTrackerConfig, ShotConfig,
};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Job timeout
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Frames buffered between detection and tracking
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            queue_capacity: 64,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .unwrap_or(defaults.max_concurrent_jobs)
                .max(1),
            job_timeout: env_parse("WORKER_JOB_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            queue_capacity: env_parse("WORKER_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity)
                .max(1),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Tunables for every pipeline stage.
///
/// Missing sections and fields fall back to their defaults, so a config file
/// only needs the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    pub player_tracker: PlayerTrackerConfig,
    pub ball_tracker: BallTrackerConfig,
    pub shots: ShotConfig,
    pub analytics: AnalyticsConfig,
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::config_error(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            WorkerError::config_error(format!("invalid pipeline config {}: {}", path.display(), e))
        })
    }

    /// Load from `PIPELINE_CONFIG_PATH` if set, defaults otherwise.
    pub fn from_env() -> WorkerResult<Self> {
        match std::env::var("PIPELINE_CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => Self::from_json_file(path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipeline_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ball_tracker": {{"max_gap_frames": 12}}, "analytics": {{"rally": {{"inter_shot_gap_secs": 6.0}}}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.ball_tracker.max_gap_frames, 12);
        assert_eq!(config.analytics.rally.inter_shot_gap_secs, 6.0);
        assert_eq!(config.shots, ShotConfig::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = PipelineConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }

    #[test]
    fn test_worker_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.queue_capacity, 64);
    }
}
