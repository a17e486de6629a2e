//! Match analysis worker.
//!
//! This crate provides:
//! - The end-to-end match pipeline (calibration → tracking → shots → stats)
//! - Job executor with bounded concurrency, timeouts and cancellation
//! - Result sink seam for atomic persistence
//! - Structured job logging and Prometheus metrics
//! - A scripted synthetic match for self-checks

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod synthetic;

pub use config::{PipelineConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobHandle};
pub use logging::JobLogger;
pub use pipeline::MatchPipeline;
pub use sink::{JobFailure, MemorySink, ResultSink};
pub use synthetic::SyntheticMatch;
