//! Error types for the vision stages.

use std::fmt;

use tennis_models::{TrackingGap, TrackingSubject};
use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Result type for court calibration.
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Errors that abort a vision operation.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Model inference failed: {0}")]
    Model(String),

    #[error("Model output violates the inference contract: {0}")]
    ModelContract(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create a model failure error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Create a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ModelContract(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Broken input; the run cannot produce a result.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// The frame stream is unusable. Always fatal for the run.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Frame stream failed at frame {frame_index}: {message}")]
    Stream { frame_index: u64, message: String },

    #[error("Frame stream contained no frames")]
    EmptyStream,

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("Frame {got} arrived after frame {previous}")]
    OutOfOrder { previous: u64, got: u64 },

    #[error("No players detected in {frames} frames")]
    NoPlayersDetected { frames: u64 },
}

impl DecodeError {
    pub fn stream(frame_index: u64, message: impl Into<String>) -> Self {
        Self::Stream {
            frame_index,
            message: message.into(),
        }
    }
}

/// Court geometry could not be recovered. The run continues in degraded mode.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalibrationError {
    #[error("Found {found} of 4 court corners")]
    InsufficientCorners { found: usize },

    #[error("Reprojection error {error_m:.3} m exceeds tolerance {tolerance_m:.3} m")]
    ReprojectionTooLarge { error_m: f64, tolerance_m: f64 },

    #[error("Degenerate court geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Calibration confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f64, threshold: f64 },
}

impl CalibrationError {
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateGeometry(message.into())
    }
}

/// A player or ball track was lost beyond tolerance for a span of frames.
///
/// Reported alongside tracker output; never aborts the run.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub struct TrackingGapError {
    pub gap: TrackingGap,
}

impl fmt::Display for TrackingGapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tracking lost for frames {}..={}",
            self.gap.subject, self.gap.start_frame, self.gap.end_frame
        )
    }
}

impl TrackingGapError {
    pub fn new(subject: TrackingSubject, start: (u64, f64), end: (u64, f64)) -> Self {
        Self {
            gap: TrackingGap {
                subject,
                start_frame: start.0,
                end_frame: end.0,
                start_time: start.1,
                end_time: end.1,
            },
        }
    }
}
