//! Error types for the muscle detector.
//!
//! Only [`MuscleError::DegenerateSignal`] is recoverable: a flat channel is
//! dropped from aggregation and reported as a [`SkippedChannel`](crate::SkippedChannel).
//! Every other variant aborts the detection for the current recording and
//! sensor type.
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, MuscleError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MuscleError {
    /// A parameter is invalid relative to the sampling rate.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Zero channels or zero samples.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// A channel's envelope has zero variance.
    #[error("channel {channel} ({name}) is degenerate: {reason}")]
    DegenerateSignal {
        channel: usize,
        name: String,
        reason: String,
    },

    /// Array dimensions disagree with the accompanying metadata.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl MuscleError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        MuscleError::Config(msg.into())
    }

    pub(crate) fn empty(msg: impl Into<String>) -> Self {
        MuscleError::EmptyInput(msg.into())
    }
}
