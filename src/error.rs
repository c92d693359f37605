//! Engine Errors
//!
//! Typed failures surfaced by metric persistence and decoding.

use std::path::PathBuf;

/// Errors produced by the analytics engine
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("Metrics file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Malformed metric at index {index}: {reason}")]
    MalformedMetric { index: usize, reason: String },

    #[error("Invalid metrics filename: {0:?}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyticsError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        AnalyticsError::MalformedMetric {
            index: 0,
            reason: reason.into(),
        }
    }

    /// Attach the position of the offending element in a persisted array
    pub(crate) fn at_index(self, index: usize) -> Self {
        match self {
            AnalyticsError::MalformedMetric { reason, .. } => {
                AnalyticsError::MalformedMetric { index, reason }
            }
            other => other,
        }
    }

    /// Returns true when the error is the missing-file condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalyticsError::NotFound { .. })
    }
}
