//! Error types for the indicator and interpretation engine.

use thiserror::Error;

/// Errors raised while validating input or computing an analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The series is shorter than the indicator needs.
    #[error("insufficient data for {indicator}: need {required} bars, got {actual}")]
    InsufficientData {
        /// Indicator that rejected the input (e.g. "RSI").
        indicator: &'static str,
        /// Required number of values.
        required: usize,
        /// Actual number of values provided.
        actual: usize,
    },

    /// Invalid indicator parameters (zero period, short >= long, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A price bar violates the high/low/open/close ordering or holds a non-finite value.
    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar {
        /// Position of the offending bar in the input.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Bar timestamps are not strictly ascending.
    #[error("bars out of order at index {index}")]
    UnorderedSeries {
        /// Position of the first bar that does not follow its predecessor.
        index: usize,
    },

    /// A computed field came out as NaN or infinity.
    #[error("non-finite value in field {field}")]
    NonFiniteValue {
        /// Name of the result field.
        field: &'static str,
    },
}

impl AnalysisError {
    /// Creates an `InsufficientData` error.
    #[must_use]
    pub fn insufficient(indicator: &'static str, required: usize, actual: usize) -> Self {
        AnalysisError::InsufficientData {
            indicator,
            required,
            actual,
        }
    }

    /// Creates an `InvalidParameter` error with a message.
    #[must_use]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter(msg.into())
    }

    /// Creates an `InvalidBar` error.
    #[must_use]
    pub fn invalid_bar(index: usize, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidBar {
            index,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
