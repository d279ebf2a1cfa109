//! Error taxonomy for the topological similarity engine.
//!
//! Errors fall into four families:
//! - **Input**: malformed or inconsistent ingestion data and unknown query ids.
//!   Fatal to the run.
//! - **Numeric**: degenerate cosine inputs and singular covariance. Returned by the
//!   strict primitives; the distance builder recovers with a documented fallback and
//!   records a [`crate::distance::NumericFlag`].
//! - **Ordering**: misuse of the cluster evolution tracker. Fatal.
//! - **Io**: artifact persistence.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TopoError>;

/// Coarse classification of a [`TopoError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Numeric,
    Ordering,
    Io,
}

#[derive(Debug, Error)]
pub enum TopoError {
    /// Wrong identifier, non-finite component, or otherwise unusable vector.
    #[error("Invalid feature vector for query {query}: {reason}")]
    InvalidFeatureVector { query: usize, reason: String },

    #[error("Unknown query {query}")]
    UnknownQuery { query: usize },

    /// Feature vectors of inconsistent length within one run.
    #[error("Dimension mismatch for query {query}: expected {expected}, actual {actual}")]
    DimensionMismatch {
        query: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Zero-norm vector passed to the cosine metric.
    #[error("Degenerate (zero-norm) vector for query {query}")]
    DegenerateVector { query: usize },

    #[error("Singular covariance matrix ({dimension}x{dimension}), pivot {pivot:.3e}")]
    SingularCovariance { dimension: usize, pivot: f64 },

    /// `flows_between` called with a later partition first.
    #[error("Invalid flow order: threshold {from} is greater than {to}")]
    InvalidFlowOrder { from: f64, to: f64 },

    /// A cluster of the earlier partition is split across the later one.
    #[error("Cluster {cluster} is not contained in a single later cluster")]
    NonNestedPartition { cluster: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TopoError {
    pub fn invalid_vector(query: usize, reason: impl Into<String>) -> Self {
        Self::InvalidFeatureVector {
            query,
            reason: reason.into(),
        }
    }

    pub fn dimension_mismatch(query: usize, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            query,
            expected,
            actual,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            TopoError::InvalidFeatureVector { .. }
            | TopoError::UnknownQuery { .. }
            | TopoError::DimensionMismatch { .. }
            | TopoError::InvalidParameter { .. } => ErrorCategory::Input,
            TopoError::DegenerateVector { .. } | TopoError::SingularCovariance { .. } => {
                ErrorCategory::Numeric
            }
            TopoError::InvalidFlowOrder { .. } | TopoError::NonNestedPartition { .. } => {
                ErrorCategory::Ordering
            }
            TopoError::Io(_) | TopoError::Serialization(_) => ErrorCategory::Io,
        }
    }

    /// Numeric errors have a fallback; everything else aborts the stage.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::Numeric
    }
}
