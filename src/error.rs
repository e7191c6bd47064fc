//! Error taxonomy shared by every stage of the question-answering pipeline.

use thiserror::Error;

use crate::corpus::SectionKey;

/// Failures surfaced by the library. Binaries wrap these in `anyhow` at the edge.
#[derive(Error, Debug)]
pub enum QaError {
    /// Caller supplied an unusable input, e.g. a blank question.
    #[error("{0}")]
    Input(String),

    /// Embedding or completion service failed (transport, status, or payload).
    #[error("remote service error: {0}")]
    RemoteService(String),

    /// Corpus files are missing, malformed, or inconsistent.
    #[error("corpus data error: {0}")]
    Data(String),

    /// Query and stored embeddings disagree on dimensionality.
    #[error("embedding for {key} has {actual} dimensions, query has {expected}")]
    DimensionMismatch {
        /// Section whose stored vector did not match.
        key: SectionKey,
        /// Dimensionality of the query embedding.
        expected: usize,
        /// Dimensionality of the stored embedding.
        actual: usize,
    },

    /// Tokenizer vocabulary could not be loaded or applied.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

impl QaError {
    /// Stable snake_case label used in structured error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            QaError::Input(_) => "input",
            QaError::RemoteService(_) => "remote_service",
            QaError::Data(_) => "data",
            QaError::DimensionMismatch { .. } => "dimension_mismatch",
            QaError::Tokenizer(_) => "tokenizer",
        }
    }

    pub(crate) fn remote(err: impl std::fmt::Display) -> Self {
        QaError::RemoteService(err.to_string())
    }

    pub(crate) fn data(err: impl std::fmt::Display) -> Self {
        QaError::Data(err.to_string())
    }
}

impl From<reqwest::Error> for QaError {
    fn from(err: reqwest::Error) -> Self {
        QaError::RemoteService(err.to_string())
    }
}

impl From<csv::Error> for QaError {
    fn from(err: csv::Error) -> Self {
        QaError::Data(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T, E = QaError> = std::result::Result<T, E>;
