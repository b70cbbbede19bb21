//! Error types for handwriting recognition

use thiserror::Error;

/// Errors that can occur while capturing strokes, loading corpora or matching
#[derive(Debug, Error)]
pub enum RecogError {
    /// Capture operation called out of sequence (e.g. extending with no active stroke)
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Matcher input rejected (e.g. no strokes, zero limit)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Corpus requested before it finished loading
    #[error("corpus not ready: {0}")]
    NotReady(String),

    /// Corpus source data could not be parsed
    #[error("failed to load corpus {name}: {reason}")]
    CorpusLoad { name: String, reason: String },

    /// Corpus could not be written out
    #[error("failed to encode corpus: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecogError {
    pub(crate) fn corpus_load(name: &str, reason: impl ToString) -> Self {
        RecogError::CorpusLoad {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for recognition operations
pub type RecogResult<T> = Result<T, RecogError>;
