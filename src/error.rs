//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = PrepError> = std::result::Result<T, E>;

/// Domain-specific error describing failures while staging corpora, building vocabularies,
/// or mapping between text and token ids.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// A vocabulary file requested for loading does not exist.
    #[error("vocabulary file {path:?} not found")]
    NotFound {
        /// Path that was expected to hold the vocabulary.
        path: PathBuf,
    },
    /// Input bytes were not valid UTF-8.
    #[error("{path:?} line {line}: input is not valid UTF-8")]
    Encoding {
        /// File containing the malformed bytes.
        path: PathBuf,
        /// 1-based line number of the offending record.
        line: usize,
    },
    /// A token id has no corresponding vocabulary entry.
    #[error("token id {id} is out of range for a vocabulary of {vocab_size} entries (line {line})")]
    OutOfRange {
        /// The offending id.
        id: u64,
        /// Number of entries in the vocabulary used for decoding.
        vocab_size: usize,
        /// 1-based line number in the encoded input, `0` when decoding an in-memory sequence.
        line: usize,
    },
    /// An encoded corpus contained something other than a non-negative integer.
    #[error("invalid token id `{text}` (line {line})")]
    InvalidId {
        /// The text that failed to parse.
        text: String,
        /// 1-based line number in the encoded input.
        line: usize,
    },
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}

impl PrepError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Maps an IO error raised while reading line `line` of `path`, turning UTF-8 failures
    /// into [`PrepError::Encoding`].
    pub fn read(source: std::io::Error, path: PathBuf, line: usize) -> Self {
        if source.kind() == std::io::ErrorKind::InvalidData {
            Self::Encoding { path, line }
        } else {
            Self::Io {
                source,
                path: Some(path),
            }
        }
    }
}
