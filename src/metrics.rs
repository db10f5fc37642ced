//! Metrics describing what each pipeline stage did.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters gathered while staging the cleaned training corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrepareMetrics {
    /// Raw lines read from the source.
    pub lines_read: usize,
    /// Lines written to the staged corpus.
    pub kept: usize,
    /// Lines the cleaner rejected (no marker or empty after cleaning).
    pub rejected: usize,
    /// Cleaned lines dropped by the role filter.
    pub filtered_out: usize,
    /// Wall-clock time of the stage.
    pub duration: Duration,
}

/// Counters gathered while building a vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildMetrics {
    /// Number of input files that were streamed (0 for in-memory input).
    pub inputs: usize,
    /// Lines tokenized across all inputs.
    pub lines_read: usize,
    /// Token occurrences counted.
    pub tokens_seen: usize,
    /// Distinct corpus tokens before truncation, reserved spellings excluded.
    pub distinct_tokens: usize,
    /// Distinct corpus tokens cut by the size budget.
    pub dropped_tokens: usize,
    /// Final vocabulary size, reserved symbols included.
    pub vocab_size: usize,
    /// Wall-clock time of the stage.
    pub duration: Duration,
}

/// Counters gathered while encoding a corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodeMetrics {
    /// Lines encoded.
    pub lines: usize,
    /// Token ids emitted.
    pub tokens: usize,
    /// Ids that resolved to the unknown symbol.
    pub unknown_tokens: usize,
    /// Wall-clock time of the stage.
    pub duration: Duration,
}

impl EncodeMetrics {
    /// Fraction of emitted ids that were unknown, `0.0` for an empty corpus.
    #[must_use]
    pub fn unknown_rate(&self) -> f64 {
        if self.tokens == 0 {
            0.0
        } else {
            self.unknown_tokens as f64 / self.tokens as f64
        }
    }
}

/// Counters gathered while decoding an id corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodeMetrics {
    /// Lines decoded.
    pub lines: usize,
    /// Ids resolved to tokens.
    pub tokens: usize,
    /// Wall-clock time of the stage.
    pub duration: Duration,
}
