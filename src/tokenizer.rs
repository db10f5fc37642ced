//! Tokenizers that split a line of text into tokens.
//!
//! Two strategies are provided behind the [`Tokenizer`] trait: [`WhitespaceTokenizer`] for
//! text that already carries word boundaries, and [`SegmentingTokenizer`] which runs
//! dictionary/HMM word segmentation (via `jieba-rs`) for Chinese text.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use jieba_rs::Jieba;

use crate::config::TokenizerKind;
use crate::error::{PrepError, Result};

/// Splits text into an ordered sequence of non-empty tokens.
///
/// Implementations never fail: empty or whitespace-only input yields an empty vector.
pub trait Tokenizer: Send + Sync {
    /// Tokenizes `text`.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Reports which strategy this tokenizer implements.
    fn kind(&self) -> TokenizerKind;
}

/// Splits on runs of Unicode whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Whitespace
    }
}

/// Word segmentation for text without explicit word boundaries.
pub struct SegmentingTokenizer {
    jieba: Jieba,
}

impl SegmentingTokenizer {
    /// Creates a segmenter with the bundled dictionary and HMM discovery of unseen words.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jieba: Jieba::new(),
        }
    }

    /// Merges a user dictionary (jieba format: `word [freq] [tag]` per line).
    pub fn load_user_dict<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?;
        let mut reader = BufReader::new(file);
        self.jieba.load_dict(&mut reader).map_err(|err| {
            PrepError::InvalidConfig(format!("user dictionary {path:?} rejected: {err}"))
        })
    }
}

impl Default for SegmentingTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SegmentingTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentingTokenizer").finish_non_exhaustive()
    }
}

impl Tokenizer for SegmentingTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Segmenting
    }
}

impl TokenizerKind {
    /// Instantiates the selected tokenizer.
    #[must_use]
    pub fn build(self) -> Box<dyn Tokenizer> {
        match self {
            Self::Whitespace => Box::new(WhitespaceTokenizer),
            Self::Segmenting => Box::new(SegmentingTokenizer::new()),
        }
    }
}
