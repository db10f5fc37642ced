//! Configuration types controlling cleaning, vocabulary construction, and staging.

use serde::{Deserialize, Serialize};

use crate::clean::Role;
use crate::error::{PrepError, Result};
use crate::special_tokens::{ReservedSymbols, RESERVED_COUNT};

/// Default vocabulary budget, large enough to keep every token of a typical chat corpus.
pub const DEFAULT_MAX_VOCAB_SIZE: usize = 800_000;

/// How the reserved symbols interact with the vocabulary size budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservedBudget {
    /// Reserved symbols count towards `max_vocab_size`; the final vocabulary never exceeds it.
    #[default]
    Inclusive,
    /// Corpus tokens are truncated to `max_vocab_size` and the reserved symbols are prepended
    /// afterwards, so the vocabulary may hold `max_vocab_size + 4` entries.
    Exclusive,
}

/// Configuration for vocabulary construction and lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VocabConfig {
    /// Upper bound on vocabulary entries, see [`ReservedBudget`] for how reserved symbols count.
    pub max_vocab_size: usize,
    /// Replaces every digit with `0` before counting and before lookup.
    pub normalize_digits: bool,
    /// Truncation policy for the reserved symbols.
    pub reserved_budget: ReservedBudget,
    /// Spellings of the PAD/GO/EOS/UNK symbols.
    pub reserved: ReservedSymbols,
    /// Enables periodic progress logging through the `log` facade.
    pub show_progress: bool,
}

impl VocabConfig {
    /// Returns a builder initialised with [`VocabConfig::default`].
    #[must_use]
    pub fn builder() -> VocabConfigBuilder {
        VocabConfigBuilder::default()
    }

    /// Validates the invariants required for building a vocabulary.
    pub fn validate(&self) -> Result<()> {
        if self.max_vocab_size == 0 {
            return Err(PrepError::InvalidConfig(
                "max_vocab_size must be greater than zero".into(),
            ));
        }
        if self.reserved_budget == ReservedBudget::Inclusive
            && self.max_vocab_size < RESERVED_COUNT
        {
            return Err(PrepError::InvalidConfig(format!(
                "max_vocab_size ({}) must be at least the {RESERVED_COUNT} reserved symbols",
                self.max_vocab_size
            )));
        }
        self.reserved.validate()
    }
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            max_vocab_size: DEFAULT_MAX_VOCAB_SIZE,
            normalize_digits: false,
            reserved_budget: ReservedBudget::Inclusive,
            reserved: ReservedSymbols::default(),
            show_progress: true,
        }
    }
}

/// Builder for [`VocabConfig`].
#[derive(Debug, Default, Clone)]
pub struct VocabConfigBuilder {
    cfg: VocabConfig,
}

impl VocabConfigBuilder {
    /// Sets the vocabulary size budget.
    #[must_use]
    pub fn max_vocab_size(mut self, value: usize) -> Self {
        self.cfg.max_vocab_size = value;
        self
    }

    /// Enables or disables digit normalisation.
    #[must_use]
    pub fn normalize_digits(mut self, enabled: bool) -> Self {
        self.cfg.normalize_digits = enabled;
        self
    }

    /// Chooses whether reserved symbols count towards the size budget.
    #[must_use]
    pub fn reserved_budget(mut self, budget: ReservedBudget) -> Self {
        self.cfg.reserved_budget = budget;
        self
    }

    /// Overrides the reserved symbol spellings.
    #[must_use]
    pub fn reserved(mut self, reserved: ReservedSymbols) -> Self {
        self.cfg.reserved = reserved;
        self
    }

    /// Enables or disables progress logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`VocabConfig`].
    pub fn build(self) -> Result<VocabConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Tokenizer selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Split on runs of whitespace.
    Whitespace,
    /// Dictionary based word segmentation for text without word boundaries.
    Segmenting,
}

/// Which cleaned lines the corpus staging step keeps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleFilter {
    /// Keep only question lines.
    #[default]
    Questions,
    /// Keep only answer lines.
    Answers,
    /// Keep every accepted line.
    All,
}

impl RoleFilter {
    /// Returns true when a sentence with `role` passes the filter.
    #[must_use]
    pub fn accepts(self, role: Role) -> bool {
        match self {
            Self::Questions => role == Role::Question,
            Self::Answers => role == Role::Answer,
            Self::All => true,
        }
    }
}

/// Policy for stages that write an artefact to a destination path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Staging {
    /// Leave an existing destination untouched and skip the stage.
    #[default]
    SkipExisting,
    /// Always regenerate the destination.
    Rebuild,
}

/// Configuration for the sentence cleaner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanerConfig {
    /// Marker identifying question lines.
    pub question_marker: String,
    /// Marker identifying answer lines.
    pub answer_marker: String,
    /// Deletes ASCII spaces from the payload before segmentation.
    pub squash_spaces: bool,
    /// Keeps lines without a marker, tagged [`Role::Other`].
    pub keep_untagged: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            question_marker: "question:".into(),
            answer_marker: "answer:".into(),
            squash_spaces: true,
            keep_untagged: false,
        }
    }
}

impl CleanerConfig {
    /// Validates that both markers are present and distinct.
    pub fn validate(&self) -> Result<()> {
        if self.question_marker.is_empty() || self.answer_marker.is_empty() {
            return Err(PrepError::InvalidConfig(
                "question and answer markers must not be empty".into(),
            ));
        }
        if self.question_marker == self.answer_marker {
            return Err(PrepError::InvalidConfig(
                "question and answer markers must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration controlling how vocabulary inputs are discovered on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
        }
    }
}
