//! End-to-end staging: clean a raw tagged corpus, build its vocabulary, encode it.

use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::builder::{VocabArtifacts, VocabBuilder};
use crate::clean::SentenceCleaner;
use crate::codec::encode_corpus;
use crate::config::{CleanerConfig, IngestConfig, RoleFilter, Staging, TokenizerKind, VocabConfig};
use crate::corpus::prepare_corpus;
use crate::error::Result;
use crate::metrics::{EncodeMetrics, PrepareMetrics};
use crate::store::Stage;

/// Artefact locations for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelinePaths {
    /// Raw tagged input.
    pub raw: PathBuf,
    /// Cleaned, segmented training corpus.
    pub staged: PathBuf,
    /// Vocabulary file.
    pub vocab: PathBuf,
    /// Encoded id corpus.
    pub encoded: PathBuf,
}

/// Settings shared by the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineOptions {
    /// Cleaner settings for the raw input.
    pub cleaner: CleanerConfig,
    /// Tokenizer used to segment raw lines while cleaning.
    pub segmenter: TokenizerKind,
    /// Tokenizer used on the staged corpus for vocabulary building and encoding.
    pub tokenizer: TokenizerKind,
    /// Which roles are kept in the staged corpus.
    pub role_filter: RoleFilter,
    /// Vocabulary construction settings; `normalize_digits` also governs encoding.
    pub vocab: VocabConfig,
    /// Idempotency policy applied to every stage.
    pub staging: Staging,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cleaner: CleanerConfig::default(),
            segmenter: TokenizerKind::Segmenting,
            tokenizer: TokenizerKind::Whitespace,
            role_filter: RoleFilter::Questions,
            vocab: VocabConfig::default(),
            staging: Staging::SkipExisting,
        }
    }
}

/// What each stage of a pipeline run did.
#[must_use]
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Corpus staging outcome.
    pub prepare: Stage<PrepareMetrics>,
    /// Vocabulary build outcome.
    pub vocabulary: Stage<VocabArtifacts>,
    /// Encoding outcome.
    pub encode: Stage<EncodeMetrics>,
}

/// Runs prepare, vocabulary build, and encode in order, each under `options.staging`.
pub fn run_pipeline(paths: &PipelinePaths, options: &PipelineOptions) -> Result<PipelineReport> {
    options.vocab.validate()?;
    let cleaner = SentenceCleaner::new(options.cleaner.clone())?;
    let segmenter = options.segmenter.build();
    let prepare = prepare_corpus(
        &paths.raw,
        &paths.staged,
        &cleaner,
        segmenter.as_ref(),
        options.role_filter,
        options.staging,
    )?;
    drop(segmenter);

    let tokenizer = options.tokenizer.build();
    let builder = VocabBuilder::new(options.vocab.clone());
    let vocabulary = builder.build_to_file(
        &[&paths.staged],
        &IngestConfig::default(),
        &paths.vocab,
        tokenizer.as_ref(),
        options.staging,
    )?;

    let encode = encode_corpus(
        &paths.staged,
        &paths.encoded,
        &paths.vocab,
        tokenizer,
        options.vocab.normalize_digits,
        options.staging,
    )?;
    info!(
        "pipeline finished: prepare {}, vocabulary {}, encode {}",
        describe(&prepare),
        describe(&vocabulary),
        describe(&encode)
    );
    Ok(PipelineReport {
        prepare,
        vocabulary,
        encode,
    })
}

fn describe<T>(stage: &Stage<T>) -> &'static str {
    if stage.is_skipped() {
        "skipped"
    } else {
        "written"
    }
}
