//! Question/answer corpus preparation for sequence-to-sequence training.
//!
//! The crate exposes both a library API and a `chatprep` command line interface for
//! cleaning tagged chat logs into a segmented training corpus, building a frequency
//! ranked vocabulary with reserved control symbols, and converting the corpus to and
//! from integer id sequences.
//!
//! ```no_run
//! use chatprep::{IngestConfig, SequenceCodec, Staging, VocabBuilder, WhitespaceTokenizer};
//!
//! # fn main() -> chatprep::Result<()> {
//! let cfg = VocabBuilder::builder()
//!     .max_vocab_size(40_000)
//!     .show_progress(false)
//!     .build()?;
//! let builder = VocabBuilder::new(cfg);
//! let artifacts = builder.build_from_paths(
//!     &["train.txt"],
//!     &IngestConfig::default(),
//!     &WhitespaceTokenizer,
//! )?;
//! chatprep::save_vocabulary("vocab.txt", artifacts.vocabulary.tokens())?;
//!
//! let codec = SequenceCodec::new(artifacts.vocabulary, Box::new(WhitespaceTokenizer), false);
//! codec.encode_corpus("train.txt", "train.ids", Staging::SkipExisting)?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `chatprep = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod builder;
pub mod clean;
pub mod codec;
pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod special_tokens;
pub mod store;
pub mod tokenizer;
pub mod vocab;

pub use builder::{VocabArtifacts, VocabBuilder};
pub use clean::{CleanedSentence, Role, SentenceCleaner};
pub use codec::{decode_corpus, decode_ids, encode_corpus, encode_sentence, SequenceCodec};
pub use config::{
    CleanerConfig, IngestConfig, ReservedBudget, RoleFilter, Staging, TokenizerKind, VocabConfig,
    VocabConfigBuilder,
};
pub use corpus::prepare_corpus;
pub use error::{PrepError, Result};
pub use metrics::{BuildMetrics, DecodeMetrics, EncodeMetrics, PrepareMetrics};
pub use pipeline::{run_pipeline, PipelineOptions, PipelinePaths, PipelineReport};
pub use special_tokens::{ReservedSymbols, EOS_ID, GO_ID, PAD_ID, RESERVED_COUNT, UNK_ID};
pub use store::{load_vocabulary, save_vocabulary, Stage};
pub use tokenizer::{SegmentingTokenizer, Tokenizer, WhitespaceTokenizer};
pub use vocab::{TokenId, Vocabulary};
