//! Frequency-ranked vocabulary construction.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::config::{IngestConfig, ReservedBudget, Staging, VocabConfig, VocabConfigBuilder};
use crate::corpus::{collect_paths, read_lines, PROGRESS_INTERVAL};
use crate::error::Result;
use crate::metrics::BuildMetrics;
use crate::special_tokens::RESERVED_COUNT;
use crate::store::{save_vocabulary, should_skip, Stage};
use crate::tokenizer::Tokenizer;
use crate::vocab::{normalize_digits, Vocabulary};

/// High-level façade that counts token frequencies and assembles a [`Vocabulary`].
#[derive(Debug, Clone)]
pub struct VocabBuilder {
    cfg: VocabConfig,
}

/// Artifacts returned after a vocabulary build completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct VocabArtifacts {
    /// The ranked vocabulary, reserved symbols first.
    pub vocabulary: Vocabulary,
    /// Counters captured during the build.
    pub metrics: BuildMetrics,
}

/// Token frequencies in first-seen order.
#[derive(Debug, Default)]
struct TokenCounts {
    entries: Vec<(String, usize)>,
    slots: FxHashMap<String, usize>,
    lines: usize,
    occurrences: usize,
}

impl TokenCounts {
    fn observe(&mut self, token: &str) {
        self.occurrences += 1;
        if let Some(&slot) = self.slots.get(token) {
            self.entries[slot].1 += 1;
            return;
        }
        self.slots.insert(token.to_string(), self.entries.len());
        self.entries.push((token.to_string(), 1));
    }

    /// Tokens by descending count; the stable sort keeps first-seen order among ties.
    fn ranked(mut self) -> Vec<(String, usize)> {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries
    }
}

impl VocabBuilder {
    /// Creates a new builder for the supplied configuration.
    #[must_use]
    pub fn new(cfg: VocabConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`VocabConfigBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> VocabConfigBuilder {
        VocabConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &VocabConfig {
        &self.cfg
    }

    /// Builds a vocabulary from in-memory lines.
    pub fn build_from_lines<I, S>(
        &self,
        lines: I,
        tokenizer: &dyn Tokenizer,
    ) -> Result<VocabArtifacts>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cfg.validate()?;
        let start = Instant::now();
        let mut counts = TokenCounts::default();
        for line in lines {
            self.count_line(&mut counts, line.as_ref(), tokenizer);
        }
        self.finish(counts, 0, start)
    }

    /// Streams every line of the discovered input files and builds a vocabulary.
    pub fn build_from_paths<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        ingest: &IngestConfig,
        tokenizer: &dyn Tokenizer,
    ) -> Result<VocabArtifacts> {
        self.cfg.validate()?;
        let files = collect_paths(inputs, ingest)?;
        let start = Instant::now();
        let mut counts = TokenCounts::default();
        for file in &files {
            debug!("counting tokens in {}", file.display());
            for line in read_lines(file)? {
                self.count_line(&mut counts, &line?, tokenizer);
            }
        }
        self.finish(counts, files.len(), start)
    }

    /// Builds a vocabulary from `inputs` and writes it to `dest`, one token per line.
    ///
    /// Under [`Staging::SkipExisting`] an existing `dest` short-circuits the build.
    pub fn build_to_file<P, Q>(
        &self,
        inputs: &[P],
        ingest: &IngestConfig,
        dest: Q,
        tokenizer: &dyn Tokenizer,
        staging: Staging,
    ) -> Result<Stage<VocabArtifacts>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let dest = dest.as_ref();
        if should_skip(dest, staging, "vocabulary") {
            return Ok(Stage::Skipped);
        }
        info!(
            "creating vocabulary {} from {} input(s)",
            dest.display(),
            inputs.len()
        );
        let artifacts = self.build_from_paths(inputs, ingest, tokenizer)?;
        save_vocabulary(dest, artifacts.vocabulary.tokens())?;
        Ok(Stage::Written(artifacts))
    }

    fn count_line(&self, counts: &mut TokenCounts, line: &str, tokenizer: &dyn Tokenizer) {
        counts.lines += 1;
        if self.cfg.show_progress && counts.lines % PROGRESS_INTERVAL == 0 {
            debug!("  counted line {}", counts.lines);
        }
        for token in tokenizer.tokenize(line) {
            if self.cfg.normalize_digits {
                counts.observe(&normalize_digits(&token));
            } else {
                counts.observe(&token);
            }
        }
    }

    fn finish(
        &self,
        counts: TokenCounts,
        inputs: usize,
        start: Instant,
    ) -> Result<VocabArtifacts> {
        let lines_read = counts.lines;
        let tokens_seen = counts.occurrences;
        let reserved = &self.cfg.reserved;
        let mut ranked: Vec<String> = counts
            .ranked()
            .into_iter()
            .map(|(token, _)| token)
            .filter(|token| !reserved.contains(token))
            .collect();
        let distinct_tokens = ranked.len();

        let corpus_budget = match self.cfg.reserved_budget {
            ReservedBudget::Inclusive => self.cfg.max_vocab_size.saturating_sub(RESERVED_COUNT),
            ReservedBudget::Exclusive => self.cfg.max_vocab_size,
        };
        ranked.truncate(corpus_budget);

        let mut tokens = reserved.to_vec();
        tokens.extend(ranked);
        let vocabulary = Vocabulary::from_tokens(tokens)?;

        let metrics = BuildMetrics {
            inputs,
            lines_read,
            tokens_seen,
            distinct_tokens,
            dropped_tokens: distinct_tokens + RESERVED_COUNT - vocabulary.len(),
            vocab_size: vocabulary.len(),
            duration: start.elapsed(),
        };
        if self.cfg.show_progress {
            info!(
                "vocabulary: {} entries from {} distinct tokens ({} dropped) over {} lines in {:.2?}",
                metrics.vocab_size,
                metrics.distinct_tokens,
                metrics.dropped_tokens,
                metrics.lines_read,
                metrics.duration
            );
        }
        Ok(VocabArtifacts {
            vocabulary,
            metrics,
        })
    }
}

impl fmt::Display for VocabArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vocabulary with {} entries", self.vocabulary.len())?;
        writeln!(
            f,
            "Distinct tokens: {} ({} dropped)",
            self.metrics.distinct_tokens, self.metrics.dropped_tokens
        )?;
        writeln!(f, "Total duration: {:?}", self.metrics.duration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::special_tokens::{ReservedSymbols, UNK_ID};
    use crate::tokenizer::WhitespaceTokenizer;
    use std::fs;
    use tempfile::tempdir;

    fn builder(max_vocab_size: usize, budget: ReservedBudget, normalize: bool) -> VocabBuilder {
        let cfg = VocabConfig::builder()
            .max_vocab_size(max_vocab_size)
            .reserved_budget(budget)
            .normalize_digits(normalize)
            .show_progress(false)
            .build()
            .unwrap();
        VocabBuilder::new(cfg)
    }

    fn tokens(artifacts: &VocabArtifacts) -> Vec<&str> {
        artifacts
            .vocabulary
            .tokens()
            .iter()
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn ranks_by_descending_frequency_with_reserved_first() {
        let lines = ["b a c", "a b a", "a"];
        let artifacts = builder(100, ReservedBudget::Inclusive, false)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(
            tokens(&artifacts),
            vec!["_PAD", "_GO", "_EOS", "_UNK", "a", "b", "c"]
        );
        assert_eq!(artifacts.metrics.lines_read, 3);
        assert_eq!(artifacts.metrics.tokens_seen, 7);
        assert_eq!(artifacts.metrics.distinct_tokens, 3);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let lines = ["delta gamma beta alpha", "alpha beta gamma delta", "zeta"];
        let artifacts = builder(100, ReservedBudget::Inclusive, false)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(
            &tokens(&artifacts)[4..],
            &["delta", "gamma", "beta", "alpha", "zeta"]
        );
    }

    #[test]
    fn inclusive_budget_counts_reserved_symbols() {
        let lines = ["a a a b b c d"];
        let artifacts = builder(6, ReservedBudget::Inclusive, false)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(
            tokens(&artifacts),
            vec!["_PAD", "_GO", "_EOS", "_UNK", "a", "b"]
        );
        assert_eq!(artifacts.metrics.dropped_tokens, 2);
    }

    #[test]
    fn exclusive_budget_prepends_reserved_after_truncation() {
        let lines = ["a a a b b c d"];
        let artifacts = builder(2, ReservedBudget::Exclusive, false)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(
            tokens(&artifacts),
            vec!["_PAD", "_GO", "_EOS", "_UNK", "a", "b"]
        );
    }

    #[test]
    fn size_never_exceeds_inclusive_budget() {
        let lines: Vec<String> = (0..50).map(|i| format!("w{i} w{} common", i % 7)).collect();
        for max in [4usize, 5, 9, 30, 200] {
            let artifacts = builder(max, ReservedBudget::Inclusive, false)
                .build_from_lines(&lines, &WhitespaceTokenizer)
                .unwrap();
            assert!(artifacts.vocabulary.len() <= max);
            assert!(artifacts
                .vocabulary
                .starts_with_reserved(&ReservedSymbols::default()));
        }
    }

    #[test]
    fn higher_frequency_always_ranks_first() {
        let lines = ["x y y z z z", "q z y"];
        let artifacts = builder(100, ReservedBudget::Inclusive, false)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        let v = &artifacts.vocabulary;
        let id = |t: &str| v.get(t).unwrap();
        assert!(id("z") < id("y"));
        assert!(id("y") < id("x"));
        assert!(id("x") < id("q"));
    }

    #[test]
    fn digit_normalisation_merges_numeric_tokens() {
        let lines = ["2023 1999 abc", "7"];
        let artifacts = builder(100, ReservedBudget::Inclusive, true)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(&tokens(&artifacts)[4..], &["0000", "abc", "0"]);
    }

    #[test]
    fn reserved_spellings_in_corpus_are_not_duplicated() {
        let lines = ["_UNK hello _UNK"];
        let artifacts = builder(100, ReservedBudget::Inclusive, false)
            .build_from_lines(lines, &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(
            tokens(&artifacts),
            vec!["_PAD", "_GO", "_EOS", "_UNK", "hello"]
        );
        assert_eq!(artifacts.vocabulary.get("_UNK"), Some(UNK_ID));
    }

    #[test]
    fn custom_reserved_spellings_take_the_lowest_ids() {
        let reserved = ReservedSymbols {
            pad: "<pad>".into(),
            go: "<go>".into(),
            eos: "<eos>".into(),
            unk: "<unk>".into(),
        };
        let cfg = VocabConfig::builder()
            .reserved(reserved.clone())
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = VocabBuilder::new(cfg)
            .build_from_lines(["<unk> hi _UNK hi <unk>"], &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(
            tokens(&artifacts),
            vec!["<pad>", "<go>", "<eos>", "<unk>", "hi", "_UNK"]
        );
        assert!(artifacts.vocabulary.starts_with_reserved(&reserved));
        assert!(!artifacts
            .vocabulary
            .starts_with_reserved(&ReservedSymbols::default()));
        assert_eq!(artifacts.vocabulary.get("<unk>"), Some(UNK_ID));
        assert_eq!(artifacts.vocabulary.id_or_unk("missing"), UNK_ID);
    }

    #[test]
    fn empty_corpus_yields_reserved_only() {
        let artifacts = builder(10, ReservedBudget::Inclusive, false)
            .build_from_lines(Vec::<String>::new(), &WhitespaceTokenizer)
            .unwrap();
        assert_eq!(artifacts.vocabulary.len(), 4);
    }

    #[test]
    fn build_to_file_is_idempotent_unless_rebuilding() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("train.txt");
        let dest = dir.path().join("vocab.txt");
        fs::write(&corpus, "hello world\nhello\n").unwrap();
        let builder = builder(100, ReservedBudget::Inclusive, false);

        let first = builder
            .build_to_file(
                &[&corpus],
                &IngestConfig::default(),
                &dest,
                &WhitespaceTokenizer,
                Staging::SkipExisting,
            )
            .unwrap();
        assert!(!first.is_skipped());
        let written = fs::read_to_string(&dest).unwrap();
        assert_eq!(written, "_PAD\n_GO\n_EOS\n_UNK\nhello\nworld\n");

        fs::write(&corpus, "other tokens entirely\n").unwrap();
        let second = builder
            .build_to_file(
                &[&corpus],
                &IngestConfig::default(),
                &dest,
                &WhitespaceTokenizer,
                Staging::SkipExisting,
            )
            .unwrap();
        assert!(second.is_skipped());
        assert_eq!(fs::read_to_string(&dest).unwrap(), written);

        let forced = builder
            .build_to_file(
                &[&corpus],
                &IngestConfig::default(),
                &dest,
                &WhitespaceTokenizer,
                Staging::Rebuild,
            )
            .unwrap();
        assert!(!forced.is_skipped());
        assert!(fs::read_to_string(&dest).unwrap().contains("entirely"));
    }
}
