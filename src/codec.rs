//! Mapping between text and token id sequences.
//!
//! Encoded corpora are UTF-8 text with one line per source line; each line holds the
//! space-separated decimal ids of that line's tokens and ends with `\n`.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use crate::config::Staging;
use crate::corpus::{read_lines, PROGRESS_INTERVAL};
use crate::error::{PrepError, Result};
use crate::metrics::{DecodeMetrics, EncodeMetrics};
use crate::special_tokens::UNK_ID;
use crate::store::{load_vocabulary, should_skip, write_atomically, Stage};
use crate::tokenizer::Tokenizer;
use crate::vocab::{normalize_digits, TokenId, Vocabulary};

/// Tokenizes `sentence` and maps every token to its id; absent tokens map to [`UNK_ID`].
#[must_use]
pub fn encode_sentence(
    sentence: &str,
    vocabulary: &Vocabulary,
    tokenizer: &dyn Tokenizer,
    normalize: bool,
) -> Vec<TokenId> {
    tokenizer
        .tokenize(sentence)
        .iter()
        .map(|token| {
            if normalize {
                vocabulary.id_or_unk(&normalize_digits(token))
            } else {
                vocabulary.id_or_unk(token)
            }
        })
        .collect()
}

/// Maps ids back to tokens joined by single spaces.
pub fn decode_ids(ids: &[TokenId], vocabulary: &Vocabulary) -> Result<String> {
    let tokens = ids
        .iter()
        .map(|&id| vocabulary.token(id))
        .collect::<Result<Vec<_>>>()?;
    Ok(tokens.join(" "))
}

/// Parses and decodes one line of an encoded corpus. `line` is used in error reports.
pub fn decode_line(text: &str, vocabulary: &Vocabulary, line: usize) -> Result<String> {
    let mut tokens = Vec::new();
    for part in text.split_whitespace() {
        let id = part.parse::<u64>().map_err(|_| PrepError::InvalidId {
            text: part.to_string(),
            line,
        })?;
        tokens.push(vocabulary.token_on_line(id, line)?);
    }
    Ok(tokens.join(" "))
}

/// Encoder/decoder bound to one vocabulary and tokenizer.
pub struct SequenceCodec {
    vocabulary: Vocabulary,
    tokenizer: Box<dyn Tokenizer>,
    normalize_digits: bool,
}

impl SequenceCodec {
    /// Wraps an in-memory vocabulary.
    #[must_use]
    pub fn new(
        vocabulary: Vocabulary,
        tokenizer: Box<dyn Tokenizer>,
        normalize_digits: bool,
    ) -> Self {
        Self {
            vocabulary,
            tokenizer,
            normalize_digits,
        }
    }

    /// Loads the vocabulary from `path`.
    pub fn from_vocab_file<P: AsRef<Path>>(
        path: P,
        tokenizer: Box<dyn Tokenizer>,
        normalize_digits: bool,
    ) -> Result<Self> {
        let vocabulary = load_vocabulary(path)?;
        Ok(Self::new(vocabulary, tokenizer, normalize_digits))
    }

    /// Provides immutable access to the vocabulary.
    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Encodes one sentence.
    #[must_use]
    pub fn encode_sentence(&self, sentence: &str) -> Vec<TokenId> {
        encode_sentence(
            sentence,
            &self.vocabulary,
            self.tokenizer.as_ref(),
            self.normalize_digits,
        )
    }

    /// Decodes one id sequence.
    pub fn decode_ids(&self, ids: &[TokenId]) -> Result<String> {
        decode_ids(ids, &self.vocabulary)
    }

    /// Encodes `source` line by line into `dest`, preserving line order one to one.
    pub fn encode_corpus<P, Q>(
        &self,
        source: P,
        dest: Q,
        staging: Staging,
    ) -> Result<Stage<EncodeMetrics>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (source, dest) = (source.as_ref(), dest.as_ref());
        if should_skip(dest, staging, "encode") {
            return Ok(Stage::Skipped);
        }
        self.write_encoded(source, dest).map(Stage::Written)
    }

    /// Decodes an id corpus at `source` into text at `dest`.
    ///
    /// Any id outside the vocabulary aborts the stage with [`PrepError::OutOfRange`].
    pub fn decode_corpus<P, Q>(
        &self,
        source: P,
        dest: Q,
        staging: Staging,
    ) -> Result<Stage<DecodeMetrics>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        decode_corpus(source, dest, &self.vocabulary, staging)
    }

    fn write_encoded(&self, source: &Path, dest: &Path) -> Result<EncodeMetrics> {
        info!("tokenizing data in {}", source.display());
        let start = Instant::now();
        let mut metrics = EncodeMetrics::default();
        let reader = read_lines(source)?;
        write_atomically(dest, |writer| {
            for line in reader {
                let ids = self.encode_sentence(&line?);
                metrics.lines += 1;
                if metrics.lines % PROGRESS_INTERVAL == 0 {
                    debug!("  tokenizing line {}", metrics.lines);
                }
                metrics.tokens += ids.len();
                metrics.unknown_tokens += ids.iter().filter(|&&id| id == UNK_ID).count();
                write_id_line(writer, &ids)
                    .map_err(|err| PrepError::io(err, Some(dest.to_path_buf())))?;
            }
            Ok(())
        })?;
        metrics.duration = start.elapsed();
        info!(
            "encoded {} lines ({} tokens, {:.2}% unknown) into {} in {:.2?}",
            metrics.lines,
            metrics.tokens,
            metrics.unknown_rate() * 100.0,
            dest.display(),
            metrics.duration
        );
        Ok(metrics)
    }
}

impl fmt::Debug for SequenceCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceCodec")
            .field("vocab_size", &self.vocabulary.len())
            .field("tokenizer", &self.tokenizer.kind())
            .field("normalize_digits", &self.normalize_digits)
            .finish()
    }
}

/// Encodes `source` into `dest` using the vocabulary file at `vocab_path`.
///
/// The vocabulary is only loaded when the stage actually runs.
pub fn encode_corpus<P, Q, V>(
    source: P,
    dest: Q,
    vocab_path: V,
    tokenizer: Box<dyn Tokenizer>,
    normalize: bool,
    staging: Staging,
) -> Result<Stage<EncodeMetrics>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    V: AsRef<Path>,
{
    let dest = dest.as_ref();
    if should_skip(dest, staging, "encode") {
        return Ok(Stage::Skipped);
    }
    let codec = SequenceCodec::from_vocab_file(vocab_path, tokenizer, normalize)?;
    codec
        .write_encoded(source.as_ref(), dest)
        .map(Stage::Written)
}

/// Decodes an id corpus line by line into space-joined tokens.
pub fn decode_corpus<P, Q>(
    source: P,
    dest: Q,
    vocabulary: &Vocabulary,
    staging: Staging,
) -> Result<Stage<DecodeMetrics>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (source, dest) = (source.as_ref(), dest.as_ref());
    if should_skip(dest, staging, "decode") {
        return Ok(Stage::Skipped);
    }
    info!("decoding ids in {}", source.display());
    let start = Instant::now();
    let mut metrics = DecodeMetrics::default();
    let reader = read_lines(source)?;
    write_atomically(dest, |writer| {
        for (idx, line) in reader.enumerate() {
            let line = line?;
            let text = decode_line(&line, vocabulary, idx + 1)?;
            metrics.lines += 1;
            metrics.tokens += line.split_whitespace().count();
            writeln!(writer, "{text}")
                .map_err(|err| PrepError::io(err, Some(dest.to_path_buf())))?;
        }
        Ok(())
    })?;
    metrics.duration = start.elapsed();
    Ok(Stage::Written(metrics))
}

/// Writes `ids` space-separated and terminated by `\n`, the encoded corpus line format.
pub fn write_id_line<W: Write>(writer: &mut W, ids: &[TokenId]) -> std::io::Result<()> {
    for (idx, id) in ids.iter().enumerate() {
        if idx > 0 {
            writer.write_all(b" ")?;
        }
        write!(writer, "{id}")?;
    }
    writer.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WhitespaceTokenizer;
    use std::fs;
    use tempfile::tempdir;

    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(
            ["_PAD", "_GO", "_EOS", "_UNK", "hello", "world", "0000"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn unseen_token_maps_to_unk() {
        let ids = encode_sentence("zzUNSEENTOKENzz", &vocab(), &WhitespaceTokenizer, false);
        assert_eq!(ids, vec![UNK_ID]);
    }

    #[test]
    fn digit_normalisation_applies_at_lookup() {
        let v = vocab();
        let normalized = encode_sentence("2023 1999", &v, &WhitespaceTokenizer, true);
        assert_eq!(normalized, vec![6, 6]);
        let raw = encode_sentence("2023 1999", &v, &WhitespaceTokenizer, false);
        assert_eq!(raw, vec![UNK_ID, UNK_ID]);

        let without_bucket = Vocabulary::from_tokens(vec!["_PAD".into(), "_GO".into()]).unwrap();
        let ids = encode_sentence("2023", &without_bucket, &WhitespaceTokenizer, true);
        assert_eq!(ids, vec![UNK_ID]);
    }

    #[test]
    fn decode_restores_tokenized_sentence() {
        let v = vocab();
        let ids = encode_sentence("  hello   world hello ", &v, &WhitespaceTokenizer, false);
        assert_eq!(ids, vec![4, 5, 4]);
        assert_eq!(decode_ids(&ids, &v).unwrap(), "hello world hello");
    }

    #[test]
    fn decode_rejects_out_of_range_ids() {
        let err = decode_ids(&[4, 7], &vocab()).expect_err("7 is past the end");
        assert!(matches!(
            err,
            PrepError::OutOfRange {
                id: 7,
                vocab_size: 7,
                ..
            }
        ));
    }

    #[test]
    fn decode_line_reports_line_of_bad_id() {
        let v = vocab();
        assert_eq!(decode_line("4 5", &v, 1).unwrap(), "hello world");
        assert_eq!(decode_line("", &v, 2).unwrap(), "");
        let err = decode_line("4 99999999999", &v, 2).expect_err("out of range");
        assert!(matches!(
            err,
            PrepError::OutOfRange {
                id: 99_999_999_999,
                vocab_size: 7,
                line: 2
            }
        ));
        let err = decode_line("4 -1", &v, 1).expect_err("not an id");
        assert!(matches!(err, PrepError::InvalidId { line: 1, .. }));
    }

    #[test]
    fn id_line_format_is_space_separated() {
        let mut out = Vec::new();
        write_id_line(&mut out, &[4, 5, UNK_ID]).unwrap();
        write_id_line(&mut out, &[]).unwrap();
        assert_eq!(out, b"4 5 3\n\n");
    }

    #[test]
    fn corpus_round_trip_preserves_lines() {
        let dir = tempdir().unwrap();
        let vocab_path = dir.path().join("vocab.txt");
        let source = dir.path().join("train.txt");
        let encoded = dir.path().join("train.ids");
        let decoded = dir.path().join("train.decoded");
        crate::store::save_vocabulary(&vocab_path, vocab().tokens()).unwrap();
        fs::write(&source, "hello world\n\nworld mystery\n").unwrap();

        let metrics = encode_corpus(
            &source,
            &encoded,
            &vocab_path,
            Box::new(WhitespaceTokenizer),
            false,
            Staging::SkipExisting,
        )
        .unwrap()
        .written()
        .unwrap();
        assert_eq!(metrics.lines, 3);
        assert_eq!(metrics.tokens, 4);
        assert_eq!(metrics.unknown_tokens, 1);
        assert_eq!(fs::read_to_string(&encoded).unwrap(), "4 5\n\n5 3\n");

        let stage = decode_corpus(&encoded, &decoded, &vocab(), Staging::SkipExisting).unwrap();
        assert_eq!(stage.written().unwrap().lines, 3);
        assert_eq!(
            fs::read_to_string(&decoded).unwrap(),
            "hello world\n\nworld _UNK\n"
        );
    }

    #[test]
    fn encode_corpus_skips_existing_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("train.txt");
        let encoded = dir.path().join("train.ids");
        fs::write(&source, "hello\n").unwrap();
        fs::write(&encoded, "cached\n").unwrap();

        let missing_vocab = dir.path().join("absent.txt");
        let stage = encode_corpus(
            &source,
            &encoded,
            &missing_vocab,
            Box::new(WhitespaceTokenizer),
            false,
            Staging::SkipExisting,
        )
        .unwrap();
        assert!(stage.is_skipped());
        assert_eq!(fs::read_to_string(&encoded).unwrap(), "cached\n");

        let err = encode_corpus(
            &source,
            &encoded,
            &missing_vocab,
            Box::new(WhitespaceTokenizer),
            false,
            Staging::Rebuild,
        )
        .expect_err("vocabulary is missing");
        assert!(matches!(err, PrepError::NotFound { .. }));
    }

    #[test]
    fn sequence_codec_round_trips_corpus_files() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("train.txt");
        let encoded = dir.path().join("train.ids");
        let decoded = dir.path().join("train.decoded");
        fs::write(&source, "world hello\nhello 2024\n").unwrap();

        let codec = SequenceCodec::new(vocab(), Box::new(WhitespaceTokenizer), true);
        assert_eq!(codec.vocabulary().len(), 7);
        assert_eq!(
            codec.decode_ids(&codec.encode_sentence("hello world")).unwrap(),
            "hello world"
        );

        let metrics = codec
            .encode_corpus(&source, &encoded, Staging::SkipExisting)
            .unwrap()
            .written()
            .unwrap();
        assert_eq!(metrics.lines, 2);
        assert_eq!(metrics.unknown_tokens, 0);
        assert_eq!(fs::read_to_string(&encoded).unwrap(), "5 4\n4 6\n");

        let stage = codec
            .decode_corpus(&encoded, &decoded, Staging::SkipExisting)
            .unwrap();
        assert_eq!(stage.written().unwrap().tokens, 4);
        assert_eq!(
            fs::read_to_string(&decoded).unwrap(),
            "world hello\nhello 0000\n"
        );

        assert!(codec
            .encode_corpus(&source, &encoded, Staging::SkipExisting)
            .unwrap()
            .is_skipped());
    }

    #[test]
    fn failed_decode_leaves_no_output() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("bad.ids");
        let dest = dir.path().join("bad.txt");
        fs::write(&source, "4\n42\n").unwrap();
        let err = decode_corpus(&source, &dest, &vocab(), Staging::Rebuild).expect_err("bad id");
        assert!(matches!(err, PrepError::OutOfRange { id: 42, line: 2, .. }));
        assert!(!dest.exists());
    }
}
