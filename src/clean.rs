//! Sentence cleaning for tagged question/answer lines.
//!
//! A raw line such as `question: 你好，吗？` is recognised by its marker, stripped of the
//! marker, URLs and punctuation, segmented with the supplied [`Tokenizer`], and re-joined
//! with single spaces.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::CleanerConfig;
use crate::error::{PrepError, Result};
use crate::tokenizer::Tokenizer;

const URL_PATTERN: &str = r"(?:http)+(?:www)*.*html|(?:www)+.*.com";
const PUNCTUATION_PATTERN: &str = r#"[+.!/_,$%^*("']+|[+—！，。？、~@#￥%…&*（）]+"#;
const COLON_SPACING_PATTERN: &str = r" +： +| +: +";

/// Role of a cleaned line within a dialogue corpus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Line carried the question marker.
    Question,
    /// Line carried the answer marker.
    Answer,
    /// Line carried no marker and the cleaner was configured to keep it.
    Other,
}

/// Output of [`SentenceCleaner::clean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedSentence {
    /// Segmented sentence, tokens separated by single spaces.
    pub text: String,
    /// Role derived from the marker.
    pub role: Role,
}

/// Strips markers and noise from raw lines before tokenization.
#[derive(Debug, Clone)]
pub struct SentenceCleaner {
    cfg: CleanerConfig,
    urls: Regex,
    punctuation: Regex,
    colon_spacing: Regex,
}

impl SentenceCleaner {
    /// Compiles the cleaning patterns for the given configuration.
    pub fn new(cfg: CleanerConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            urls: compile(URL_PATTERN)?,
            punctuation: compile(PUNCTUATION_PATTERN)?,
            colon_spacing: compile(COLON_SPACING_PATTERN)?,
        })
    }

    /// Detects the line's role and returns the text following the matched marker.
    ///
    /// The question marker is checked first, so a line containing both markers is a question.
    #[must_use]
    pub fn split_marker<'a>(&self, line: &'a str) -> Option<(Role, &'a str)> {
        let markers = [
            (Role::Question, self.cfg.question_marker.as_str()),
            (Role::Answer, self.cfg.answer_marker.as_str()),
        ];
        for (role, marker) in markers {
            if let Some(pos) = line.find(marker) {
                return Some((role, &line[pos + marker.len()..]));
            }
        }
        if self.cfg.keep_untagged {
            return Some((Role::Other, line));
        }
        None
    }

    /// Removes `http...html` and `www...com` substrings.
    #[must_use]
    pub fn strip_urls(&self, text: &str) -> String {
        self.urls.replace_all(text, "").into_owned()
    }

    /// Replaces each run of punctuation with a single space.
    #[must_use]
    pub fn strip_punctuation(&self, text: &str) -> String {
        self.punctuation.replace_all(text, " ").into_owned()
    }

    /// Joins `x : y` and `x ： y` spacing artefacts back into `x:y`.
    #[must_use]
    pub fn collapse_colons(&self, text: &str) -> String {
        self.colon_spacing.replace_all(text, ":").into_owned()
    }

    /// Cleans one raw line. Returns `None` when the line is rejected: it carries no marker
    /// (unless untagged lines are kept) or nothing remains after cleaning.
    #[must_use]
    pub fn clean(&self, line: &str, tokenizer: &dyn Tokenizer) -> Option<CleanedSentence> {
        let (role, payload) = self.split_marker(line.trim())?;
        let without_urls = self.strip_urls(payload);
        let mut text = self.strip_punctuation(&without_urls);
        if self.cfg.squash_spaces {
            text.retain(|c| c != ' ');
        }
        let joined = tokenizer.tokenize(&text).join(" ");
        let text = self.collapse_colons(&joined);
        if text.is_empty() {
            return None;
        }
        Some(CleanedSentence { text, role })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| PrepError::Internal(format!("invalid pattern {pattern:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{SegmentingTokenizer, WhitespaceTokenizer};

    fn spaced_cleaner() -> SentenceCleaner {
        SentenceCleaner::new(CleanerConfig {
            squash_spaces: false,
            ..CleanerConfig::default()
        })
        .expect("cleaner")
    }

    #[test]
    fn question_marker_is_stripped() {
        let cleaned = spaced_cleaner()
            .clean("question: 你好 吗\n", &WhitespaceTokenizer)
            .expect("question line accepted");
        assert_eq!(cleaned.role, Role::Question);
        assert_eq!(cleaned.text, "你好 吗");
    }

    #[test]
    fn answer_marker_is_stripped() {
        let cleaned = spaced_cleaner()
            .clean("answer: 我 很 好", &WhitespaceTokenizer)
            .expect("answer line accepted");
        assert_eq!(cleaned.role, Role::Answer);
        assert_eq!(cleaned.text, "我 很 好");
    }

    #[test]
    fn short_tagged_lines_are_not_corrupted() {
        let cleaned = spaced_cleaner()
            .clean("answer:好", &WhitespaceTokenizer)
            .expect("short answer accepted");
        assert_eq!(cleaned.text, "好");
        assert!(spaced_cleaner().clean("answer:", &WhitespaceTokenizer).is_none());
    }

    #[test]
    fn untagged_lines_are_rejected_by_default() {
        assert!(spaced_cleaner()
            .clean("just some chatter", &WhitespaceTokenizer)
            .is_none());
    }

    #[test]
    fn untagged_lines_can_be_kept() {
        let cleaner = SentenceCleaner::new(CleanerConfig {
            squash_spaces: false,
            keep_untagged: true,
            ..CleanerConfig::default()
        })
        .expect("cleaner");
        let cleaned = cleaner
            .clean("just some chatter", &WhitespaceTokenizer)
            .expect("kept");
        assert_eq!(cleaned.role, Role::Other);
        assert_eq!(cleaned.text, "just some chatter");
    }

    #[test]
    fn punctuation_and_urls_are_removed() {
        let cleaned = spaced_cleaner()
            .clean(
                "question: 去哪里玩？看 http://www.example.com/guide.html 推荐，谢谢！",
                &WhitespaceTokenizer,
            )
            .expect("accepted");
        assert_eq!(cleaned.text, "去哪里玩 看 推荐 谢谢");
    }

    #[test]
    fn colon_spacing_is_collapsed() {
        let cleaner = spaced_cleaner();
        assert_eq!(cleaner.collapse_colons("时间 : 周末"), "时间:周末");
        assert_eq!(cleaner.collapse_colons("时间 ： 周末"), "时间:周末");
    }

    #[test]
    fn segmenting_cleaner_joins_words_with_spaces() {
        let cleaner = SentenceCleaner::new(CleanerConfig::default()).expect("cleaner");
        let cleaned = cleaner
            .clean("question: 你好 吗", &SegmentingTokenizer::new())
            .expect("accepted");
        assert_eq!(cleaned.role, Role::Question);
        assert_eq!(cleaned.text, "你好 吗");
    }
}
