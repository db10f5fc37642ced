//! The ordered vocabulary and its forward/reverse mappings.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use crate::error::{PrepError, Result};
use crate::special_tokens::{ReservedSymbols, RESERVED_COUNT, UNK_ID};

/// Token identifier used throughout the crate.
pub type TokenId = u32;

/// Ordered sequence of unique tokens; a token's position is its id.
///
/// The forward mapping (token to id) is derived on construction. Lookups of absent tokens
/// resolve to [`UNK_ID`] and never fail; reverse lookups of unknown ids are errors.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: FxHashMap<String, TokenId>,
}

impl Vocabulary {
    /// Builds a vocabulary from tokens in id order.
    ///
    /// A token listed more than once keeps the id of its last occurrence, matching how a
    /// vocabulary file with duplicate lines resolves.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        if TokenId::try_from(tokens.len()).is_err() {
            return Err(PrepError::InvalidConfig(format!(
                "vocabulary of {} entries exceeds the TokenId range",
                tokens.len()
            )));
        }
        let mut index = FxHashMap::default();
        index.reserve(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            index.insert(token.clone(), id as TokenId);
        }
        Ok(Self { tokens, index })
    }

    /// Number of entries, reserved symbols included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true when the vocabulary has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reverse mapping: tokens in id order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Forward mapping: token to id.
    #[must_use]
    pub fn forward(&self) -> &FxHashMap<String, TokenId> {
        &self.index
    }

    /// Returns the id of `token` if present.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<TokenId> {
        self.index.get(token).copied()
    }

    /// Returns the id of `token`, or [`UNK_ID`] when it is absent.
    #[must_use]
    pub fn id_or_unk(&self, token: &str) -> TokenId {
        self.get(token).unwrap_or(UNK_ID)
    }

    /// Returns the token with the given id.
    pub fn token(&self, id: TokenId) -> Result<&str> {
        self.token_on_line(u64::from(id), 0)
    }

    /// Returns the token with the given id; `line` is reported if the id is out of range.
    pub(crate) fn token_on_line(&self, id: u64, line: usize) -> Result<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.tokens.get(idx))
            .map(String::as_str)
            .ok_or(PrepError::OutOfRange {
                id,
                vocab_size: self.tokens.len(),
                line,
            })
    }

    /// Returns true when the first entries spell `reserved` in id order.
    #[must_use]
    pub fn starts_with_reserved(&self, reserved: &ReservedSymbols) -> bool {
        self.tokens.len() >= RESERVED_COUNT
            && self.tokens[..RESERVED_COUNT]
                .iter()
                .zip(reserved.as_array())
                .all(|(token, symbol)| token == symbol)
    }
}

fn digit_pattern() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d").expect("digit pattern is valid"))
}

/// Replaces every Unicode decimal digit in `token` with `0`.
#[must_use]
pub fn normalize_digits(token: &str) -> Cow<'_, str> {
    digit_pattern().replace_all(token, "0")
}
