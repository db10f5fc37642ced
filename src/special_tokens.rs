//! Reserved symbols that occupy the lowest vocabulary ids.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::vocab::TokenId;

/// Id of the padding symbol.
pub const PAD_ID: TokenId = 0;
/// Id of the go (start-of-decoding) symbol.
pub const GO_ID: TokenId = 1;
/// Id of the end-of-sequence symbol.
pub const EOS_ID: TokenId = 2;
/// Id every out-of-vocabulary token maps to.
pub const UNK_ID: TokenId = 3;

/// Number of reserved symbols at the head of every vocabulary.
pub const RESERVED_COUNT: usize = 4;

/// Spellings of the four reserved symbols.
///
/// Ids are fixed by position: PAD=0, GO=1, EOS=2, UNK=3. Only the surface strings are
/// configurable so that vocabularies can avoid colliding with corpus tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedSymbols {
    /// Padding symbol, id [`PAD_ID`].
    pub pad: String,
    /// Go symbol, id [`GO_ID`].
    pub go: String,
    /// End-of-sequence symbol, id [`EOS_ID`].
    pub eos: String,
    /// Unknown-token symbol, id [`UNK_ID`].
    pub unk: String,
}

impl Default for ReservedSymbols {
    fn default() -> Self {
        Self {
            pad: "_PAD".into(),
            go: "_GO".into(),
            eos: "_EOS".into(),
            unk: "_UNK".into(),
        }
    }
}

impl ReservedSymbols {
    /// Returns the symbols in id order.
    #[must_use]
    pub fn as_array(&self) -> [&str; RESERVED_COUNT] {
        [&self.pad, &self.go, &self.eos, &self.unk]
    }

    /// Returns owned copies of the symbols in id order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.as_array().iter().map(|s| (*s).to_string()).collect()
    }

    /// Returns true when `token` spells one of the reserved symbols.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.as_array().contains(&token)
    }

    /// Checks that every symbol is non-empty, whitespace free, and distinct.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(RESERVED_COUNT);
        for symbol in self.as_array() {
            if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
                return Err(PrepError::InvalidConfig(format!(
                    "reserved symbol {symbol:?} must be non-empty and contain no whitespace"
                )));
            }
            if !seen.insert(symbol) {
                return Err(PrepError::InvalidConfig(format!(
                    "reserved symbol {symbol:?} is listed twice"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_symbols_follow_id_order() {
        let reserved = ReservedSymbols::default();
        let symbols = reserved.as_array();
        assert_eq!(symbols[PAD_ID as usize], "_PAD");
        assert_eq!(symbols[GO_ID as usize], "_GO");
        assert_eq!(symbols[EOS_ID as usize], "_EOS");
        assert_eq!(symbols[UNK_ID as usize], "_UNK");
        reserved.validate().expect("defaults are valid");
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let reserved = ReservedSymbols {
            eos: "_PAD".into(),
            ..ReservedSymbols::default()
        };
        let err = reserved.validate().expect_err("duplicate must fail");
        assert!(matches!(err, PrepError::InvalidConfig(msg) if msg.contains("twice")));
    }

    #[test]
    fn whitespace_symbols_are_rejected() {
        let reserved = ReservedSymbols {
            unk: "<un k>".into(),
            ..ReservedSymbols::default()
        };
        assert!(reserved.validate().is_err());
    }
}
