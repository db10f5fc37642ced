//! Persistence of vocabularies and staged artefacts.
//!
//! Vocabulary files are UTF-8 text with one token per line; line order is id order. Every
//! artefact is written to a temporary file in the destination directory and renamed into
//! place once complete, so a failed stage never leaves a truncated file behind.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::config::Staging;
use crate::corpus::read_lines;
use crate::error::{PrepError, Result};
use crate::vocab::Vocabulary;

/// Result of a stage that writes an artefact under a [`Staging`] policy.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Stage<T> {
    /// The artefact was (re)generated.
    Written(T),
    /// The destination already existed and [`Staging::SkipExisting`] was in effect.
    Skipped,
}

impl<T> Stage<T> {
    /// Returns true when the stage short-circuited.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Returns the stage output when it ran.
    #[must_use]
    pub fn written(self) -> Option<T> {
        match self {
            Self::Written(value) => Some(value),
            Self::Skipped => None,
        }
    }
}

/// Returns true when `dest` should be left alone under `staging`, logging the decision.
#[must_use]
pub fn should_skip(dest: &Path, staging: Staging, stage: &str) -> bool {
    if staging == Staging::SkipExisting && dest.exists() {
        info!("{stage}: {} already exists, skipping", dest.display());
        return true;
    }
    false
}

/// Writes `dest` through a temporary sibling file that is renamed into place on success.
pub fn write_atomically<P, F>(dest: P, fill: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let dest = dest.as_ref();
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp =
        NamedTempFile::new_in(dir).map_err(|err| PrepError::io(err, Some(dir.to_path_buf())))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        fill(&mut writer)?;
        writer
            .flush()
            .map_err(|err| PrepError::io(err, Some(dest.to_path_buf())))?;
    }
    tmp.persist(dest)
        .map_err(|err| PrepError::io(err.error, Some(dest.to_path_buf())))?;
    Ok(())
}

/// Writes tokens one per line in the given order.
///
/// Tokens containing a line break cannot be represented and are rejected.
pub fn save_vocabulary<P: AsRef<Path>>(path: P, tokens: &[String]) -> Result<()> {
    let path = path.as_ref();
    if let Some(bad) = tokens.iter().find(|token| token.contains(['\n', '\r'])) {
        return Err(PrepError::InvalidConfig(format!(
            "token {bad:?} contains a line break and cannot be stored"
        )));
    }
    write_atomically(path, |writer| {
        for token in tokens {
            writeln!(writer, "{token}").map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?;
        }
        Ok(())
    })
}

/// Loads a vocabulary file, preserving line order as id order.
///
/// Surrounding whitespace on each line is ignored.
pub fn load_vocabulary<P: AsRef<Path>>(path: P) -> Result<Vocabulary> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PrepError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let mut tokens = Vec::new();
    for line in read_lines(path)? {
        tokens.push(line?.trim().to_string());
    }
    let vocabulary = Vocabulary::from_tokens(tokens)?;
    let duplicates = vocabulary.len() - vocabulary.forward().len();
    if duplicates > 0 {
        warn!(
            "{} lists {duplicates} duplicate token(s); later lines win",
            path.display()
        );
    }
    Ok(vocabulary)
}
