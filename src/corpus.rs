//! Facilities for discovering input files, streaming text corpora, and staging the cleaned
//! training corpus.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};
use walkdir::WalkDir;

use crate::clean::SentenceCleaner;
use crate::config::{IngestConfig, RoleFilter, Staging};
use crate::error::{PrepError, Result};
use crate::metrics::PrepareMetrics;
use crate::store::{should_skip, write_atomically, Stage};
use crate::tokenizer::Tokenizer;

/// Interval, in lines, between progress log records of streaming stages.
pub const PROGRESS_INTERVAL: usize = 100_000;

/// Discovers files rooted at the provided input paths according to the ingest configuration.
///
/// Directory entries are visited in file-name order so that frequency ties between tokens
/// resolve the same way on every run.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(PrepError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .metadata()
            .map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            if cfg.recursive {
                let walker = WalkDir::new(path)
                    .follow_links(cfg.follow_symlinks)
                    .sort_by_file_name();
                for entry in walker {
                    let entry = entry.map_err(|err| PrepError::Internal(err.to_string()))?;
                    if entry.file_type().is_file() {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else {
                let mut level = Vec::new();
                for entry in std::fs::read_dir(path)
                    .map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?
                {
                    let entry =
                        entry.map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?;
                    let entry_path = entry.path();
                    if entry_path.is_file() {
                        level.push(entry_path);
                    }
                }
                level.sort();
                files.extend(level);
            }
        } else if metadata.is_file() {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(PrepError::InvalidConfig(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}

/// Streaming reader over the lines of a UTF-8 text file.
///
/// Line terminators (`\n` or `\r\n`) are removed. Malformed UTF-8 surfaces as
/// [`PrepError::Encoding`] with the offending line number.
#[derive(Debug)]
pub struct LineReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl Iterator for LineReader {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        self.line_number += 1;
        Some(line.map_err(|err| PrepError::read(err, self.path.clone(), self.line_number)))
    }
}

/// Opens `path` for line-by-line reading.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<LineReader> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| PrepError::io(err, Some(path.to_path_buf())))?;
    Ok(LineReader {
        path: path.to_path_buf(),
        lines: BufReader::new(file).lines(),
        line_number: 0,
    })
}

/// Cleans a raw tagged corpus into one segmented sentence per line.
///
/// Lines rejected by the cleaner or whose role fails `filter` are dropped; the rest are
/// written in source order. Under [`Staging::SkipExisting`] an existing `dest` is kept as is.
pub fn prepare_corpus<P, Q>(
    source: P,
    dest: Q,
    cleaner: &SentenceCleaner,
    tokenizer: &dyn Tokenizer,
    filter: RoleFilter,
    staging: Staging,
) -> Result<Stage<PrepareMetrics>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let (source, dest) = (source.as_ref(), dest.as_ref());
    if should_skip(dest, staging, "prepare") {
        return Ok(Stage::Skipped);
    }
    info!(
        "preparing training corpus {} from {}",
        dest.display(),
        source.display()
    );
    let start = Instant::now();
    let mut metrics = PrepareMetrics::default();
    let reader = read_lines(source)?;
    write_atomically(dest, |writer| {
        for line in reader {
            let line = line?;
            metrics.lines_read += 1;
            if metrics.lines_read % PROGRESS_INTERVAL == 0 {
                debug!("  cleaning line {}", metrics.lines_read);
            }
            let Some(cleaned) = cleaner.clean(&line, tokenizer) else {
                metrics.rejected += 1;
                continue;
            };
            if !filter.accepts(cleaned.role) {
                metrics.filtered_out += 1;
                continue;
            }
            writeln!(writer, "{}", cleaned.text)
                .map_err(|err| PrepError::io(err, Some(dest.to_path_buf())))?;
            metrics.kept += 1;
        }
        Ok(())
    })?;
    metrics.duration = start.elapsed();
    info!(
        "prepared {}: kept {} of {} lines ({} rejected, {} filtered) in {:.2?}",
        dest.display(),
        metrics.kept,
        metrics.lines_read,
        metrics.rejected,
        metrics.filtered_out,
        metrics.duration
    );
    Ok(Stage::Written(metrics))
}
