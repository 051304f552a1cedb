// src/merge/consolidate.rs

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use serde::Serialize;
use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use super::prefix::normalize;

/// Outcome of merging every file that shares one prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub output_file: PathBuf,
    pub files_merged: usize,
    pub lines: usize,
}

/// Per-prefix results, in the order the prefixes were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    entries: Vec<(String, MergeResult)>,
}

impl MergeSummary {
    pub fn get(&self, prefix: &str) -> Option<&MergeResult> {
        self.entries
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, r)| r)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.get(prefix).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MergeResult)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), r))
    }
}

/// `*.csv` files directly under `dir`, sorted by path.
fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.csv", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let mut files = Vec::new();
    for entry in glob_with(&pattern, options).context("invalid glob pattern for CSV listing")? {
        let path = entry.with_context(|| format!("listing {}", dir.display()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Lines in `path` as a text reader sees them: `\n`, `\r\n` and a lone `\r`
/// each end a line, and a trailing unterminated line counts as one.
pub fn count_lines(path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut lines = 0;
    let mut pending = false;
    // a `\r` at the end of one buffer pairs with a `\n` at the start of the next
    let mut after_cr = false;
    loop {
        let buf = reader
            .fill_buf()
            .with_context(|| format!("reading {}", path.display()))?;
        if buf.is_empty() {
            break;
        }
        for &b in buf {
            match b {
                b'\r' => lines += 1,
                b'\n' if !after_cr => lines += 1,
                _ => {}
            }
            after_cr = b == b'\r';
        }
        let last = buf[buf.len() - 1];
        pending = last != b'\n' && last != b'\r';
        let len = buf.len();
        reader.consume(len);
    }
    Ok(lines + usize::from(pending))
}

fn stem_of(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Concatenate `sources` byte for byte into `output`, replacing it.
fn concatenate(prefix: &str, sources: &[&PathBuf], output: &Path) -> Result<()> {
    let out = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = BufWriter::new(out);
    for source in sources {
        let mut reader =
            File::open(source).with_context(|| format!("opening {}", source.display()))?;
        io::copy(&mut reader, &mut writer)
            .with_context(|| format!("copying {} into {}", source.display(), output.display()))?;
        let name = source.file_name().unwrap_or_default().to_string_lossy();
        info!(prefix, file = %name, "merged");
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", output.display()))?;
    Ok(())
}

/// Merge the CSV files of `source_dir` into one `<prefix>.csv` per requested
/// prefix under `output_dir`.
///
/// A missing source directory or an empty prefix list is logged and yields an
/// empty summary. Prefixes with no matching file are left out. Any I/O error
/// aborts the whole call.
#[instrument(level = "info", skip(source_dir, output_dir, prefixes), fields(source = %source_dir.as_ref().display()))]
pub fn consolidate<S: AsRef<str>>(
    source_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    prefixes: &[S],
) -> Result<MergeSummary> {
    let source_dir = source_dir.as_ref();
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    if !source_dir.is_dir() {
        warn!("source directory {} does not exist", source_dir.display());
        return Ok(MergeSummary::default());
    }
    if prefixes.is_empty() {
        warn!("no prefixes provided for merging");
        return Ok(MergeSummary::default());
    }

    let csv_files = list_csv_files(source_dir)?;
    let normalized: Vec<Option<String>> = csv_files
        .iter()
        .map(|p| stem_of(p).map(normalize))
        .collect();

    let mut summary = MergeSummary::default();
    let mut seen = HashSet::new();

    for prefix in prefixes {
        let prefix: &str = prefix.as_ref();
        if !seen.insert(prefix) {
            continue;
        }
        let matched: Vec<&PathBuf> = csv_files
            .iter()
            .zip(&normalized)
            .filter(|(_, norm)| norm.as_deref() == Some(prefix))
            .map(|(path, _)| path)
            .collect();
        if matched.is_empty() {
            continue;
        }

        let output_file = output_dir.join(format!("{}.csv", prefix));
        concatenate(prefix, &matched, &output_file)?;
        let lines = count_lines(&output_file)?;

        info!(
            "prefix '{}' merged into '{}' with {} files and {} lines",
            prefix,
            output_file.display(),
            matched.len(),
            lines
        );
        summary.entries.push((
            prefix.to_string(),
            MergeResult {
                output_file,
                files_merged: matched.len(),
                lines,
            },
        ));
    }

    Ok(summary)
}
