use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, instrument, warn};
use zip::ZipArchive;

/// Archives that extracted cleanly and those that did not, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnzipOutcome {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

fn extract_into(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading archive {}", zip_path.display()))?;
    let entries = archive.len();
    archive
        .extract(dest)
        .with_context(|| format!("extracting {}", zip_path.display()))?;
    Ok(entries)
}

/// Extract every `*.zip` directly under `dir` into `dir` itself.
///
/// Archives are processed in parallel; a broken archive lands in
/// `failed` without stopping the others.
#[instrument(level = "info", skip(dir), fields(dir = %dir.display()))]
pub fn unzip_all(dir: &Path) -> Result<UnzipOutcome> {
    let start = Instant::now();
    let pattern = format!("{}/*.zip", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };
    let archives: Vec<PathBuf> = glob_with(&pattern, options)
        .context("invalid glob pattern for archive listing")?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("cannot read glob entry: {}", e);
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();

    let (ok, bad): (Vec<_>, Vec<_>) = archives
        .into_par_iter()
        .map(|zip_path| {
            let outcome = extract_into(&zip_path, dir);
            (zip_path, outcome)
        })
        .partition(|(_, outcome)| outcome.is_ok());

    let mut outcome = UnzipOutcome::default();
    for (path, res) in ok {
        if let Ok(entries) = res {
            info!(archive = %path.display(), entries, "unzipped");
        }
        outcome.succeeded.push(path);
    }
    for (path, res) in bad {
        if let Err(e) = res {
            warn!(archive = %path.display(), error = ?e, "unzip failed");
        }
        outcome.failed.push(path);
    }
    outcome.succeeded.sort();
    outcome.failed.sort();

    info!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "unzip completed in {:?}",
        start.elapsed()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Write};
    use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
        let mut zip = ZipWriter::new(File::create(path)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in entries {
            zip.start_file(*name, options)?;
            zip.write_all(body.as_bytes())?;
        }
        zip.finish()?;
        Ok(())
    }

    #[test]
    fn extracts_archives_next_to_themselves() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_zip(
            &dir.path().join("cig_csv_2024_01.zip"),
            &[("20240115-bando_cig_2024_01.csv", "h\n1\n")],
        )?;
        write_zip(
            &dir.path().join("cig_csv_2024_02.zip"),
            &[("20240215-bando_cig_2024_02.csv", "h\n2\n")],
        )?;
        fs::write(dir.path().join("broken.zip"), b"not a zip")?;
        fs::write(dir.path().join("readme.txt"), b"skip me")?;

        let outcome = unzip_all(dir.path())?;
        assert_eq!(
            outcome.succeeded,
            vec![
                dir.path().join("cig_csv_2024_01.zip"),
                dir.path().join("cig_csv_2024_02.zip"),
            ]
        );
        assert_eq!(outcome.failed, vec![dir.path().join("broken.zip")]);
        assert_eq!(
            fs::read_to_string(dir.path().join("20240115-bando_cig_2024_01.csv"))?,
            "h\n1\n"
        );
        assert!(dir.path().join("20240215-bando_cig_2024_02.csv").is_file());
        Ok(())
    }

    #[test]
    fn empty_directory_has_nothing_to_do() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(unzip_all(dir.path())?, UnzipOutcome::default());
        Ok(())
    }
}
