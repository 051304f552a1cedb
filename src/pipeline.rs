// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::{fs, path::Path};
use tracing::{info, instrument, warn};

use crate::{
    catalog::{
        read_configured_sources, Catalog, PeriodGrid, UrlTemplate, OTHERS_GROUP, PREFIXES_GROUP,
    },
    config::AppConfig,
    fetch::{DownloadSummary, Fetcher, UnzipOutcome},
    merge::{consolidate, MergeSummary},
};

/// What a run did, phase by phase. Skipped phases are `None`.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub catalog: Catalog,
    pub download: DownloadSummary,
    pub unzip: Option<UnzipOutcome>,
    pub merge: Option<MergeSummary>,
}

/// Idempotent directory creation.
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("creating directory {}", path.display()))
}

fn templates(patterns: Vec<String>) -> Vec<UrlTemplate> {
    patterns.into_iter().map(UrlTemplate::from).collect()
}

/// Expand the dynamic sources and append the static list.
#[instrument(level = "info", skip(cfg), fields(year_start = cfg.year_start, year_end = cfg.year_end))]
pub fn build_catalog(cfg: &AppConfig) -> Result<Catalog> {
    let grid = PeriodGrid::new(cfg.year_start, cfg.year_end).with_day(&cfg.download_day)?;
    if grid.is_empty() {
        warn!(
            "year range {}..={} is empty; no dynamic URLs",
            cfg.year_start, cfg.year_end
        );
    }

    let primary = templates(read_configured_sources(&cfg.dynamic_urls_json, &cfg.primary_key)?);
    let others = if cfg.other_dataset_names.is_empty() {
        Vec::new()
    } else {
        templates(read_configured_sources(&cfg.dynamic_urls_json, OTHERS_GROUP)?)
    };
    let statics = read_configured_sources(&cfg.static_urls_json, OTHERS_GROUP)?;

    let catalog = Catalog::build(
        &grid,
        &cfg.primary_key,
        &primary,
        &cfg.other_dataset_names,
        &others,
        statics,
    );
    catalog.log_listing();
    Ok(catalog)
}

fn run_merge(cfg: &AppConfig) -> Result<MergeSummary> {
    let prefixes = read_configured_sources(&cfg.prefixes_json, PREFIXES_GROUP)?;
    if prefixes.is_empty() {
        warn!("no prefixes found in '{}'", cfg.prefixes_json.display());
        return Ok(MergeSummary::default());
    }
    info!("prefixes found for merging: {}", prefixes.len());

    let summary = consolidate(&cfg.download_dir, &cfg.data_dir, &prefixes)?;
    if summary.is_empty() {
        warn!("no CSV files matched the provided prefixes");
    } else {
        for (prefix, result) in summary.iter() {
            info!(
                "- {}: files merged={}, lines={}, output={}",
                prefix,
                result.files_merged,
                result.lines,
                result.output_file.display()
            );
        }
        info!("merge completed for {} prefixes", summary.len());
    }
    Ok(summary)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Run catalog → download → unzip → merge for `cfg`, using `fetcher` for the
/// network and archive steps. Each phase completes before the next begins.
pub fn run<F: Fetcher>(cfg: &AppConfig, fetcher: &F) -> Result<RunReport> {
    let start = now();
    info!("start process: {}", start.format("%Y-%m-%d %H:%M:%S"));

    // ─── 1) working directories ──────────────────────────────────────
    ensure_directory(&cfg.download_dir)?;
    ensure_directory(&cfg.data_dir)?;

    // ─── 2) catalog ──────────────────────────────────────────────────
    let catalog = build_catalog(cfg)?;
    let urls: Vec<String> = catalog.urls().cloned().collect();

    // ─── 3) download ─────────────────────────────────────────────────
    info!(
        "starting download from {} URLs into {}",
        urls.len(),
        cfg.download_dir.display()
    );
    let download = fetcher.download_all(&urls, &cfg.download_dir)?;
    info!(
        downloaded = download.downloaded.len(),
        failed = download.failed.len(),
        "download completed"
    );
    for (url, err) in &download.failed {
        warn!(url = %url, "download failed: {}", err);
    }

    // ─── 4) unzip ────────────────────────────────────────────────────
    let unzip = if cfg.unzip_do {
        let outcome = fetcher.unzip_all(&cfg.download_dir)?;
        info!(
            "unzipped files: {}, files with errors: {}",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        Some(outcome)
    } else {
        info!("unzipping skipped as per configuration (UNZIP_DO = false)");
        None
    };

    // ─── 5) merge ────────────────────────────────────────────────────
    let merge = if cfg.merge_do {
        Some(run_merge(cfg)?)
    } else {
        info!("merging skipped as per configuration (MERGE_DO = false)");
        None
    };

    let end = now();
    info!("end process: {}", end.format("%Y-%m-%d %H:%M:%S"));
    info!("time to finish: {}s", (end - start).num_seconds());

    Ok(RunReport {
        catalog,
        download,
        unzip,
        merge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, path::PathBuf};
    use tempfile::TempDir;

    /// Records calls and fakes the network by writing CSVs into the target.
    #[derive(Default)]
    struct FakeFetcher {
        downloads: RefCell<Vec<Vec<String>>>,
        unzips: RefCell<Vec<PathBuf>>,
    }

    impl Fetcher for FakeFetcher {
        fn download_all(&self, urls: &[String], target_dir: &Path) -> Result<DownloadSummary> {
            self.downloads.borrow_mut().push(urls.to_vec());
            let mut summary = DownloadSummary::default();
            for url in urls {
                let name = url.rsplit('/').next().unwrap_or("x").replace(".zip", ".csv");
                let path = target_dir.join(name);
                fs::write(&path, format!("{}\n", url))?;
                summary.downloaded.push(path);
            }
            Ok(summary)
        }

        fn unzip_all(&self, dir: &Path) -> Result<UnzipOutcome> {
            self.unzips.borrow_mut().push(dir.to_path_buf());
            Ok(UnzipOutcome::default())
        }
    }

    fn write_sources(root: &Path, prefixes: &str) -> Result<()> {
        fs::write(
            root.join("dynamic.json"),
            r#"{
                "cig": ["https://h/cig-{YYYY}/{dataset-name}_{YYYY}_{MM}.zip"],
                "others": ["https://h/{dataset-name}/{dataset-name}_{YYYY}_{MM}.zip"]
            }"#,
        )?;
        fs::write(root.join("static.json"), r#"{"others": ["https://h/stazioni.zip"]}"#)?;
        fs::write(root.join("prefixes.json"), prefixes)?;
        Ok(())
    }

    fn config(root: &Path, unzip_do: bool, merge_do: bool) -> AppConfig {
        AppConfig {
            year_start: 2024,
            year_end: 2024,
            static_urls_json: root.join("static.json"),
            dynamic_urls_json: root.join("dynamic.json"),
            prefixes_json: root.join("prefixes.json"),
            primary_key: "cig".to_string(),
            other_dataset_names: vec!["agg".to_string()],
            merge_do,
            unzip_do,
            download_dir: root.join("download"),
            data_dir: root.join("od"),
            download_day: "01".to_string(),
            max_concurrent_downloads: 1,
            log_file: root.join("run.log"),
        }
    }

    fn setup(prefixes: &str) -> Result<TempDir> {
        let root = tempfile::tempdir()?;
        write_sources(root.path(), prefixes)?;
        Ok(root)
    }

    #[test]
    fn catalog_orders_primary_others_static() -> Result<()> {
        let root = setup(r#"{"prefixes": []}"#)?;
        let catalog = build_catalog(&config(root.path(), false, false))?;
        let urls: Vec<String> = catalog.into_urls();
        assert_eq!(urls.len(), 12 + 12 + 1);
        assert_eq!(urls[0], "https://h/cig-2024/cig_2024_01.zip");
        assert_eq!(urls[11], "https://h/cig-2024/cig_2024_12.zip");
        assert_eq!(urls[12], "https://h/agg/agg_2024_01.zip");
        assert_eq!(urls[24], "https://h/stazioni.zip");
        Ok(())
    }

    #[test]
    fn skipped_phases_are_not_invoked() -> Result<()> {
        let root = setup(r#"{"prefixes": ["cig"]}"#)?;
        let fetcher = FakeFetcher::default();
        let report = run(&config(root.path(), false, false), &fetcher)?;

        assert_eq!(fetcher.downloads.borrow().len(), 1);
        assert!(fetcher.unzips.borrow().is_empty());
        assert!(report.unzip.is_none());
        assert!(report.merge.is_none());
        assert!(!root.path().join("od/cig.csv").exists());
        Ok(())
    }

    #[test]
    fn full_run_merges_downloaded_files() -> Result<()> {
        let root = setup(r#"{"prefixes": ["cig", "agg", "absent"]}"#)?;
        let fetcher = FakeFetcher::default();
        let cfg = config(root.path(), true, true);
        let report = run(&cfg, &fetcher)?;

        assert_eq!(fetcher.downloads.borrow()[0].len(), 25);
        assert_eq!(*fetcher.unzips.borrow(), vec![cfg.download_dir.clone()]);
        assert_eq!(report.download.downloaded.len(), 25);

        let merge = report.merge.expect("merge ran");
        assert_eq!(merge.len(), 2);
        let cig = merge.get("cig").unwrap();
        assert_eq!(cig.files_merged, 12);
        assert_eq!(cig.lines, 12);
        assert_eq!(cig.output_file, cfg.data_dir.join("cig.csv"));
        let text = fs::read_to_string(&cig.output_file)?;
        assert!(text.starts_with("https://h/cig-2024/cig_2024_01.zip\n"));
        assert!(!merge.contains("absent"));
        Ok(())
    }

    #[test]
    fn empty_prefix_list_is_a_warning_not_an_error() -> Result<()> {
        let root = setup(r#"{"other": ["cig"]}"#)?;
        let report = run(&config(root.path(), false, true), &FakeFetcher::default())?;
        assert_eq!(report.merge, Some(MergeSummary::default()));
        Ok(())
    }

    #[test]
    fn missing_source_file_aborts_the_run() {
        let root = setup(r#"{"prefixes": []}"#).unwrap();
        fs::remove_file(root.path().join("static.json")).unwrap();
        let fetcher = FakeFetcher::default();
        assert!(run(&config(root.path(), false, false), &fetcher).is_err());
        assert!(fetcher.downloads.borrow().is_empty());
    }
}
