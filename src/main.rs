use anac_od::{config::AppConfig, fetch::HttpFetcher, logging, pipeline};
use anyhow::Result;
use tracing::info;

fn main() -> Result<()> {
    // ─── 1) load config ──────────────────────────────────────────────
    let cfg = AppConfig::load_default()?;

    // ─── 2) init logging ─────────────────────────────────────────────
    logging::init(&cfg.log_file)?;
    info!("PROGRAM START");

    // ─── 3) run ──────────────────────────────────────────────────────
    let fetcher = HttpFetcher::new(cfg.max_concurrent_downloads)?;
    let report = pipeline::run(&cfg, &fetcher)?;

    info!(
        urls = report.catalog.len(),
        downloaded = report.download.downloaded.len(),
        failed = report.download.failed.len(),
        unzipped = report.unzip.as_ref().map(|u| u.succeeded.len()),
        merged_prefixes = report.merge.as_ref().map(|m| m.len()),
        "PROGRAM END"
    );
    Ok(())
}
