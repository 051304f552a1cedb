// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::runtime::Runtime;

pub mod unzip;
pub mod zips;

pub use unzip::{unzip_all, UnzipOutcome};
pub use zips::{download_all, download_zip, DownloadSummary};

/// The network and archive services a run depends on.
pub trait Fetcher {
    /// Retrieve every URL into `target_dir`. Per-URL failures belong in the
    /// summary; an `Err` means the batch itself could not run.
    fn download_all(&self, urls: &[String], target_dir: &Path) -> Result<DownloadSummary>;

    fn unzip_all(&self, dir: &Path) -> Result<UnzipOutcome>;
}

/// HTTP downloads on a private tokio runtime, unzip on the rayon pool.
pub struct HttpFetcher {
    client: Client,
    runtime: Runtime,
    concurrency: usize,
}

impl HttpFetcher {
    pub fn new(concurrency: usize) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building download runtime")?;
        Ok(Self {
            client,
            runtime,
            concurrency,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn download_all(&self, urls: &[String], target_dir: &Path) -> Result<DownloadSummary> {
        Ok(self.runtime.block_on(zips::download_all(
            &self.client,
            urls,
            target_dir,
            self.concurrency,
        )))
    }

    fn unzip_all(&self, dir: &Path) -> Result<UnzipOutcome> {
        unzip::unzip_all(dir)
    }
}
