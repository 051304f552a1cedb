use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, time::Instant};
use tracing::{error, info, instrument};
use url::Url;

/// Per-URL outcome of a download batch, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

impl DownloadSummary {
    pub fn attempted(&self) -> usize {
        self.downloaded.len() + self.failed.len()
    }
}

/// File name a URL is saved under: its last non-empty path segment.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.zip")
        .to_string()
}

/// Download the given URL and save it under `dest_dir` using the original filename.
/// The body is streamed to a hidden temp file of its own and persisted under the
/// final name once complete; on error the temp file is removed.
/// Returns the full path of the saved file.
pub async fn download_zip(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).with_context(|| format!("parsing URL {}", url_str))?;
    let file_name = file_name_for(&url);
    let dest_path = dest_dir.join(&file_name);

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?;

    // leading dot keeps partial files out of the *.zip / *.csv listings
    let (std_file, part_path) = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".part")
        .tempfile_in(dest_dir)
        .with_context(|| format!("creating temp file in {}", dest_dir.display()))?
        .into_parts();
    let mut file = fs::File::from_std(std_file);
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("reading body from {}", url))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    part_path
        .persist(&dest_path)
        .with_context(|| format!("saving {}", dest_path.display()))?;
    Ok(dest_path)
}

/// Download every URL into `dest_dir`, at most `concurrency` at a time.
///
/// Repeated URLs are fetched once and share the outcome. A failing URL is
/// logged and recorded; it does not stop the batch.
#[instrument(level = "info", skip(client, urls, dest_dir), fields(urls = urls.len()))]
pub async fn download_all(
    client: &Client,
    urls: &[String],
    dest_dir: &Path,
    concurrency: usize,
) -> DownloadSummary {
    let mut unique: Vec<&String> = Vec::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let slots: Vec<usize> = urls
        .iter()
        .map(|url| {
            *first_seen.entry(url.as_str()).or_insert_with(|| {
                unique.push(url);
                unique.len() - 1
            })
        })
        .collect();
    if unique.len() < urls.len() {
        info!(
            duplicates = urls.len() - unique.len(),
            "repeated URLs are downloaded once"
        );
    }

    let mut outcomes: Vec<(usize, Result<PathBuf, String>)> =
        stream::iter(unique.iter().enumerate())
            .map(|(idx, url)| async move {
                let start = Instant::now();
                info!(url = %url, "downloading");
                let outcome = match download_zip(client, url, dest_dir).await {
                    Ok(path) => {
                        info!(url = %url, elapsed = ?start.elapsed(), "downloaded");
                        Ok(path)
                    }
                    Err(err) => {
                        error!("{} failed: {:#}", url, err);
                        Err(format!("{:#}", err))
                    }
                };
                (idx, outcome)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
    outcomes.sort_by_key(|(idx, _)| *idx);

    let mut summary = DownloadSummary::default();
    for (url, slot) in urls.iter().zip(slots) {
        match &outcomes[slot].1 {
            Ok(path) => summary.downloaded.push(path.clone()),
            Err(err) => summary.failed.push((url.clone(), err.clone())),
        }
    }
    summary
}
