use serde::Serialize;
use std::fs;
use tracing::{error, info, instrument};

use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::dataset::DatasetFile;
use crate::error::Result;

/// A dataset the server refused to hand over
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedDownload {
    pub file_name: String,
    pub status: u16,
}

/// Outcome of one Fetcher pass
#[derive(Debug, Default, Serialize)]
pub struct FetchReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedDownload>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Download every configured dataset into the staging directory.
///
/// A dataset whose staged file already exists is skipped without a request,
/// whatever its content. Non-200 responses are recorded and the loop moves on;
/// transport errors abort.
#[instrument(skip_all, fields(base_url = %config.source.base_url))]
pub async fn fetch_datasets(config: &Config, http: &dyn HttpClientPort) -> Result<FetchReport> {
    let staging_dir = &config.storage.staging_dir;
    fs::create_dir_all(staging_dir)?;

    let mut report = FetchReport::default();
    for name in &config.source.datasets {
        let dataset = DatasetFile::new(name.as_str());
        let dest = dataset.staged_path(staging_dir);

        if dest.exists() {
            info!("{} already present, skipping download", name);
            crate::metrics::fetch::skipped(name);
            report.skipped.push(name.clone());
            continue;
        }

        let url = dataset.url(&config.source.base_url);
        info!("Downloading {}...", url);
        let result = http.download(&url, &dest).await?;
        if result.is_ok() {
            info!("{} downloaded ({} bytes)", name, result.bytes_written);
            crate::metrics::fetch::downloaded(name, result.bytes_written);
            report.downloaded.push(name.clone());
        } else {
            error!("Failed to download {}. Status code: {}", name, result.status);
            crate::metrics::fetch::failed(name, result.status);
            report.failed.push(FailedDownload {
                file_name: name.clone(),
                status: result.status,
            });
        }
    }

    info!(
        "Download finished: {} downloaded, {} skipped, {} failed",
        report.downloaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}
