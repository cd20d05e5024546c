//! Remote fetcher
//!
//! Retrieves artifact bytes from the raw-content base by logical path and
//! lists remote folders through a contents-style API. Every call carries its
//! own timeout; failures come back as `Network` errors, never panics.

use crate::config::LaunchpadConfig;
use crate::error::{LaunchpadError, Result};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Entry of a contents-style directory listing
#[derive(Debug, Clone, Deserialize)]
struct ListingItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Percent-encode a logical path, keeping '/' as the folder separator
pub fn encode_logical_path(logical_path: &str) -> String {
    logical_path
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn is_absolute_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// HTTP client bound to one source repository
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    raw_base: String,
    api_base: String,
    branch: String,
    fetch_timeout: Duration,
    listing_timeout: Duration,
}

impl RemoteFetcher {
    pub fn new(config: &LaunchpadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.network.user_agent.as_str())
            .build()
            .map_err(|e| LaunchpadError::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            raw_base: config.source.raw_base_url(),
            api_base: config.source.contents_api_url(),
            branch: config.source.branch.clone(),
            fetch_timeout: config.network.fetch_timeout(),
            listing_timeout: config.network.listing_timeout(),
        })
    }

    /// Full URL for a logical path; absolute URLs pass through unchanged
    pub fn locator(&self, logical_path: &str) -> String {
        if is_absolute_url(logical_path) {
            return logical_path.to_string();
        }
        format!(
            "{}/{}",
            self.raw_base,
            encode_logical_path(logical_path.trim_start_matches('/'))
        )
    }

    pub async fn fetch(&self, logical_path: &str) -> Result<Vec<u8>> {
        self.fetch_with_timeout(logical_path, self.fetch_timeout)
            .await
    }

    /// Fetch with an explicit timeout; anything but HTTP 200 is a failure
    pub async fn fetch_with_timeout(
        &self,
        logical_path: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let url = self.locator(logical_path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| LaunchpadError::network(logical_path, describe(&e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(LaunchpadError::network(
                logical_path,
                format!("HTTP {}", status),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LaunchpadError::network(logical_path, describe(&e)))?;
        Ok(bytes.to_vec())
    }

    /// Fetch into `dest`, returning the number of bytes written
    ///
    /// The body is written to a sibling temp file and renamed over `dest`, so
    /// a failure never leaves a truncated file under the final name.
    pub async fn download(&self, logical_path: &str, dest: &Path) -> Result<u64> {
        let bytes = self.fetch(logical_path).await?;
        persist_bytes(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Names of plain files in a remote folder; empty on any failure
    pub async fn list_remote_folder(&self, folder: &str) -> Vec<String> {
        let url = format!(
            "{}/{}",
            self.api_base,
            encode_logical_path(folder.trim_matches('/'))
        );

        let response = match self
            .client
            .get(&url)
            .query(&[("ref", self.branch.as_str())])
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(self.listing_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Listing {} failed: {}", folder, describe(&e));
                return Vec::new();
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!("Listing {} failed: HTTP {}", folder, response.status());
            return Vec::new();
        }

        match response.json::<Vec<ListingItem>>().await {
            Ok(items) => items
                .into_iter()
                .filter(|item| item.kind == "file")
                .map(|item| item.name)
                .collect(),
            Err(e) => {
                warn!("Listing {} returned unexpected JSON: {}", folder, e);
                Vec::new()
            }
        }
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

/// Write bytes next to `dest` and rename into place
pub(crate) fn persist_bytes(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| LaunchpadError::filesystem(parent, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".launchpad-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| LaunchpadError::filesystem(parent, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| LaunchpadError::filesystem(tmp.path(), e))?;
    tmp.persist(dest)
        .map_err(|e| LaunchpadError::filesystem(dest, e.error))?;
    Ok(())
}
