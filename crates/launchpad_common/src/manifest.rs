//! Update manifest
//!
//! Small JSON document at a fixed location describing the latest build:
//! `{"version": "...", "asset_url": "...", "sha256": "..."}`.
//! All three keys are required.

use crate::error::{LaunchpadError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: Option<String>,
    asset_url: Option<String>,
    sha256: Option<String>,
}

/// Validated manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: String,
    /// Repository-relative path or absolute URL of the new binary
    pub asset_url: String,
    /// Expected digest, lowercase hex
    pub sha256: String,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)
            .map_err(|e| LaunchpadError::Manifest(format!("invalid JSON: {}", e)))?;

        let version = required("version", raw.version)?;
        let asset_url = required("asset_url", raw.asset_url)?;
        let sha256 = required("sha256", raw.sha256)?.to_ascii_lowercase();

        if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LaunchpadError::Manifest(format!(
                "sha256 is not a 64-character hex digest: '{}'",
                sha256
            )));
        }

        Ok(Self {
            version,
            asset_url,
            sha256,
        })
    }

    /// Any difference from the running version counts, including a downgrade
    pub fn is_update_for(&self, running_version: &str) -> bool {
        self.version != running_version
    }
}

fn required(key: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(LaunchpadError::Manifest(format!("missing '{}'", key))),
    }
}
