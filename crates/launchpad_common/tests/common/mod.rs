//! Shared fixtures for the integration tests

#![allow(dead_code)]

use launchpad_common::config::LaunchpadConfig;
use launchpad_common::platform::{NativePlatform, Platform};
use launchpad_common::{ArtifactCache, RemoteFetcher};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use wiremock::MockServer;

/// Config pointing both the raw base and the listing API at a mock server
pub fn config_for(server: &MockServer, root: &Path) -> LaunchpadConfig {
    let mut config = LaunchpadConfig::default();
    config.source.raw_base = Some(format!("{}/raw", server.uri()));
    config.source.api_base = Some(format!("{}/api", server.uri()));
    config.cache.root = root.join("cache");
    config.update.staging_dir = Some(root.join("staging"));
    config.update.agent_path = "tools/launchpad-swap".to_string();
    config.network.fetch_timeout_secs = 5;
    config.network.manifest_timeout_secs = 5;
    config.network.listing_timeout_secs = 5;
    config
}

pub fn cache_for(config: &LaunchpadConfig) -> ArtifactCache {
    let fetcher = RemoteFetcher::new(config).unwrap();
    ArtifactCache::new(config.cache.root.clone(), fetcher)
}

/// Native filesystem behaviour, but process spawns are only recorded
#[derive(Default)]
pub struct RecordingPlatform {
    pub spawned: Mutex<Vec<(PathBuf, Vec<OsString>)>>,
}

impl RecordingPlatform {
    pub fn spawns(&self) -> Vec<(PathBuf, Vec<OsString>)> {
        self.spawned.lock().unwrap().clone()
    }
}

impl Platform for RecordingPlatform {
    fn is_locked(&self, path: &Path) -> bool {
        NativePlatform.is_locked(path)
    }

    fn atomic_replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        NativePlatform.atomic_replace(from, to)
    }

    fn make_executable(&self, path: &Path) -> io::Result<()> {
        NativePlatform.make_executable(path)
    }

    fn spawn_detached(&self, program: &Path, args: &[OsString]) -> io::Result<()> {
        self.spawned
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        Ok(())
    }
}

pub fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}
