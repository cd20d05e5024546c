//! Update coordinator
//!
//! Runs once at startup. State machine:
//!
//! 1. fetch and validate the manifest
//! 2. compare versions (plain string equality)
//! 3. download the new binary to a private temp file
//! 4. verify its SHA-256
//! 5. make sure the swap agent is in the cache
//! 6. start the agent detached and exit
//!
//! Any failure ends in `Aborted` and the host keeps running the current
//! version. A bad digest deletes the download; nothing unverified is ever
//! handed to the agent.

use crate::cache::ArtifactCache;
use crate::catalog::ArtifactEntry;
use crate::config::LaunchpadConfig;
use crate::error::{LaunchpadError, Result};
use crate::integrity;
use crate::manifest::Manifest;
use crate::platform::Platform;
use crate::replacement::ReplacementPlan;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Coordinator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    Start,
    ManifestFetched,
    UpToDate,
    CandidateFound,
    Downloaded,
    Verified,
    HandedOff,
    Aborted,
}

impl UpdateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ManifestFetched => "manifest_fetched",
            Self::UpToDate => "up_to_date",
            Self::CandidateFound => "candidate_found",
            Self::Downloaded => "downloaded",
            Self::Verified => "verified",
            Self::HandedOff => "handed_off",
            Self::Aborted => "aborted",
        }
    }

    /// Next state when the current step succeeds and an update is available
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::ManifestFetched),
            Self::ManifestFetched => Some(Self::CandidateFound),
            Self::CandidateFound => Some(Self::Downloaded),
            Self::Downloaded => Some(Self::Verified),
            Self::Verified => Some(Self::HandedOff),
            Self::UpToDate | Self::HandedOff | Self::Aborted => None,
        }
    }
}

/// Terminal result of one update check
#[derive(Debug)]
pub enum UpdateOutcome {
    UpToDate { version: String },
    /// `stage` is the state that could not be reached
    Aborted { stage: UpdateStage, error: LaunchpadError },
    HandedOff(ReplacementPlan),
}

impl UpdateOutcome {
    pub fn stage(&self) -> UpdateStage {
        match self {
            Self::UpToDate { .. } => UpdateStage::UpToDate,
            Self::Aborted { .. } => UpdateStage::Aborted,
            Self::HandedOff(_) => UpdateStage::HandedOff,
        }
    }
}

pub struct UpdateCoordinator {
    cache: ArtifactCache,
    platform: Arc<dyn Platform>,
    running_version: String,
    current_exe: PathBuf,
    manifest_path: String,
    manifest_timeout: Duration,
    agent: ArtifactEntry,
    staging_dir: PathBuf,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl UpdateCoordinator {
    pub fn new(
        config: &LaunchpadConfig,
        cache: ArtifactCache,
        running_version: impl Into<String>,
        current_exe: impl Into<PathBuf>,
        platform: Arc<dyn Platform>,
    ) -> Result<Self> {
        Ok(Self {
            cache,
            platform,
            running_version: running_version.into(),
            current_exe: current_exe.into(),
            manifest_path: config.source.manifest_path.clone(),
            manifest_timeout: config.network.manifest_timeout(),
            agent: ArtifactEntry::new(config.update.agent_path.trim())?,
            staging_dir: config.update.staging_dir(),
            poll_attempts: config.update.poll_attempts,
            poll_interval: config.update.poll_interval(),
        })
    }

    /// Run the state machine without exiting the process
    pub async fn check(&self) -> UpdateOutcome {
        let mut stage = UpdateStage::Start;
        log_stage(stage);
        info!("Checking for updates (running {})", self.running_version);

        let manifest = match self.fetch_manifest().await {
            Ok(m) => m,
            Err(e) => return self.abort(stage, e),
        };
        stage = advance(stage);

        if !manifest.is_update_for(&self.running_version) {
            log_stage(UpdateStage::UpToDate);
            info!("Up to date ({})", manifest.version);
            return UpdateOutcome::UpToDate {
                version: manifest.version,
            };
        }
        stage = advance(stage);
        info!(
            "New version found: {} -> {}",
            self.running_version, manifest.version
        );

        let staged = match self.download_candidate(&manifest).await {
            Ok(path) => path,
            Err(e) => return self.abort(stage, e),
        };
        stage = advance(stage);

        info!("Verifying {}", staged.display());
        if let Err(e) = integrity::ensure_matches(&staged, &manifest.sha256) {
            discard(&staged);
            return self.abort(stage, e);
        }
        stage = advance(stage);

        let plan = ReplacementPlan::new(self.current_exe.clone(), staged);
        if let Err(e) = self.hand_off(&plan).await {
            discard(&plan.new_binary_temp_path);
            return self.abort(stage, e);
        }
        advance(stage);

        UpdateOutcome::HandedOff(plan)
    }

    /// Like `check`, but a handoff ends the process with exit code 0
    ///
    /// Callers must treat this as possibly non-returning.
    pub async fn run_to_exit(&self) -> UpdateOutcome {
        let outcome = self.check().await;
        if let UpdateOutcome::HandedOff(plan) = &outcome {
            info!(
                "Exiting so {} can be replaced",
                plan.old_binary_path.display()
            );
            std::process::exit(0);
        }
        outcome
    }

    async fn fetch_manifest(&self) -> Result<Manifest> {
        let bytes = self
            .cache
            .fetcher()
            .fetch_with_timeout(&self.manifest_path, self.manifest_timeout)
            .await?;
        Manifest::parse(&bytes)
    }

    async fn download_candidate(&self, manifest: &Manifest) -> Result<PathBuf> {
        fs::create_dir_all(&self.staging_dir)
            .map_err(|e| LaunchpadError::filesystem(&self.staging_dir, e))?;

        let suffix = match std::env::consts::EXE_SUFFIX {
            "" => ".new",
            s => s,
        };
        let tmp = tempfile::Builder::new()
            .prefix("launchpad-update-")
            .suffix(suffix)
            .tempfile_in(&self.staging_dir)
            .map_err(|e| LaunchpadError::filesystem(&self.staging_dir, e))?;
        let (file, path) = tmp
            .keep()
            .map_err(|e| LaunchpadError::filesystem(&self.staging_dir, e.error))?;
        drop(file);

        info!("Downloading {} to {}", manifest.asset_url, path.display());
        match self.cache.fetcher().download(&manifest.asset_url, &path).await {
            Ok(bytes) => {
                info!("Downloaded {} bytes", bytes);
                Ok(path)
            }
            Err(e) => {
                discard(&path);
                Err(e)
            }
        }
    }

    async fn hand_off(&self, plan: &ReplacementPlan) -> Result<()> {
        let agent = self.cache.ensure_local(&self.agent).await?;
        self.platform
            .make_executable(&agent)
            .map_err(|e| LaunchpadError::filesystem(&agent, e))?;

        info!(
            "Handing off to {} ({} <- {})",
            agent.display(),
            plan.old_binary_path.display(),
            plan.new_binary_temp_path.display()
        );
        self.platform
            .spawn_detached(&agent, &self.agent_args(plan))
            .map_err(|e| LaunchpadError::filesystem(&agent, e))
    }

    /// The two plan paths, then the lock polling settings
    fn agent_args(&self, plan: &ReplacementPlan) -> Vec<OsString> {
        let mut args = plan.to_args();
        args.push("--poll-attempts".into());
        args.push(self.poll_attempts.to_string().into());
        args.push("--poll-interval-ms".into());
        args.push(self.poll_interval.as_millis().to_string().into());
        args
    }

    /// `from` is the last state reached; the outcome names the one after it
    fn abort(&self, from: UpdateStage, error: LaunchpadError) -> UpdateOutcome {
        let stage = from.next().unwrap_or(from);
        let kind = error.kind().as_str();
        if error.is_recoverable() {
            warn!("Update check stopped before {} ({}): {}", stage.as_str(), kind, error);
        } else {
            error!("Update aborted before {} ({}): {}", stage.as_str(), kind, error);
        }
        log_stage(UpdateStage::Aborted);
        UpdateOutcome::Aborted { stage, error }
    }
}

fn log_stage(stage: UpdateStage) {
    debug!("Update stage: {}", stage.as_str());
}

/// Move to the next state on the update path and log it
fn advance(stage: UpdateStage) -> UpdateStage {
    let next = stage.next().unwrap_or(UpdateStage::Aborted);
    log_stage(next);
    next
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Could not remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_path_order() {
        let mut path = vec![UpdateStage::Start];
        while let Some(next) = path[path.len() - 1].next() {
            path.push(next);
        }
        assert_eq!(
            path,
            vec![
                UpdateStage::Start,
                UpdateStage::ManifestFetched,
                UpdateStage::CandidateFound,
                UpdateStage::Downloaded,
                UpdateStage::Verified,
                UpdateStage::HandedOff,
            ]
        );
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        for stage in [UpdateStage::UpToDate, UpdateStage::HandedOff, UpdateStage::Aborted] {
            assert_eq!(stage.next(), None, "{}", stage.as_str());
        }
    }

    #[test]
    fn test_stage_names_unique() {
        let all = [
            UpdateStage::Start,
            UpdateStage::ManifestFetched,
            UpdateStage::UpToDate,
            UpdateStage::CandidateFound,
            UpdateStage::Downloaded,
            UpdateStage::Verified,
            UpdateStage::HandedOff,
            UpdateStage::Aborted,
        ];
        let mut names: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }
}
