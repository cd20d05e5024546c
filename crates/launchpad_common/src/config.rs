//! Launchpad Configuration
//!
//! Built once at startup and handed to the fetcher, cache and coordinator.
//! Config file: --config flag, $LAUNCHPAD_CONFIG, or ~/.config/launchpad/config.toml

use crate::catalog::ArtifactEntry;
use crate::error::{LaunchpadError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "LAUNCHPAD_CONFIG";

const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";
const DEFAULT_API_HOST: &str = "https://api.github.com";

/// Where artifacts and the update manifest live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch or ref used for raw fetches and listings
    pub branch: String,
    /// Manifest location, relative to the repository root
    pub manifest_path: String,
    /// Full raw base override (skips owner/repo/branch)
    pub raw_base: Option<String>,
    /// Full contents API base override
    pub api_base: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            manifest_path: "latest.json".to_string(),
            raw_base: None,
            api_base: None,
        }
    }
}

impl SourceConfig {
    /// Base that logical paths are joined onto, without trailing slash
    pub fn raw_base_url(&self) -> String {
        match &self.raw_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!(
                "{}/{}/{}/{}",
                DEFAULT_RAW_HOST, self.owner, self.repo, self.branch
            ),
        }
    }

    /// Contents-style listing endpoint, without trailing slash
    pub fn contents_api_url(&self) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!(
                "{}/repos/{}/{}/contents",
                DEFAULT_API_HOST, self.owner, self.repo
            ),
        }
    }

    fn is_configured(&self) -> bool {
        self.raw_base.is_some() || (!self.owner.is_empty() && !self.repo.is_empty())
    }
}

/// Timeouts and HTTP identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub fetch_timeout_secs: u64,
    pub manifest_timeout_secs: u64,
    pub listing_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            manifest_timeout_secs: 10,
            listing_timeout_secs: 20,
            user_agent: format!("launchpad/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetworkConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }
}

/// Local cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir);
        Self {
            root: base.join("launchpad"),
        }
    }
}

/// Self-update settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Run the update check before anything else
    pub check_on_startup: bool,
    /// Logical path of the swap agent in the repository
    pub agent_path: String,
    /// Where the new binary is staged (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,
    /// Lock polls before the swap agent gives up
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_on_startup: true,
            agent_path: format!("launchpad-swap{}", std::env::consts::EXE_SUFFIX),
            staging_dir: None,
            poll_attempts: 30,
            poll_interval_ms: 1000,
        }
    }
}

impl UpdateConfig {
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One catalog line as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Repository-relative path, e.g. "EXM/Tool.cmd"
    pub path: String,
    /// Friendly name shown in listings
    #[serde(default)]
    pub label: Option<String>,
}

/// Main Launchpad configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchpadConfig {
    pub source: SourceConfig,
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub update: UpdateConfig,
    pub artifacts: Vec<ArtifactSpec>,
    /// Remote folders whose files are picked up during a bulk sync
    pub folders: Vec<String>,
    /// Shell command lines for the auto-commands action
    pub auto_commands: Vec<String>,
}

impl LaunchpadConfig {
    /// Default user config path: ~/.config/launchpad/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("launchpad").join("config.toml"))
    }

    /// Resolve the config file to read
    ///
    /// Priority:
    /// 1. Explicit path (command line)
    /// 2. $LAUNCHPAD_CONFIG
    /// 3. User config
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            if !env_path.is_empty() {
                return Some(PathBuf::from(env_path));
            }
        }
        Self::user_config_path()
    }

    /// Load configuration; an explicit path must exist, implicit ones may not
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match Self::resolve_path(explicit) {
            Some(path) if path.exists() || explicit.is_some() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).map_err(|e| LaunchpadError::filesystem(path, e))?;
        Self::from_toml(&contents)
            .map_err(|e| LaunchpadError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| LaunchpadError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source.is_configured() {
            return Err(LaunchpadError::Config(
                "source needs owner and repo, or raw_base".to_string(),
            ));
        }
        let net = &self.network;
        if net.fetch_timeout_secs == 0
            || net.manifest_timeout_secs == 0
            || net.listing_timeout_secs == 0
        {
            return Err(LaunchpadError::Config(
                "network timeouts must be non-zero".to_string(),
            ));
        }
        if self.update.poll_attempts == 0 {
            return Err(LaunchpadError::Config(
                "update.poll_attempts must be at least 1".to_string(),
            ));
        }
        // Must name a file, or the update check could never fetch the agent
        ArtifactEntry::new(self.update.agent_path.trim())
            .map_err(|e| LaunchpadError::Config(format!("update.agent_path: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
folders = ["EXM"]
auto_commands = ["echo hello"]

[source]
owner = "someone"
repo = "tools"

[cache]
root = "/tmp/launchpad-cache"

[[artifacts]]
label = "Clean"
path = "1 Clean.bat"

[[artifacts]]
path = "EXM/Tool V4.cmd"
"#;

    #[test]
    fn test_parse_sample() {
        let config = LaunchpadConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.source.branch, "main");
        assert_eq!(config.source.manifest_path, "latest.json");
        assert_eq!(config.artifacts.len(), 2);
        assert_eq!(config.artifacts[0].label.as_deref(), Some("Clean"));
        assert_eq!(config.artifacts[1].label, None);
        assert_eq!(config.folders, vec!["EXM".to_string()]);
        assert_eq!(config.cache.root, PathBuf::from("/tmp/launchpad-cache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_urls() {
        let config = LaunchpadConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(
            config.source.raw_base_url(),
            "https://raw.githubusercontent.com/someone/tools/main"
        );
        assert_eq!(
            config.source.contents_api_url(),
            "https://api.github.com/repos/someone/tools/contents"
        );
    }

    #[test]
    fn test_base_overrides_trim_slash() {
        let mut source = SourceConfig::default();
        source.raw_base = Some("http://127.0.0.1:9000/raw/".to_string());
        source.api_base = Some("http://127.0.0.1:9000/api/".to_string());
        assert_eq!(source.raw_base_url(), "http://127.0.0.1:9000/raw");
        assert_eq!(source.contents_api_url(), "http://127.0.0.1:9000/api");
    }

    #[test]
    fn test_default_requires_source() {
        let config = LaunchpadConfig::default();
        assert!(matches!(config.validate(), Err(LaunchpadError::Config(_))));
    }

    #[test]
    fn test_zero_poll_attempts_rejected() {
        let mut config = LaunchpadConfig::from_toml(SAMPLE).unwrap();
        config.update.poll_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_agent_path_must_name_a_file() {
        let mut config = LaunchpadConfig::from_toml(SAMPLE).unwrap();
        for bad in ["", "   ", "tools/", "tools/.."] {
            config.update.agent_path = bad.to_string();
            match config.validate() {
                Err(LaunchpadError::Config(msg)) => assert!(msg.contains("agent_path"), "{}", msg),
                other => panic!("'{}' accepted: {:?}", bad, other),
            }
        }
        config.update.agent_path = "tools/launchpad-swap".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let update = UpdateConfig::default();
        assert_eq!(update.poll_attempts, 30);
        assert_eq!(update.poll_interval(), Duration::from_secs(1));
        assert!(update.agent_path.starts_with("launchpad-swap"));

        let net = NetworkConfig::default();
        assert_eq!(net.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(net.manifest_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = LaunchpadConfig::from_toml("artifacts = 3").unwrap_err();
        assert!(matches!(err, LaunchpadError::Config(_)));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(LaunchpadConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();
        let config = LaunchpadConfig::load(Some(&path)).unwrap();
        assert_eq!(config.source.owner, "someone");
    }
}
