//! Replacement agent
//!
//! Runs in its own process. Waits until the old binary is no longer held,
//! moves it to `<old>.bak`, moves the new binary into its place and starts
//! it again. If installing the new binary fails the backup is moved back.

use crate::platform::Platform;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_ATTEMPTS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Paths handed from the coordinator to the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPlan {
    pub old_binary_path: PathBuf,
    pub new_binary_temp_path: PathBuf,
}

impl ReplacementPlan {
    pub fn new(old_binary_path: impl Into<PathBuf>, new_binary_temp_path: impl Into<PathBuf>) -> Self {
        Self {
            old_binary_path: old_binary_path.into(),
            new_binary_temp_path: new_binary_temp_path.into(),
        }
    }

    /// `<old>.bak`; only one backup is kept
    pub fn backup_path(&self) -> PathBuf {
        let mut path = self.old_binary_path.clone().into_os_string();
        path.push(".bak");
        PathBuf::from(path)
    }

    /// Command line for the agent: old path, then new path
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            self.old_binary_path.clone().into_os_string(),
            self.new_binary_temp_path.clone().into_os_string(),
        ]
    }
}

/// Swap step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    BackupOld,
    InstallNew,
    SetPermissions,
}

impl SwapStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackupOld => "back up old binary",
            Self::InstallNew => "install new binary",
            Self::SetPermissions => "set permissions",
        }
    }
}

impl std::fmt::Display for SwapStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("{} does not exist", path.display())]
    MissingBinary { path: PathBuf },

    #[error("{} is still in use after {attempts} attempts", path.display())]
    StillLocked { path: PathBuf, attempts: u32 },

    #[error("Could not {step}: {source}")]
    Filesystem {
        step: SwapStep,
        #[source]
        source: io::Error,
    },

    #[error("Could not {step} ({source}) and restoring the backup failed: {rollback}")]
    RollbackFailed {
        step: SwapStep,
        source: io::Error,
        rollback: io::Error,
    },

    #[error("Relaunch of {} failed: {source}", path.display())]
    Relaunch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SwapError {
    /// Whether the old binary was left untouched
    pub fn old_binary_untouched(&self) -> bool {
        matches!(
            self,
            Self::MissingBinary { .. }
                | Self::StillLocked { .. }
                | Self::Filesystem {
                    step: SwapStep::BackupOld,
                    ..
                }
        )
    }
}

pub struct SwapAgent {
    plan: ReplacementPlan,
    platform: Arc<dyn Platform>,
    attempts: u32,
    interval: Duration,
}

impl SwapAgent {
    pub fn new(plan: ReplacementPlan, platform: Arc<dyn Platform>) -> Self {
        Self {
            plan,
            platform,
            attempts: DEFAULT_POLL_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.interval = interval;
        self
    }

    pub fn plan(&self) -> &ReplacementPlan {
        &self.plan
    }

    /// Full protocol: preflight, wait, swap, relaunch
    pub fn run(&self) -> Result<(), SwapError> {
        self.preflight()?;
        self.wait_for_release()?;
        self.swap()?;
        self.relaunch()
    }

    fn preflight(&self) -> Result<(), SwapError> {
        for path in [&self.plan.old_binary_path, &self.plan.new_binary_temp_path] {
            if !path.exists() {
                return Err(SwapError::MissingBinary { path: path.clone() });
            }
        }
        Ok(())
    }

    /// Poll until the old binary can be renamed in place
    pub fn wait_for_release(&self) -> Result<(), SwapError> {
        let old = &self.plan.old_binary_path;
        info!("Waiting for {} to be released", old.display());

        for attempt in 1..=self.attempts {
            if !self.platform.is_locked(old) {
                debug!("Released after {} attempt(s)", attempt);
                return Ok(());
            }
            debug!("Attempt {}/{}: still in use", attempt, self.attempts);
            if attempt < self.attempts {
                thread::sleep(self.interval);
            }
        }

        Err(SwapError::StillLocked {
            path: old.clone(),
            attempts: self.attempts,
        })
    }

    fn swap(&self) -> Result<(), SwapError> {
        let old = &self.plan.old_binary_path;
        let new = &self.plan.new_binary_temp_path;
        let backup = self.plan.backup_path();

        if backup.exists() {
            if let Err(e) = std::fs::remove_file(&backup) {
                warn!("Could not remove previous backup {}: {}", backup.display(), e);
            }
        }

        self.platform
            .atomic_replace(old, &backup)
            .map_err(|source| SwapError::Filesystem {
                step: SwapStep::BackupOld,
                source,
            })?;
        info!("Backed up {} to {}", old.display(), backup.display());

        if let Err(source) = self.platform.atomic_replace(new, old) {
            error!("Installing {} failed: {}", new.display(), source);
            return match self.restore_backup(&backup, old) {
                Ok(()) => Err(SwapError::Filesystem {
                    step: SwapStep::InstallNew,
                    source,
                }),
                Err(rollback) => Err(SwapError::RollbackFailed {
                    step: SwapStep::InstallNew,
                    source,
                    rollback,
                }),
            };
        }

        self.platform
            .make_executable(old)
            .map_err(|source| SwapError::Filesystem {
                step: SwapStep::SetPermissions,
                source,
            })?;

        info!("Installed new binary at {}", old.display());
        Ok(())
    }

    fn restore_backup(&self, backup: &Path, old: &Path) -> io::Result<()> {
        warn!("Restoring {} from backup", old.display());
        self.platform.atomic_replace(backup, old)
    }

    fn relaunch(&self) -> Result<(), SwapError> {
        let old = &self.plan.old_binary_path;
        info!("Relaunching {}", old.display());
        self.platform
            .spawn_detached(old, &[])
            .map_err(|source| SwapError::Relaunch {
                path: old.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NativePlatform;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Reports the old binary as locked for the first `locked_polls` probes
    struct ScriptedPlatform {
        locked_polls: u32,
        polls: AtomicU32,
        fail_install_from: Option<PathBuf>,
        spawned: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedPlatform {
        fn new(locked_polls: u32) -> Self {
            Self {
                locked_polls,
                polls: AtomicU32::new(0),
                fail_install_from: None,
                spawned: Mutex::new(Vec::new()),
            }
        }
    }

    impl Platform for ScriptedPlatform {
        fn is_locked(&self, _path: &Path) -> bool {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            n < self.locked_polls
        }

        fn atomic_replace(&self, from: &Path, to: &Path) -> io::Result<()> {
            if self.fail_install_from.as_deref() == Some(from) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            NativePlatform.atomic_replace(from, to)
        }

        fn make_executable(&self, path: &Path) -> io::Result<()> {
            NativePlatform.make_executable(path)
        }

        fn spawn_detached(&self, program: &Path, _args: &[OsString]) -> io::Result<()> {
            self.spawned.lock().unwrap().push(program.to_path_buf());
            Ok(())
        }
    }

    fn fixture() -> (tempfile::TempDir, ReplacementPlan) {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("app");
        let new = dir.path().join("app.download");
        fs::write(&old, b"old build").unwrap();
        fs::write(&new, b"new build").unwrap();
        (dir, ReplacementPlan::new(old, new))
    }

    #[test]
    fn test_backup_path_and_args() {
        let plan = ReplacementPlan::new("/opt/app/launchpadctl", "/tmp/x.new");
        assert_eq!(plan.backup_path(), PathBuf::from("/opt/app/launchpadctl.bak"));
        assert_eq!(
            plan.to_args(),
            vec![OsString::from("/opt/app/launchpadctl"), OsString::from("/tmp/x.new")]
        );
    }

    #[test]
    fn test_swap_after_release() {
        let (_dir, plan) = fixture();
        let platform = Arc::new(ScriptedPlatform::new(3));
        let agent = SwapAgent::new(plan.clone(), platform.clone())
            .with_poll(30, Duration::from_millis(1));

        agent.run().unwrap();

        assert_eq!(platform.polls.load(Ordering::SeqCst), 4);
        assert_eq!(fs::read(&plan.old_binary_path).unwrap(), b"new build");
        assert_eq!(fs::read(plan.backup_path()).unwrap(), b"old build");
        assert!(!plan.new_binary_temp_path.exists());
        assert_eq!(*platform.spawned.lock().unwrap(), vec![plan.old_binary_path.clone()]);
    }

    #[test]
    fn test_never_released_touches_nothing() {
        let (_dir, plan) = fixture();
        let platform = Arc::new(ScriptedPlatform::new(u32::MAX));
        let agent = SwapAgent::new(plan.clone(), platform.clone())
            .with_poll(5, Duration::from_millis(1));

        let err = agent.run().unwrap_err();
        assert!(matches!(err, SwapError::StillLocked { attempts: 5, .. }));
        assert!(err.old_binary_untouched());
        assert_eq!(platform.polls.load(Ordering::SeqCst), 5);
        assert_eq!(fs::read(&plan.old_binary_path).unwrap(), b"old build");
        assert_eq!(fs::read(&plan.new_binary_temp_path).unwrap(), b"new build");
        assert!(!plan.backup_path().exists());
        assert!(platform.spawned.lock().unwrap().is_empty());
    }

    #[test]
    fn test_previous_backup_replaced() {
        let (_dir, plan) = fixture();
        fs::write(plan.backup_path(), b"ancient build").unwrap();
        let agent = SwapAgent::new(plan.clone(), Arc::new(ScriptedPlatform::new(0)))
            .with_poll(1, Duration::from_millis(1));

        agent.run().unwrap();
        assert_eq!(fs::read(plan.backup_path()).unwrap(), b"old build");
    }

    #[test]
    fn test_missing_new_binary() {
        let (_dir, plan) = fixture();
        fs::remove_file(&plan.new_binary_temp_path).unwrap();
        let platform = Arc::new(ScriptedPlatform::new(0));
        let agent = SwapAgent::new(plan.clone(), platform.clone());

        let err = agent.run().unwrap_err();
        assert!(matches!(err, SwapError::MissingBinary { .. }));
        assert_eq!(platform.polls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read(&plan.old_binary_path).unwrap(), b"old build");
    }

    #[test]
    fn test_install_failure_restores_backup() {
        let (_dir, plan) = fixture();
        let mut scripted = ScriptedPlatform::new(0);
        scripted.fail_install_from = Some(plan.new_binary_temp_path.clone());
        let platform = Arc::new(scripted);
        let agent = SwapAgent::new(plan.clone(), platform.clone())
            .with_poll(1, Duration::from_millis(1));

        let err = agent.run().unwrap_err();
        assert!(matches!(
            err,
            SwapError::Filesystem {
                step: SwapStep::InstallNew,
                ..
            }
        ));
        assert_eq!(fs::read(&plan.old_binary_path).unwrap(), b"old build");
        assert!(!plan.backup_path().exists());
        assert!(platform.spawned.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_new_binary_made_executable() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, plan) = fixture();
        fs::set_permissions(&plan.new_binary_temp_path, fs::Permissions::from_mode(0o600)).unwrap();
        let agent = SwapAgent::new(plan.clone(), Arc::new(ScriptedPlatform::new(0)));

        agent.run().unwrap();
        let mode = fs::metadata(&plan.old_binary_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
