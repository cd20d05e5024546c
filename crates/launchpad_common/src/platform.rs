//! Platform seam for binary replacement
//!
//! The only OS-specific pieces of the self-update: lock probing, replacing a
//! file in place, marking it executable and starting a detached process.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub trait Platform: Send + Sync {
    /// True while the file cannot be renamed in place (still running)
    fn is_locked(&self, path: &Path) -> bool;

    /// Move `from` to `to`, replacing `to`
    fn atomic_replace(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn make_executable(&self, path: &Path) -> io::Result<()>;

    /// Start `program` without waiting for it
    ///
    /// The child shares stdout and stderr with the caller so its log lines
    /// stay visible after the caller exits; stdin is closed.
    fn spawn_detached(&self, program: &Path, args: &[OsString]) -> io::Result<()>;
}

/// Staging name used when a plain rename is not possible
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".staging");
    target.with_file_name(name)
}

/// Real filesystem and process implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;

impl Platform for NativePlatform {
    fn is_locked(&self, path: &Path) -> bool {
        fs::rename(path, path).is_err()
    }

    fn atomic_replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        let rename_err = match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        debug!(
            "rename {} -> {} failed ({}), copying through staging",
            from.display(),
            to.display(),
            rename_err
        );

        // Copy next to the target, then rename last so the target is only
        // ever the old file or the complete new one.
        let staging = staging_path(to);
        if let Err(e) = fs::copy(from, &staging) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        if let Err(e) = fs::rename(&staging, to) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        if let Err(e) = fs::remove_file(from) {
            warn!("Could not remove {} after copy: {}", from.display(), e);
        }
        Ok(())
    }

    #[cfg(unix)]
    fn make_executable(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
    }

    #[cfg(not(unix))]
    fn make_executable(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn spawn_detached(&self, program: &Path, args: &[OsString]) -> io::Result<()> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn()?;
        debug!("Spawned {} (pid {})", program.display(), child.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/opt/app/launchpadctl")),
            PathBuf::from("/opt/app/launchpadctl.staging")
        );
    }

    #[test]
    fn test_replace_overwrites_target() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("new.bin");
        let to = dir.path().join("app.bin");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        NativePlatform.atomic_replace(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"new");
        assert!(!from.exists());
        assert!(!staging_path(&to).exists());
    }

    #[test]
    fn test_replace_missing_source_leaves_target() {
        let dir = tempfile::tempdir().unwrap();
        let to = dir.path().join("app.bin");
        fs::write(&to, b"old").unwrap();

        assert!(NativePlatform
            .atomic_replace(&dir.path().join("absent"), &to)
            .is_err());
        assert_eq!(fs::read(&to).unwrap(), b"old");
        assert!(!staging_path(&to).exists());
    }

    #[test]
    fn test_missing_file_counts_as_locked() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NativePlatform.is_locked(&dir.path().join("absent")));
    }

    #[cfg(unix)]
    #[test]
    fn test_unlocked_on_unix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.bin");
        fs::write(&path, b"x").unwrap();
        let _open = fs::File::open(&path).unwrap();
        assert!(!NativePlatform.is_locked(&path));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_detached_does_not_wait() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let args = vec![
            OsString::from("-c"),
            OsString::from(format!("sleep 1; touch '{}'", marker.display())),
        ];

        let started = std::time::Instant::now();
        NativePlatform.spawn_detached(Path::new("sh"), &args).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(900));
        assert!(!marker.exists());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while !marker.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        NativePlatform.make_executable(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
