//! Artifact runner
//!
//! Invokes a cached artifact by file type and captures what it printed.
//! Exit codes are reported as they are; nothing is reinterpreted.

use crate::error::{LaunchpadError, Result};
use std::path::Path;
use std::process::Command;
use std::time::Instant;
use tracing::{info, warn};

/// Maximum output length kept per stream
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// How an artifact is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// .bat / .cmd through cmd /c
    Batch,
    /// .exe, started directly
    Executable,
    /// .reg through reg import
    Registry,
    /// .sh through sh
    ShellScript,
    Other,
}

impl ArtifactKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "bat" | "cmd" => Self::Batch,
            "exe" => Self::Executable,
            "reg" => Self::Registry,
            "sh" => Self::ShellScript,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Executable => "executable",
            Self::Registry => "registry",
            Self::ShellScript => "shell",
            Self::Other => "other",
        }
    }
}

/// Result of one execution
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// File name or command line
    pub target: String,
    /// None when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Something that can run a cached artifact or a command line
pub trait Executor: Send + Sync {
    fn execute(&self, path: &Path) -> Result<ExecutionReport>;

    fn run_command_line(&self, line: &str) -> Result<ExecutionReport>;
}

/// Build the command for a file by its type
pub fn command_for(path: &Path) -> Command {
    match ArtifactKind::from_path(path) {
        ArtifactKind::Batch => {
            let mut cmd = Command::new("cmd");
            cmd.arg("/c").arg(path);
            cmd
        }
        ArtifactKind::Executable => Command::new(path),
        ArtifactKind::Registry => {
            let mut cmd = Command::new("reg");
            cmd.arg("import").arg(path);
            cmd
        }
        ArtifactKind::ShellScript => {
            let mut cmd = Command::new("sh");
            cmd.arg(path);
            cmd
        }
        ArtifactKind::Other => {
            if cfg!(windows) {
                let mut cmd = Command::new("cmd");
                cmd.arg("/c").arg(path);
                cmd
            } else {
                let mut cmd = Command::new("sh");
                cmd.arg(path);
                cmd
            }
        }
    }
}

/// Platform shell invocation for a command line
pub fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/c").arg(line);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

/// Runs through the real OS
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl Executor for ShellExecutor {
    fn execute(&self, path: &Path) -> Result<ExecutionReport> {
        if !path.exists() {
            return Err(LaunchpadError::filesystem(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            ));
        }
        let target = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        info!(
            "Executing {} as {}",
            target,
            ArtifactKind::from_path(path).as_str()
        );
        capture(target, command_for(path), path)
    }

    fn run_command_line(&self, line: &str) -> Result<ExecutionReport> {
        info!("CMD> {}", line);
        capture(line.to_string(), shell_command(line), Path::new(line))
    }
}

fn capture(target: String, mut cmd: Command, origin: &Path) -> Result<ExecutionReport> {
    let started = Instant::now();
    let output = cmd
        .output()
        .map_err(|e| LaunchpadError::filesystem(origin, e))?;

    let report = ExecutionReport {
        target,
        exit_code: output.status.code(),
        stdout: truncate(&output.stdout),
        stderr: truncate(&output.stderr),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    if !report.success() {
        warn!(
            "{} exited with {:?}: {}",
            report.target,
            report.exit_code,
            report.stderr.trim()
        );
    }
    Ok(report)
}

fn truncate(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[output truncated]", &text[..cut])
}

/// Run each command line in order, continuing past failures
pub fn run_auto_commands(executor: &dyn Executor, commands: &[String]) -> Vec<ExecutionReport> {
    info!("Running {} automatic commands", commands.len());
    let mut reports = Vec::with_capacity(commands.len());
    for line in commands {
        match executor.run_command_line(line) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!("Command '{}' could not start: {}", line, e);
                reports.push(ExecutionReport {
                    target: line.clone(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    duration_ms: 0,
                });
            }
        }
    }
    info!("Automatic commands finished");
    reports
}
