//! Command implementations
//!
//! `App` owns the config and the shared cache; each subcommand is one method.

use crate::progress::BarSink;
use crate::VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use launchpad_common::runner::ExecutionReport;
use launchpad_common::{
    ArtifactCache, ArtifactEntry, Catalog, LaunchpadConfig, NativePlatform, RemoteFetcher,
    ShellExecutor, SyncReport, TaskQueue, UpdateCoordinator, UpdateOutcome,
};
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

pub struct App {
    config: LaunchpadConfig,
    catalog: Arc<Catalog>,
    cache: Arc<ArtifactCache>,
    tasks: TaskQueue,
}

impl App {
    pub fn new(config: LaunchpadConfig) -> Result<Self> {
        let catalog =
            Arc::new(Catalog::from_specs(&config.artifacts).context("Invalid artifact list")?);
        let fetcher = RemoteFetcher::new(&config).context("Failed to build HTTP client")?;
        let cache = Arc::new(ArtifactCache::new(config.cache.root.clone(), fetcher));
        let tasks = TaskQueue::new(
            Arc::clone(&catalog),
            Arc::clone(&cache),
            Arc::new(ShellExecutor),
        );
        Ok(Self {
            config,
            catalog,
            cache,
            tasks,
        })
    }

    pub fn config(&self) -> &LaunchpadConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Check for a newer build; on handoff the process exits here
    pub async fn update_check(&self) -> Result<UpdateOutcome> {
        let current_exe =
            std::env::current_exe().context("Cannot locate the running executable")?;
        let coordinator = UpdateCoordinator::new(
            &self.config,
            ArtifactCache::clone(&self.cache),
            VERSION,
            current_exe,
            Arc::new(NativePlatform),
        )?;
        Ok(coordinator.run_to_exit().await)
    }

    /// Explicit `update` command: same check, with a result line
    pub async fn update(&self) -> Result<()> {
        match self.update_check().await? {
            UpdateOutcome::UpToDate { version } => {
                println!("{} Up to date ({})", "✓".green(), version);
            }
            UpdateOutcome::Aborted { stage, error } => {
                println!(
                    "{} Update stopped before {}: {}",
                    "✗".yellow(),
                    stage.as_str(),
                    error
                );
            }
            // run_to_exit does not return after a handoff
            UpdateOutcome::HandedOff(_) => {}
        }
        Ok(())
    }

    pub async fn sync(&self) -> Result<()> {
        let sink = Arc::new(BarSink::new("Syncing"));
        let report = self
            .tasks
            .submit_sync(self.config.folders.clone(), sink.clone())
            .await
            .context("Sync task did not finish")??;
        sink.finish();
        print_sync_report(&report);
        Ok(())
    }

    pub async fn run(&self, id: &str) -> Result<()> {
        let report = self
            .tasks
            .submit(id)
            .await
            .context("Run task did not finish")?
            .with_context(|| format!("Could not run '{}'", id))?;
        print_execution(&report);
        Ok(())
    }

    pub fn list(&self) {
        if self.catalog.is_empty() {
            println!("No artifacts configured");
            return;
        }
        for entry in self.catalog.entries() {
            let cached_at = self.cache.cached_at(entry);
            let line = status_line(entry, cached_at);
            if cached_at.is_some() {
                println!("{} {}", "●".green(), line);
            } else {
                println!("{} {}", "○".dimmed(), line);
            }
        }
    }

    pub async fn auto(&self) -> Result<()> {
        if self.config.auto_commands.is_empty() {
            println!("No automatic commands configured");
            return Ok(());
        }
        let reports = self
            .tasks
            .submit_auto_commands(self.config.auto_commands.clone())
            .await
            .context("Auto commands task did not finish")??;
        for report in &reports {
            print_execution(report);
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> Result<()> {
        self.cache
            .ensure_root()
            .context("Cannot create the cache folder")?;
        println!("{}", self.cache.root().display());
        Ok(())
    }
}

/// One `list` row without colors: name, repository path and cache state
pub fn status_line(entry: &ArtifactEntry, cached_at: Option<SystemTime>) -> String {
    let state = match cached_at {
        Some(time) => {
            let local: DateTime<Local> = time.into();
            format!("cached {}", local.format("%Y-%m-%d %H:%M"))
        }
        None => "missing".to_string(),
    };
    format!("{:<32} {:<40} {}", entry.display_name(), entry.logical_path, state)
}

fn print_sync_report(report: &SyncReport) {
    println!(
        "{} {}/{} artifacts downloaded",
        if report.is_clean() {
            "✓".green().to_string()
        } else {
            "!".yellow().to_string()
        },
        report.succeeded.len(),
        report.total
    );
    for (entry, reason) in &report.failed {
        println!("  {} {}: {}", "✗".red(), entry.logical_path, reason);
    }
    for (path, reason) in &report.skipped {
        warn!("Not synced: {} ({})", path, reason);
    }
}

fn print_execution(report: &ExecutionReport) {
    if !report.stdout.is_empty() {
        print!("{}", report.stdout);
    }
    if !report.stderr.is_empty() {
        eprint!("{}", report.stderr);
    }
    let code = report
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string());
    if report.success() {
        println!("{} {} (exit {}, {} ms)", "✓".green(), report.target, code, report.duration_ms);
    } else {
        println!("{} {} (exit {}, {} ms)", "✗".red(), report.target, code, report.duration_ms);
    }
}
