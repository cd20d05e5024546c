//! Task submission
//!
//! Independent fire-and-forget jobs: run one artifact, sync everything, run
//! the auto commands. Each `submit_*` returns a join handle; nothing here
//! depends on a UI loop.

use crate::cache::{ArtifactCache, ProgressSink, SyncReport};
use crate::catalog::Catalog;
use crate::error::{LaunchpadError, Result};
use crate::runner::{run_auto_commands, ExecutionReport, Executor};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub type TaskHandle<T> = JoinHandle<Result<T>>;

#[derive(Clone)]
pub struct TaskQueue {
    catalog: Arc<Catalog>,
    cache: Arc<ArtifactCache>,
    executor: Arc<dyn Executor>,
}

impl TaskQueue {
    pub fn new(catalog: Arc<Catalog>, cache: Arc<ArtifactCache>, executor: Arc<dyn Executor>) -> Self {
        Self {
            catalog,
            cache,
            executor,
        }
    }

    /// Make sure the artifact is cached, then run it
    pub fn submit(&self, artifact_id: &str) -> TaskHandle<ExecutionReport> {
        let catalog = Arc::clone(&self.catalog);
        let cache = Arc::clone(&self.cache);
        let executor = Arc::clone(&self.executor);
        let id = artifact_id.to_string();

        tokio::spawn(async move {
            let entry = catalog
                .find(&id)
                .cloned()
                .ok_or_else(|| LaunchpadError::Catalog(format!("unknown artifact '{}'", id)))?;

            let path = cache.ensure_local(&entry).await?;
            info!("Running {}", entry.local_name);

            tokio::task::spawn_blocking(move || executor.execute(&path))
                .await
                .map_err(|e| LaunchpadError::Task(e.to_string()))?
        })
    }

    /// Bulk sync of the catalog plus discovered folder contents
    pub fn submit_sync(&self, folders: Vec<String>, sink: Arc<dyn ProgressSink>) -> TaskHandle<SyncReport> {
        let catalog = Arc::clone(&self.catalog);
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            Ok(cache
                .discover_and_sync(&catalog, &folders, sink.as_ref())
                .await)
        })
    }

    pub fn submit_auto_commands(&self, commands: Vec<String>) -> TaskHandle<Vec<ExecutionReport>> {
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            tokio::task::spawn_blocking(move || run_auto_commands(executor.as_ref(), &commands))
                .await
                .map_err(|e| LaunchpadError::Task(e.to_string()))
        })
    }
}
