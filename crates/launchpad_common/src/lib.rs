//! Launchpad Common - artifact cache and self-update core
//!
//! Keeps a local cache of files hosted in a source repository, runs them on
//! demand, and replaces the running binary with a newer build through a
//! separate swap agent process.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod integrity;
pub mod logging;
pub mod manifest;
pub mod platform;
pub mod replacement;
pub mod runner;
pub mod tasks;

pub use cache::{ArtifactCache, ProgressSink, SyncReport};
pub use catalog::{ArtifactEntry, Catalog};
pub use config::LaunchpadConfig;
pub use coordinator::{UpdateCoordinator, UpdateOutcome, UpdateStage};
pub use error::{ErrorKind, LaunchpadError, Result};
pub use fetcher::RemoteFetcher;
pub use manifest::Manifest;
pub use platform::{NativePlatform, Platform};
pub use replacement::{ReplacementPlan, SwapAgent, SwapError};
pub use runner::{ExecutionReport, Executor, ShellExecutor};
pub use tasks::TaskQueue;
