//! Launchpadctl library - exposes the CLI pieces for testing

pub mod cli;
pub mod commands;
pub mod progress;

/// Version baked in by build.rs, compared against the update manifest
pub const VERSION: &str = env!("LAUNCHPAD_VERSION");
