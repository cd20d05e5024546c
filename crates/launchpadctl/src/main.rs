//! Launchpad Control - keeps the tool cache current and runs tools from it
//!
//! Every start checks for a newer build of itself first; if one is found it
//! is handed to the swap agent and this process exits.

use anyhow::{Context, Result};
use clap::Parser;
use launchpad_common::{logging, LaunchpadConfig};
use launchpadctl::cli::{Cli, Commands};
use launchpadctl::commands::App;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();

    let config = LaunchpadConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let app = App::new(config)?;
    debug!("launchpadctl {} starting", launchpadctl::VERSION);

    if cli.startup_check(app.config().update.check_on_startup) {
        // The current version keeps running whatever the check reports
        if let Err(e) = app.update_check().await {
            warn!("Update check skipped: {:#}", e);
        }
    }

    match cli.command {
        None | Some(Commands::Sync) => app.sync().await,
        Some(Commands::Run { id }) => app.run(&id).await,
        Some(Commands::List) => {
            app.list();
            Ok(())
        }
        Some(Commands::Auto) => app.auto().await,
        Some(Commands::Update) => app.update().await,
        Some(Commands::CacheDir) => app.cache_dir(),
    }
}
