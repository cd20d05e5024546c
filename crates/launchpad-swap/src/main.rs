//! Launchpad swap agent
//!
//! Started detached by launchpadctl right before it exits. Waits until the
//! old binary is released, moves it to `<old>.bak`, installs the verified
//! download in its place and starts it again.
//!
//! Exit codes: 0 swapped and relaunched, 1 swap failed, 2 bad arguments.

use clap::Parser;
use launchpad_common::replacement::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use launchpad_common::{logging, LaunchpadError, NativePlatform, ReplacementPlan, SwapAgent};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "launchpad-swap")]
#[command(about = "Replace a stopped launchpadctl binary with a verified download", long_about = None)]
#[command(version)]
struct Cli {
    /// Binary to replace
    old_binary: PathBuf,

    /// Verified download to install
    new_binary: PathBuf,

    /// Lock probes before giving up
    #[arg(long, default_value_t = DEFAULT_POLL_ATTEMPTS)]
    poll_attempts: u32,

    /// Delay between lock probes
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,
}

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    logging::init("info");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            let reason = e.to_string();
            let reason = reason.lines().next().unwrap_or_default().to_string();
            error!("{}", LaunchpadError::Usage(reason));
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let plan = ReplacementPlan::new(cli.old_binary, cli.new_binary);
    let agent = SwapAgent::new(plan, Arc::new(NativePlatform))
        .with_poll(cli.poll_attempts, Duration::from_millis(cli.poll_interval_ms));
    info!(
        "Replacing {} with {}",
        agent.plan().old_binary_path.display(),
        agent.plan().new_binary_temp_path.display()
    );

    match agent.run() {
        Ok(()) => {
            info!("Update installed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.old_binary_untouched() {
                error!("Swap abandoned, old binary left in place: {}", e);
            } else {
                error!("Swap failed: {}", e);
            }
            ExitCode::from(EXIT_FAILED)
        }
    }
}
