//! Logging setup shared by the binaries
//!
//! Human-readable lines on stderr. Filter from $LAUNCHPAD_LOG, e.g.
//! `LAUNCHPAD_LOG=debug` or `LAUNCHPAD_LOG=launchpad_common=trace`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "LAUNCHPAD_LOG";

/// Install the global subscriber; a second call is a no-op
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
