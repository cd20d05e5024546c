// Build script for launchpadctl - embeds the running version at compile time

fn main() {
    // Release builds set LAUNCHPAD_VERSION; otherwise fall back to Cargo.toml
    let version = std::env::var("LAUNCHPAD_VERSION")
        .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    // Compared against the update manifest at startup
    println!("cargo:rustc-env=LAUNCHPAD_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=LAUNCHPAD_VERSION");
}
