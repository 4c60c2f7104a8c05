//! Tracing setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `info` when unset or invalid
pub fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global fmt subscriber
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .init();
}
