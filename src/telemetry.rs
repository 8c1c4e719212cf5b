//! Tracing initialization shared by both binaries.
//!
//! Deliberately plain: the control plane emits structured `tracing` events
//! and leaves human-readable log styling to an external collector.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
