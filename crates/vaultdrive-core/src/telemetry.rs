//! Tracing bootstrap
//!
//! Structured logging setup shared by binaries and integration tests. The
//! filter honors `RUST_LOG`, defaulting to `info` for the adapter crates.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vaultdrive_vfs=debug,vaultdrive_events=debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
