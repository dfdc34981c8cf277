//! Tracing setup for hosts embedding the engine.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "uam_engine=info";

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG`.
///
/// Returns an error if a global subscriber is already installed, so hosts
/// with their own subscriber can ignore it.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .json()
        .try_init()
}
