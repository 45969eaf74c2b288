//! Logging setup for applications embedding the console.
//!
//! Installs a `tracing` subscriber with an [`EnvFilter`] read from `RUST_LOG`,
//! falling back to the given default directive.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{ConsoleError, Result};

/// Install the global subscriber. Fails instead of panicking when one is already set.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| ConsoleError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| ConsoleError::Logging(e.to_string()))
}
