//! Log output for applications embedding the engine.

use crate::{Result, TelemetryError};
use tracing_subscriber::EnvFilter;

/// Fallback when neither a filter nor `RUST_LOG` is given
pub const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber.
///
/// `filter` uses `EnvFilter` directives (`slipstream=debug,info`). Without one,
/// `RUST_LOG` is used, then [`DEFAULT_FILTER`]. Fails if the directives do not
/// parse or a global subscriber is already installed.
pub fn init(filter: Option<&str>) -> Result<()> {
    let filter = build_filter(filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TelemetryError::config_error("logging", e.to_string()))
}

fn build_filter(filter: Option<&str>) -> Result<EnvFilter> {
    match filter {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| TelemetryError::config_error("log filter", e.to_string())),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}
