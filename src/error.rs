//! Error types for snapshot ingestion and derived telemetry.
//!
//! Only two kinds of failure ever leave this crate as errors:
//!
//! - **Startup failures**: a UDP port that cannot be bound, a configuration file
//!   that does not parse, a static snapshot layout that does not verify.
//! - **Decode failures**: returned by [`decode`](crate::snapshot::decode) for callers
//!   that decode buffers themselves.
//!
//! Everything else (a shared memory region that is not there yet, a short read, a
//! socket hiccup, a malformed frame) is retried or dropped inside the feed and only
//! shows up in logs and [`FeedStats`](crate::FeedStats). "No data yet" answers such as
//! an unknown car are sentinels (`0.0` seconds, `None`), never errors.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use slipstream::TelemetryError;
//!
//! let error = TelemetryError::region_unavailable("$Slipstream");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Reasons a raw buffer could not be turned into a [`Snapshot`](crate::Snapshot).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("snapshot buffer is {found} bytes, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("snapshot layout rejected: {reason}")]
    InvalidLayout { reason: String },
}

impl DecodeError {
    pub(crate) fn invalid_layout(reason: impl Into<String>) -> Self {
        DecodeError::InvalidLayout { reason: reason.into() }
    }
}

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Shared memory region '{name}' is not available")]
    RegionUnavailable {
        name: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to bind UDP socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Static snapshot layout is invalid: {reason}")]
    Layout { reason: String },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Feed is already {state}")]
    FeedState { state: &'static str },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::RegionUnavailable { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Io { .. } => true,
            TelemetryError::Bind { .. } => false,
            TelemetryError::Decode(_) => false,
            TelemetryError::Layout { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::FeedState { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::RegionUnavailable { .. } => vec![
                "Start the simulator and load a session",
                "Check the configured shared memory name",
                "Use the network feed with a relay when the simulator runs on another machine",
            ],
            TelemetryError::Bind { .. } => vec![
                "Check that no other process is listening on the port",
                "Pick a different port in the network configuration",
                "Check firewall rules for inbound UDP",
            ],
            TelemetryError::Decode(_) => vec![
                "Verify the publisher and this library agree on the snapshot version",
                "Check that the relay forwards whole snapshots",
            ],
            TelemetryError::Layout { .. } => vec![
                "Rebuild against a consistent snapshot layout table",
                "Report the failing field offsets",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Remove unknown keys or fix value types",
            ],
            TelemetryError::Io { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::FeedState { .. } => vec![
                "Create a new feed instead of restarting a stopped one",
                "Call start() only once per feed",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the stop timeout",
                "Keep subscriber callbacks short so the feed task can exit",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify the simulator is running under the same user session",
            ],
        }
    }

    /// Helper constructor for a region that could not be opened yet.
    pub fn region_unavailable(name: impl Into<String>) -> Self {
        TelemetryError::RegionUnavailable { name: name.into(), source: None }
    }

    /// Helper constructor for a region that could not be opened, with cause.
    pub fn region_unavailable_with_source(
        name: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::RegionUnavailable { name: name.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for static layout errors.
    pub fn layout_error(reason: impl Into<String>) -> Self {
        TelemetryError::Layout { reason: reason.into() }
    }

    /// Helper constructor for I/O errors with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TelemetryError::Io { path: path.into(), source }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
