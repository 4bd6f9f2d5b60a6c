//! Live time gaps and proximity radar for sim-racing telemetry.
//!
//! Slipstream reads the simulator's fixed-layout world snapshot (every car's
//! position, distance and lap count) either straight from shared memory or from
//! a UDP relay, and derives:
//!
//! - **Time gaps** between any two cars: how many seconds ago the car ahead was
//!   where the car behind is now, across the start/finish line and for lapped
//!   cars.
//! - **Radar**: every car in the local frame of the player's car, with
//!   left/right proximity flags.
//! - **Session events**: new lap, session and phase changes, position, track
//!   and car changes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use slipstream::{Config, Slipstream, TelemetrySession, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> slipstream::Result<()> {
//!     let config = Config::default();
//!     let feed = Slipstream::local(&config);
//!     let session = TelemetrySession::attach(&feed, &config);
//!     feed.start()?;
//!
//!     let mut radar = Box::pin(session.radar_updates(UpdateRate::Max(10)));
//!     while let Some(frame) = radar.next().await {
//!         if frame.close_left || frame.close_right {
//!             println!("car alongside");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
mod observer;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub mod config;
pub mod fingerprint;
pub mod logging;
pub mod snapshot;
pub mod stream;

// Snapshot sources
pub mod relay;
pub mod source;

// Derived views
pub mod gap;
pub mod history;
pub mod radar;
pub mod relative;
pub mod session;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use config::Config;
pub use error::*;
pub use observer::Subscription;
pub use snapshot::{EntityState, SessionPhase, SessionType, SlotId, Snapshot};
pub use stream::UpdateRate;

// Main API exports
pub use history::{EntityHistory, HistoryStore};
pub use radar::{RadarEntry, RadarFrame};
pub use relative::RelativeRow;
pub use relay::Relay;
pub use session::{SessionEvent, TelemetrySession};
pub use source::{Feed, FeedStats, LocalMemoryTransport, NetworkTransport, SnapshotPacket, Transport};

/// Unified entry point for snapshot feeds.
///
/// Both constructors return an idle [`Feed`]; call [`Feed::start`] once
/// subscribers and sessions are attached.
///
/// ## Shared memory (simulator PC)
/// ```rust,no_run
/// use slipstream::{Config, Slipstream};
///
/// # #[tokio::main]
/// # async fn main() -> slipstream::Result<()> {
/// let feed = Slipstream::local(&Config::default());
/// feed.start()?;
/// # Ok(())
/// # }
/// ```
///
/// ## UDP (second machine)
/// ```rust,no_run
/// use slipstream::{Config, Slipstream};
///
/// # #[tokio::main]
/// # async fn main() -> slipstream::Result<()> {
/// let feed = Slipstream::network(&Config::default()).await?;
/// feed.start()?;
/// # Ok(())
/// # }
/// ```
pub struct Slipstream;

impl Slipstream {
    /// Feed polling the simulator's shared memory region.
    ///
    /// Never fails: a missing region is retried on every poll until the
    /// simulator creates it.
    pub fn local(config: &Config) -> Feed {
        Feed::new(LocalMemoryTransport::new(&config.local), &config.feed)
    }

    /// Feed receiving relayed snapshots over UDP.
    ///
    /// # Errors
    ///
    /// [`TelemetryError::Bind`] when the configured address cannot be bound.
    pub async fn network(config: &Config) -> Result<Feed> {
        let transport = NetworkTransport::bind(&config.network).await?;
        Ok(Feed::new(transport, &config.feed))
    }

    /// Load a YAML config file.
    pub fn load_config(path: impl AsRef<std::path::Path>) -> Result<Config> {
        Config::load(path)
    }
}
