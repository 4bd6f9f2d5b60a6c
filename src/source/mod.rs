//! Snapshot sources.
//!
//! A [`Transport`] produces raw snapshot buffers: [`LocalMemoryTransport`] polls
//! the simulator's shared memory region, [`NetworkTransport`] receives datagrams
//! from a relay. A [`Feed`] owns one transport and runs it on a background task,
//! fingerprinting every buffer, dropping repeats and malformed frames, and
//! publishing decoded [`SnapshotPacket`]s to callbacks and streams.

mod feed;
mod local;
mod network;
mod region;

pub use feed::Feed;
pub use local::LocalMemoryTransport;
pub use network::NetworkTransport;

use crate::Result;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// Default source rate assumed when a transport does not know its own
pub const DEFAULT_SOURCE_HZ: f64 = 60.0;

/// Trait for raw snapshot producers
///
/// Transports handle their own timing and transient failures (a region that is
/// not there yet, a short read, a socket hiccup) internally and only return once
/// they have a buffer.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Get the next raw buffer
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - A buffer was read; it may still be malformed
    /// - `Ok(None)` - The transport ended (normal termination)
    /// - `Err(e)` - Error occurred; the feed backs off and calls again
    async fn next_buffer(&mut self) -> Result<Option<Vec<u8>>>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;

    /// Expected publish rate in Hz, used to normalize stream throttling
    fn source_hz(&self) -> f64 {
        DEFAULT_SOURCE_HZ
    }
}

/// One published snapshot together with the bytes it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPacket {
    /// 1 for the first published snapshot of a feed, then increasing by one
    pub sequence: u64,
    /// FNV-1a fingerprint of `raw`
    pub fingerprint: u64,
    pub raw: Vec<u8>,
    pub snapshot: Snapshot,
}

/// Feed counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedStats {
    /// Snapshots decoded and delivered to subscribers
    pub published: u64,
    /// Buffers identical to the last published one
    pub duplicates: u64,
    /// Buffers that failed to decode
    pub malformed: u64,
    /// Errors returned by the transport
    pub transport_errors: u64,
}
