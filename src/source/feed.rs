//! Feed task: fingerprint, decode and publish snapshots from a transport.

use super::{FeedStats, SnapshotPacket, Transport};
use crate::config::FeedConfig;
use crate::fingerprint::fingerprint;
use crate::observer::{Observers, Subscription};
use crate::snapshot::{self, layout};
use crate::stream::{UpdateRate, watch_updates};
use crate::{Result, TelemetryError};
use futures::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Base delay after a transport error; doubled per consecutive error
const BACKOFF_BASE_MS: u64 = 50;
/// Cap on the doubling exponent (50ms × 2⁵ = 1.6s)
const BACKOFF_MAX_EXPONENT: u32 = 5;

type PacketSlot = Option<Arc<SnapshotPacket>>;

/// A running (or runnable) snapshot source.
///
/// Created idle around a [`Transport`]; [`start`](Feed::start) spawns the task
/// that owns the transport. Every buffer is fingerprinted first and an unchanged
/// buffer is dropped without touching any state; changed buffers are decoded and
/// published to callbacks, the latest-value slot and the update streams.
///
/// ```rust,no_run
/// use slipstream::{Config, Slipstream};
///
/// # #[tokio::main]
/// # async fn main() -> slipstream::Result<()> {
/// let feed = Slipstream::network(&Config::default()).await?;
/// let _sub = feed.subscribe(|packet| println!("tick {}", packet.snapshot.sim_ticks));
/// feed.start()?;
/// // ...
/// feed.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct Feed {
    shared: Arc<Shared>,
    packets: watch::Receiver<PacketSlot>,
    state: Mutex<FeedState>,
    cancel: CancellationToken,
    stop_timeout: Duration,
    source: String,
    source_hz: f64,
}

enum FeedState {
    /// The sender moves into the task; dropping it ends every update stream.
    Idle(Box<dyn Transport>, watch::Sender<PacketSlot>),
    Running(JoinHandle<()>),
    Stopped,
}

/// State the feed task shares with the handle.
struct Shared {
    observers: Arc<Observers<SnapshotPacket>>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    duplicates: AtomicU64,
    malformed: AtomicU64,
    transport_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FeedStats {
        FeedStats {
            published: self.published.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

impl Feed {
    /// Wrap a transport. Nothing runs until [`start`](Feed::start).
    pub fn new(transport: impl Transport, config: &FeedConfig) -> Self {
        let (sender, packets) = watch::channel(None);
        let source = transport.describe();
        let source_hz = transport.source_hz();

        Self {
            shared: Arc::new(Shared {
                observers: Arc::new(Observers::new()),
                counters: Counters::default(),
            }),
            packets,
            state: Mutex::new(FeedState::Idle(Box::new(transport), sender)),
            cancel: CancellationToken::new(),
            stop_timeout: config.stop_timeout(),
            source,
            source_hz,
        }
    }

    /// Spawn the feed task on the current tokio runtime.
    ///
    /// Verifies the static snapshot layout first. A feed runs at most once:
    /// starting a running or stopped feed is an error.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            FeedState::Running(_) => return Err(TelemetryError::FeedState { state: "running" }),
            FeedState::Stopped => return Err(TelemetryError::FeedState { state: "stopped" }),
            FeedState::Idle(..) => {}
        }

        layout::verify()?;

        let FeedState::Idle(transport, sender) = std::mem::replace(&mut *state, FeedState::Stopped)
        else {
            return Err(TelemetryError::FeedState { state: "stopped" });
        };

        info!(source = %self.source, "Starting snapshot feed");
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            feed_task(transport, sender, shared, cancel).await;
        });
        *state = FeedState::Running(handle);
        Ok(())
    }

    /// Stop the feed task.
    ///
    /// Safe while a read is in flight. Waits up to the configured stop timeout
    /// for the task to exit, then aborts it and reports [`TelemetryError::Timeout`].
    /// Stopping an idle or already stopped feed is a no-op.
    pub async fn stop(&self) -> Result<()> {
        self.cancel.cancel();
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, FeedState::Stopped)
        };

        let FeedState::Running(mut handle) = previous else {
            return Ok(());
        };

        match tokio::time::timeout(self.stop_timeout, &mut handle).await {
            Ok(Ok(())) => {
                info!(source = %self.source, "Snapshot feed stopped");
                Ok(())
            }
            Ok(Err(join_error)) => {
                error!(source = %self.source, "Feed task failed: {}", join_error);
                Ok(())
            }
            Err(_) => {
                warn!(source = %self.source, timeout = ?self.stop_timeout, "Feed task did not stop in time, aborting");
                handle.abort();
                Err(TelemetryError::Timeout { duration: self.stop_timeout })
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            &*self.state.lock().unwrap_or_else(PoisonError::into_inner),
            FeedState::Running(handle) if !handle.is_finished()
        )
    }

    /// Register a callback for every published snapshot.
    ///
    /// Callbacks run on the feed task, in registration order, and must not block.
    pub fn subscribe(&self, callback: impl Fn(&SnapshotPacket) + Send + Sync + 'static) -> Subscription {
        self.shared.observers.subscribe(callback)
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> Option<Arc<SnapshotPacket>> {
        self.packets.borrow().clone()
    }

    /// Stream of published snapshots with latest-value semantics.
    ///
    /// A slow consumer skips snapshots rather than queueing them. The stream
    /// ends once the feed task has exited (or the feed is dropped unstarted).
    pub fn updates(&self) -> impl Stream<Item = Arc<SnapshotPacket>> + Send + 'static {
        self.updates_at(UpdateRate::Native)
    }

    /// Like [`updates`](Feed::updates), throttled to `rate`.
    pub fn updates_at(&self, rate: UpdateRate) -> impl Stream<Item = Arc<SnapshotPacket>> + Send + 'static {
        watch_updates(self.packets.clone(), rate, self.source_hz)
    }

    pub fn stats(&self) -> FeedStats {
        self.shared.counters.snapshot()
    }

    /// Transport description, e.g. `udp 0.0.0.0:10110`
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.shared.observers.len()
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        debug!(source = %self.source, "Dropping feed");
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("source", &self.source)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}

fn backoff(consecutive_errors: u32) -> Duration {
    let exponent = consecutive_errors.saturating_sub(1).min(BACKOFF_MAX_EXPONENT);
    Duration::from_millis(BACKOFF_BASE_MS << exponent)
}

async fn feed_task(
    mut transport: Box<dyn Transport>,
    sender: watch::Sender<PacketSlot>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    info!(source = %transport.describe(), "Feed task started");
    let counters = &shared.counters;
    let mut last_fingerprint: Option<u64> = None;
    let mut sequence = 0u64;
    let mut consecutive_errors = 0u32;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Feed cancelled during read");
                break;
            }
            result = transport.next_buffer() => result,
        };

        match result {
            Ok(Some(raw)) => {
                consecutive_errors = 0;
                let fingerprint = fingerprint(&raw);
                if last_fingerprint == Some(fingerprint) {
                    Counters::bump(&counters.duplicates);
                    trace!(fingerprint, "Unchanged snapshot suppressed");
                    continue;
                }

                let snapshot = match snapshot::decode(&raw) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        Counters::bump(&counters.malformed);
                        debug!(len = raw.len(), "Dropping malformed snapshot: {}", e);
                        continue;
                    }
                };

                sequence += 1;
                last_fingerprint = Some(fingerprint);
                trace!(sequence, ticks = snapshot.sim_ticks, "Publishing snapshot");

                let packet = Arc::new(SnapshotPacket { sequence, fingerprint, raw, snapshot });
                sender.send_replace(Some(Arc::clone(&packet)));
                Counters::bump(&counters.published);
                shared.observers.notify(&packet);
            }
            Ok(None) => {
                info!("Transport ended after {} snapshots", sequence);
                break;
            }
            Err(e) => {
                consecutive_errors = consecutive_errors.saturating_add(1);
                Counters::bump(&counters.transport_errors);
                let delay = backoff(consecutive_errors);
                warn!(attempt = consecutive_errors, "Transport error, retrying in {:?}: {}", delay, e);

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    // `sender` drops here, ending every update stream
    info!("Feed task ended (published {} snapshots)", sequence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedTransport, SnapshotBuilder};
    use futures::StreamExt;
    use std::sync::atomic::AtomicUsize;

    fn frame(ticks: i32) -> Vec<u8> {
        snapshot::encode(&SnapshotBuilder::new(1000.0).ticks(ticks).car(1, 0, 100.0).build())
    }

    fn counting(feed: &Feed) -> (Arc<AtomicUsize>, Subscription) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = feed.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (calls, sub)
    }

    async fn run_to_end(feed: &Feed) {
        let mut updates = Box::pin(feed.updates());
        feed.start().unwrap();
        while updates.next().await.is_some() {}
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn identical_buffers_publish_once() {
        let feed = Feed::new(ScriptedTransport::frames(vec![frame(1), frame(1)]), &FeedConfig::default());
        let (calls, _sub) = counting(&feed);

        run_to_end(&feed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = feed.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(feed.latest().map(|p| p.sequence), Some(1));
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped_and_counted() {
        let frames = vec![frame(1), vec![0u8; 10], frame(2), frame(1)];
        let feed = Feed::new(ScriptedTransport::frames(frames), &FeedConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = feed.subscribe(move |p| sink.lock().unwrap().push(p.snapshot.sim_ticks));

        run_to_end(&feed).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
        assert_eq!(feed.stats().malformed, 1);
        assert_eq!(feed.stats().published, 3);
    }

    #[tokio::test]
    async fn a_bad_frame_does_not_reset_change_detection() {
        let frames = vec![frame(1), vec![1u8; 3], frame(1)];
        let feed = Feed::new(ScriptedTransport::frames(frames), &FeedConfig::default());
        let (calls, _sub) = counting(&feed);

        run_to_end(&feed).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.stats().duplicates, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_back_off_and_recover() {
        let script = vec![
            Err(TelemetryError::region_unavailable("test")),
            Err(TelemetryError::region_unavailable("test")),
            Ok(Some(frame(5))),
        ];
        let feed = Feed::new(ScriptedTransport::new(script), &FeedConfig::default());
        let started = tokio::time::Instant::now();

        run_to_end(&feed).await;

        assert_eq!(feed.stats().transport_errors, 2);
        assert_eq!(feed.stats().published, 1);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn start_twice_and_restart_are_rejected() {
        let feed = Feed::new(ScriptedTransport::pending(), &FeedConfig::default());
        feed.start().unwrap();
        assert!(feed.is_running());
        assert!(matches!(feed.start(), Err(TelemetryError::FeedState { state: "running" })));

        feed.stop().await.unwrap();
        assert!(!feed.is_running());
        assert!(matches!(feed.start(), Err(TelemetryError::FeedState { state: "stopped" })));
        // Idempotent
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_interrupts_an_in_flight_read() {
        let feed = Feed::new(ScriptedTransport::pending(), &FeedConfig { stop_timeout_ms: 1_000 });
        feed.start().unwrap();
        tokio::time::timeout(Duration::from_millis(500), feed.stop())
            .await
            .expect("stop should not wait for the read")
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_subscription_stops_callbacks() {
        let feed = Feed::new(ScriptedTransport::frames(vec![frame(1)]), &FeedConfig::default());
        let (calls, sub) = counting(&feed);
        assert_eq!(feed.subscriber_count(), 1);
        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);

        run_to_end(&feed).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(50));
        assert_eq!(backoff(2), Duration::from_millis(100));
        assert_eq!(backoff(3), Duration::from_millis(200));
        assert_eq!(backoff(50), Duration::from_millis(1_600));
    }
}
