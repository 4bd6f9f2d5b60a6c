//! Telemetry session service.
//!
//! A [`TelemetrySession`] hangs off a [`Feed`]: every published snapshot is run
//! through the event tracker, recorded into the history store and turned into a
//! new radar frame. Readers get synchronous accessors (gaps, the latest radar
//! frame, the relative board) plus callbacks and streams for changes.

mod tracker;

pub use tracker::{SessionEvent, StartKind};

use crate::config::{Config, RelativeConfig};
use crate::history::HistoryStore;
use crate::observer::{Observers, Subscription};
use crate::radar::RadarFrame;
use crate::relative::{RelativeRow, relative_board};
use crate::snapshot::{SlotId, Snapshot};
use crate::source::{Feed, SnapshotPacket};
use crate::stream::{UpdateRate, watch_updates};
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tracker::SessionTracker;
use tracing::{debug, trace, warn};

/// Events buffered per stream consumer before it starts skipping
const EVENT_BUFFER: usize = 64;

/// Derived, read-only view of a running feed.
///
/// ```rust,no_run
/// use slipstream::{Config, Slipstream, TelemetrySession, SessionEvent};
///
/// # #[tokio::main]
/// # async fn main() -> slipstream::Result<()> {
/// let config = Config::default();
/// let feed = Slipstream::local(&config);
/// let session = TelemetrySession::attach(&feed, &config);
/// let _laps = session.subscribe(|event| {
///     if let SessionEvent::NewLap { lap } = event {
///         println!("lap {lap} done");
///     }
/// });
/// feed.start()?;
/// # Ok(())
/// # }
/// ```
pub struct TelemetrySession {
    core: Arc<SessionCore>,
    feed_subscription: Subscription,
    source_hz: f64,
}

struct SessionCore {
    histories: HistoryStore,
    tracker: Mutex<SessionTracker>,
    snapshots: watch::Sender<Option<Arc<Snapshot>>>,
    radar: watch::Sender<Option<Arc<RadarFrame>>>,
    observers: Arc<Observers<SessionEvent>>,
    events: broadcast::Sender<SessionEvent>,
    relative: RelativeConfig,
}

impl SessionCore {
    fn on_packet(&self, packet: &SnapshotPacket) {
        let snapshot = &packet.snapshot;
        let events = self.tracker.lock().unwrap_or_else(PoisonError::into_inner).observe(snapshot);

        if events.iter().any(|e| matches!(e, SessionEvent::SessionTypeChanged { .. })) {
            self.histories.clear();
        }
        self.histories.ingest(snapshot);

        let frame = RadarFrame::compute(snapshot);
        trace!(sequence = packet.sequence, cars = frame.len(), "Radar frame updated");
        self.radar.send_replace(Some(Arc::new(frame)));
        self.snapshots.send_replace(Some(Arc::new(snapshot.clone())));

        for event in events {
            self.observers.notify(&event);
            // No stream consumers is fine
            let _ = self.events.send(event);
        }
    }
}

impl TelemetrySession {
    /// Start following `feed`. The feed may already be running.
    pub fn attach(feed: &Feed, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let core = Arc::new(SessionCore {
            histories: HistoryStore::new(config.history),
            tracker: Mutex::new(SessionTracker::default()),
            snapshots: watch::Sender::new(None),
            radar: watch::Sender::new(None),
            observers: Arc::new(Observers::new()),
            events,
            relative: config.relative.clone(),
        });

        let weak: Weak<SessionCore> = Arc::downgrade(&core);
        let feed_subscription = feed.subscribe(move |packet| {
            if let Some(core) = weak.upgrade() {
                core.on_packet(packet);
            }
        });
        debug!(source = feed.source(), "Session attached to feed");

        Self { core, feed_subscription, source_hz: feed.source_hz() }
    }

    /// Stop following the feed. Accessors keep returning the last state.
    pub fn detach(&mut self) {
        self.feed_subscription.unsubscribe();
    }

    /// Register a callback for session events; runs on the feed task.
    pub fn subscribe(&self, callback: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Subscription {
        self.core.observers.subscribe(callback)
    }

    /// Stream of session events from now on.
    ///
    /// A consumer that falls more than a few dozen events behind skips the
    /// oldest ones.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.core.events.subscribe()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(lagged) => {
                    warn!("Session event consumer lagging: {}", lagged);
                    None
                }
            }
        })
    }

    /// Seconds `subject` trails `target`; `0.0` when unknown.
    pub fn relative_gap(&self, subject: SlotId, target: SlotId) -> f64 {
        self.core.histories.relative_gap(subject, target)
    }

    /// Latest radar frame.
    pub fn radar(&self) -> Option<Arc<RadarFrame>> {
        self.core.radar.borrow().clone()
    }

    /// Radar frames, throttled to `rate`.
    pub fn radar_updates(&self, rate: UpdateRate) -> impl Stream<Item = Arc<RadarFrame>> + Send + 'static {
        watch_updates(self.core.radar.subscribe(), rate, self.source_hz)
    }

    /// Latest snapshot seen by the session.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.core.snapshots.borrow().clone()
    }

    /// Relative board around the player with up to `max_entries` rows.
    pub fn relative_board(&self, max_entries: usize) -> Vec<RelativeRow> {
        let Some(snapshot) = self.latest() else {
            return Vec::new();
        };
        let config = RelativeConfig { max_entries, ..self.core.relative.clone() };
        relative_board(&snapshot, &config, |subject, target| self.relative_gap(subject, target))
    }

    /// Relative board with the configured number of rows.
    pub fn relative(&self) -> Vec<RelativeRow> {
        self.relative_board(self.core.relative.max_entries)
    }

    pub fn histories(&self) -> &HistoryStore {
        &self.core.histories
    }
}

impl std::fmt::Debug for TelemetrySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySession")
            .field("cars", &self.core.histories.len())
            .field("attached", &self.feed_subscription.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::snapshot::encode;
    use crate::test_utils::{ScriptedTransport, SnapshotBuilder};
    use std::time::Duration;

    /// Player (slot 0) 100m behind slot 1, both at 50 m/s, for `frames` snapshots.
    fn chase(frames: usize) -> Vec<Vec<u8>> {
        (0..frames)
            .map(|i| {
                let t = i as f64 * 0.2;
                let player = 100.0 + 10.0 * i as f32;
                SnapshotBuilder::new(1000.0)
                    .ticks(i as i32 + 1)
                    .time(t)
                    .player(0)
                    .car(1, 0, player + 100.0)
                    .car(0, 0, player)
                    .build()
            })
            .map(|snapshot| encode(&snapshot))
            .collect()
    }

    async fn run(feed: &Feed) {
        let mut updates = Box::pin(feed.updates());
        feed.start().unwrap();
        while updates.next().await.is_some() {}
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn session_tracks_gaps_radar_and_events() {
        let feed = Feed::new(ScriptedTransport::frames(chase(30)), &FeedConfig::default());
        let session = TelemetrySession::attach(&feed, &Config::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = session.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        run(&feed).await;

        let gap = session.relative_gap(0, 1);
        assert!((gap - 2.0).abs() < 1e-3, "gap was {gap}");
        assert!((session.relative_gap(1, 0) + 2.0).abs() < 1e-3);

        let radar = session.radar().unwrap();
        assert!(radar.entry(0).unwrap().is_self);
        assert_eq!(radar.len(), 2);

        let rows = session.relative();
        assert_eq!(rows.iter().map(|r| r.slot_id).collect::<Vec<_>>(), vec![1, 0]);
        assert!((rows[0].time_gap + 2.0).abs() < 1e-3);

        let events = seen.lock().unwrap();
        assert!(matches!(events[0], SessionEvent::SessionTypeChanged { .. }));
        assert_eq!(session.latest().unwrap().sim_ticks, 30);
    }

    #[tokio::test]
    async fn restart_clears_every_car_and_recording_resumes() {
        let mut frames = chase(10);
        // Clock rewinds while both cars keep moving forward, so only the
        // session reset can empty their histories
        frames.extend((0..3).map(|i| {
            let ahead = 10.0 * i as f32;
            let snapshot = SnapshotBuilder::new(1000.0)
                .ticks(i + 1)
                .time(f64::from(i) * 0.2)
                .player(0)
                .car(1, 0, 400.0 + ahead)
                .car(0, 0, 300.0 + ahead)
                .build();
            encode(&snapshot)
        }));

        let feed = Feed::new(ScriptedTransport::frames(frames), &FeedConfig::default());
        let session = TelemetrySession::attach(&feed, &Config::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = session.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        run(&feed).await;

        let resets = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SessionEvent::SessionTypeChanged { .. }))
            .count();
        assert_eq!(resets, 2);

        let histories = session.histories();
        assert_eq!(histories.len(), 2);
        for (slot, start) in [(0, 300.0), (1, 400.0)] {
            assert_eq!(histories.with_history(slot, |h| h.len()), Some(3));
            assert_eq!(histories.with_history(slot, |h| h.first().map(|p| p.distance)), Some(Some(start)));
        }
        // Nothing from before the restart bridges the 100m between them
        assert_eq!(session.relative_gap(0, 1), 0.0);
    }

    #[tokio::test]
    async fn event_stream_delivers_changes() {
        let feed = Feed::new(ScriptedTransport::frames(chase(3)).then_hang(), &FeedConfig::default());
        let session = TelemetrySession::attach(&feed, &Config::default());
        let mut events = Box::pin(session.events());
        feed.start().unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), events.next()).await.unwrap();
        assert!(matches!(first, Some(SessionEvent::SessionTypeChanged { .. })));
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn detached_session_stops_updating() {
        let feed = Feed::new(ScriptedTransport::frames(chase(5)), &FeedConfig::default());
        let mut session = TelemetrySession::attach(&feed, &Config::default());
        assert_eq!(feed.subscriber_count(), 1);
        session.detach();
        assert_eq!(feed.subscriber_count(), 0);

        run(&feed).await;
        assert!(session.latest().is_none());
        assert!(session.radar().is_none());
        assert!(session.relative_board(7).is_empty());
    }

    #[tokio::test]
    async fn radar_updates_stream_follows_the_feed() {
        let feed = Feed::new(ScriptedTransport::frames(chase(4)), &FeedConfig::default());
        let session = TelemetrySession::attach(&feed, &Config::default());
        let frames = session.radar_updates(UpdateRate::Native);
        run(&feed).await;
        drop(session);

        let collected: Vec<_> = frames.collect().await;
        assert!(!collected.is_empty());
        assert_eq!(collected.last().unwrap().entries.len(), 2);
    }
}
