//! Histories for every car in the session.

use super::{EntityHistory, HistoryConfig, RecordOutcome};
use crate::gap;
use crate::snapshot::{SlotId, Snapshot};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// One [`EntityHistory`] per visible car, behind a single lock.
///
/// The lock is held only for in-memory work: one snapshot's worth of appends,
/// or one gap lookup.
#[derive(Debug, Default)]
pub struct HistoryStore {
    config: HistoryConfig,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    track_length: f64,
    histories: HashMap<SlotId, EntityHistory>,
}

impl HistoryStore {
    pub fn new(config: HistoryConfig) -> Self {
        Self { config, inner: Mutex::new(Inner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record every car of a snapshot.
    ///
    /// Snapshots without cars or without a usable track length are ignored.
    /// Cars that retired (DNF, DQ, DNS) or no longer appear lose their history.
    /// A car with a non-finite distance keeps its history and skips this sample.
    pub fn ingest(&self, snapshot: &Snapshot) {
        let usable_length = snapshot.layout_length.is_finite() && snapshot.layout_length > 0.0;
        if snapshot.entities.is_empty() || !usable_length {
            trace!("Snapshot without cars or track length, not recorded");
            return;
        }

        let track_length = f64::from(snapshot.layout_length);
        let mut inner = self.lock();
        inner.track_length = track_length;

        let mut visible = HashSet::with_capacity(snapshot.entities.len());
        for entity in snapshot.entities.iter().filter(|e| e.slot_id >= 0) {
            if entity.finish_status.has_left_session() {
                if inner.histories.remove(&entity.slot_id).is_some() {
                    debug!(slot = entity.slot_id, status = ?entity.finish_status, "Car left the session");
                }
                continue;
            }
            visible.insert(entity.slot_id);

            let history = inner
                .histories
                .entry(entity.slot_id)
                .or_insert_with(|| EntityHistory::new(self.config));
            let outcome = history.record(
                entity.total_distance(snapshot.layout_length),
                snapshot.sim_time,
                entity.completed_laps,
                track_length,
            );
            if let RecordOutcome { cleared: Some(reason), .. } = outcome {
                debug!(slot = entity.slot_id, ?reason, "History cleared");
            }
        }

        inner.histories.retain(|slot, _| visible.contains(slot));
    }

    /// Drop every history (new session).
    pub fn clear(&self) {
        let mut inner = self.lock();
        debug!(cars = inner.histories.len(), "Clearing all histories");
        inner.histories.clear();
    }

    /// Seconds `subject` trails `target` on track; see [`gap::relative_gap`].
    ///
    /// `0.0` when either car is unknown or there is not enough history yet.
    pub fn relative_gap(&self, subject: SlotId, target: SlotId) -> f64 {
        let inner = self.lock();
        match (inner.histories.get(&subject), inner.histories.get(&target)) {
            (Some(subject), Some(target)) => gap::relative_gap(subject, target, inner.track_length),
            _ => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().histories.is_empty()
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.lock().histories.contains_key(&slot)
    }

    pub fn track_length(&self) -> f64 {
        self.lock().track_length
    }

    /// Run `f` against one car's history while holding the lock.
    pub fn with_history<R>(&self, slot: SlotId, f: impl FnOnce(&EntityHistory) -> R) -> Option<R> {
        self.lock().histories.get(&slot).map(f)
    }
}
