//! Distance-indexed position history per car.
//!
//! Every car gets an [`EntityHistory`]: the session time at which it passed each
//! cumulative distance, sampled once per snapshot. Answering "when was this car
//! at distance `d`?" is a binary search plus a linear interpolation, which is
//! what the gap calculator builds on.
//!
//! Histories are trimmed to a little more than one lap, and cleared when the car
//! teleports backwards (back to the pits) or its lap count drops (session
//! restart).

mod store;

pub use store::HistoryStore;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Tunables for history recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Backwards jump in meters treated as a teleport
    pub teleport_threshold: f64,
    /// Laps of history kept behind the newest point
    pub retention_laps: f64,
    /// Initial capacity per car; about four minutes at 60Hz
    pub capacity_hint: usize,
    /// Segments shorter than this (meters) are not interpolated
    pub noise_epsilon: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { teleport_threshold: 50.0, retention_laps: 1.2, capacity_hint: 15_000, noise_epsilon: 1e-3 }
    }
}

/// A car passed `distance` meters (cumulative) at `time` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub distance: f64,
    pub time: f64,
}

/// Why a history was emptied before recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// Lap count went down
    LapReset,
    /// Distance jumped backwards past the teleport threshold
    Teleport,
}

/// What [`EntityHistory::record`] did with a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub cleared: Option<ClearReason>,
    pub appended: bool,
}

/// Position history of one car.
///
/// Points are strictly increasing in distance. `last_known_distance` tracks the
/// newest appended point; `last_known_time` the newest sample of any kind.
#[derive(Debug, Clone)]
pub struct EntityHistory {
    points: VecDeque<HistoryPoint>,
    last_lap: Option<i32>,
    last_known_distance: f64,
    last_known_time: f64,
    config: HistoryConfig,
}

impl Default for EntityHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl EntityHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            points: VecDeque::with_capacity(config.capacity_hint),
            last_lap: None,
            last_known_distance: 0.0,
            last_known_time: 0.0,
            config,
        }
    }

    /// Record one sample.
    ///
    /// In order: clear on a lap reset or a teleport, prune points older than the
    /// retention window, then append if the car moved forward. Recording the same
    /// sample twice changes nothing but `last_known_time`. A sample with a
    /// non-finite distance or time is ignored and leaves the history untouched.
    pub fn record(
        &mut self,
        total_distance: f64,
        session_time: f64,
        lap_number: i32,
        track_length: f64,
    ) -> RecordOutcome {
        if !total_distance.is_finite() || !session_time.is_finite() {
            return RecordOutcome { cleared: None, appended: false };
        }

        let cleared = self.clear_reason(total_distance, lap_number);
        if cleared.is_some() {
            self.points.clear();
        }
        self.last_lap = Some(lap_number);

        if track_length > 0.0 {
            self.prune_before(total_distance - track_length * self.config.retention_laps);
        }

        let appended = self.points.back().is_none_or(|last| total_distance > last.distance);
        if appended {
            self.points.push_back(HistoryPoint { distance: total_distance, time: session_time });
            self.last_known_distance = total_distance;
        }
        self.last_known_time = session_time;

        RecordOutcome { cleared, appended }
    }

    fn clear_reason(&self, total_distance: f64, lap_number: i32) -> Option<ClearReason> {
        if self.last_lap.is_some_and(|last| lap_number < last) {
            return Some(ClearReason::LapReset);
        }
        match self.points.back() {
            Some(last) if total_distance < last.distance - self.config.teleport_threshold => {
                Some(ClearReason::Teleport)
            }
            _ => None,
        }
    }

    /// Drop points at or before `threshold`, keeping the newest of them as an
    /// interpolation anchor. Nothing is dropped until some point is past it.
    fn prune_before(&mut self, threshold: f64) {
        let first_inside = self.points.partition_point(|p| p.distance <= threshold);
        if first_inside == self.points.len() {
            return;
        }
        let remove = first_inside.saturating_sub(1);
        if remove > 0 {
            self.points.drain(..remove);
        }
    }

    /// Session time at which the car passed `distance`, linearly interpolated.
    ///
    /// `None` with fewer than two points, outside the recorded range, or at the
    /// newest point (there is no segment after it).
    pub fn time_at_distance(&self, distance: f64) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }
        // Last index with point.distance <= distance
        let index = self.points.partition_point(|p| p.distance <= distance).checked_sub(1)?;
        if index + 1 >= self.points.len() {
            return None;
        }

        let lower = self.points[index];
        let upper = self.points[index + 1];
        let span = upper.distance - lower.distance;
        if span < self.config.noise_epsilon {
            return Some(lower.time);
        }
        let fraction = (distance - lower.distance) / span;
        Some(lower.time + fraction * (upper.time - lower.time))
    }

    pub fn last_known_distance(&self) -> f64 {
        self.last_known_distance
    }

    pub fn last_known_time(&self) -> f64 {
        self.last_known_time
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<HistoryPoint> {
        self.points.front().copied()
    }

    pub fn last(&self) -> Option<HistoryPoint> {
        self.points.back().copied()
    }
}
