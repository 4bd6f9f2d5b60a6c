//! Test utilities: synthetic snapshots and scripted transports
//!
//! Used by unit tests and benchmarks to drive the feed, history and radar code
//! without a running simulator.

use crate::Result;
use crate::snapshot::{
    EntityState, FinishStatus, SessionPhase, SessionType, SlotId, Snapshot, Vector3,
};
use crate::source::Transport;
use std::collections::VecDeque;

/// Fluent builder for [`Snapshot`]s.
///
/// Starts as a green-flag race on a test track with no cars. Cars get a place
/// in insertion order, a lap fraction derived from their lap distance and a
/// 4.5m × 1.9m footprint.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new(track_length: f32) -> Self {
        Self {
            snapshot: Snapshot {
                version_minor: 0,
                game_paused: false,
                sim_ticks: 1,
                sim_time: 0.0,
                track_id: 1_693,
                layout_id: 1_694,
                layout_length: track_length,
                session_type: SessionType::Race,
                session_phase: SessionPhase::Green,
                player_slot_id: 0,
                car_model_id: 4_516,
                player_place: 0,
                player_completed_laps: 0,
                track_name: "Test Ring".to_string(),
                car_name: "Test Car".to_string(),
                start_lights: -1,
                entities: Vec::new(),
            },
        }
    }

    pub fn ticks(mut self, ticks: i32) -> Self {
        self.snapshot.sim_ticks = ticks;
        self
    }

    pub fn time(mut self, seconds: f64) -> Self {
        self.snapshot.sim_time = seconds;
        self
    }

    pub fn player(mut self, slot_id: SlotId) -> Self {
        self.snapshot.player_slot_id = slot_id;
        self
    }

    pub fn session(mut self, session_type: SessionType, phase: SessionPhase) -> Self {
        self.snapshot.session_type = session_type;
        self.snapshot.session_phase = phase;
        self
    }

    pub fn track(mut self, track_id: i32, name: &str) -> Self {
        self.snapshot.track_id = track_id;
        self.snapshot.track_name = name.to_string();
        self
    }

    pub fn car_model(mut self, car_model_id: i32, name: &str) -> Self {
        self.snapshot.car_model_id = car_model_id;
        self.snapshot.car_name = name.to_string();
        self
    }

    pub fn start_lights(mut self, lights: i32) -> Self {
        self.snapshot.start_lights = lights;
        self
    }

    /// Add (or replace) a car at `lap_distance` meters into lap `completed_laps`.
    pub fn car(mut self, slot_id: SlotId, completed_laps: i32, lap_distance: f32) -> Self {
        let track_length = self.snapshot.layout_length;
        let fraction = if track_length > 0.0 { lap_distance / track_length } else { 0.0 };
        let place = match self.snapshot.entities.iter().position(|e| e.slot_id == slot_id) {
            Some(index) => self.snapshot.entities[index].place,
            None => self.snapshot.entities.len() as i32 + 1,
        };
        let entity = EntityState {
            slot_id,
            place,
            completed_laps,
            lap_distance,
            lap_distance_fraction: fraction,
            position: Vector3::ZERO,
            orientation: Vector3::ZERO,
            car_length: 4.5,
            car_width: 1.9,
            speed: 50.0,
            finish_status: FinishStatus::None,
            in_pitlane: false,
            name: format!("Driver {slot_id}"),
        };
        self.snapshot.entities.retain(|e| e.slot_id != slot_id);
        self.snapshot.entities.push(entity);
        self
    }

    /// Edit an already added car.
    pub fn modify(mut self, slot_id: SlotId, edit: impl FnOnce(&mut EntityState)) -> Self {
        if let Some(entity) = self.snapshot.entities.iter_mut().find(|e| e.slot_id == slot_id) {
            edit(entity);
        }
        self
    }

    /// Finish the snapshot; player place and laps are copied from the player's car.
    pub fn build(mut self) -> Snapshot {
        if let Some(player) = self.snapshot.player() {
            let (place, laps) = (player.place, player.completed_laps);
            self.snapshot.player_place = place;
            self.snapshot.player_completed_laps = laps;
        }
        self.snapshot
    }
}

impl From<Snapshot> for SnapshotBuilder {
    fn from(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

/// A grid of `cars` cars spaced 20m apart, all on lap `laps`.
pub fn grid(track_length: f32, cars: i32, laps: i32) -> SnapshotBuilder {
    (0..cars).fold(SnapshotBuilder::new(track_length), |builder, slot| {
        let distance = (track_length - 20.0 * slot as f32).rem_euclid(track_length.max(1.0));
        builder.car(slot, laps, distance)
    })
}

/// Transport replaying a fixed script of results.
///
/// Once the script is exhausted it either ends the feed (`Ok(None)`) or never
/// yields again, to model a quiet live source.
pub struct ScriptedTransport {
    script: VecDeque<Result<Option<Vec<u8>>>>,
    hang_when_done: bool,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Option<Vec<u8>>>>) -> Self {
        Self { script: script.into(), hang_when_done: false }
    }

    /// Deliver each buffer once, then end.
    pub fn frames(frames: Vec<Vec<u8>>) -> Self {
        Self::new(frames.into_iter().map(|f| Ok(Some(f))).collect())
    }

    /// Never deliver anything.
    pub fn pending() -> Self {
        Self { script: VecDeque::new(), hang_when_done: true }
    }

    /// Deliver the script, then stay silent instead of ending.
    pub fn then_hang(mut self) -> Self {
        self.hang_when_done = true;
        self
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn next_buffer(&mut self) -> Result<Option<Vec<u8>>> {
        match self.script.pop_front() {
            Some(step) => step,
            None if self.hang_when_done => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
