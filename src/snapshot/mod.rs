//! Typed telemetry snapshots.
//!
//! A [`Snapshot`] is one instant of simulation state as published by the simulator
//! (or forwarded by a relay): session state, track, the player's slot and one
//! [`EntityState`] per visible car. Snapshots are plain values; decoding one never
//! touches any shared state.
//!
//! ## Usage Example
//!
//! ```rust
//! use slipstream::snapshot::{self, EntityState, Snapshot, SNAPSHOT_SIZE};
//!
//! let mut snap = Snapshot::default();
//! snap.layout_length = 3_000.0;
//! snap.entities.push(EntityState { slot_id: 4, completed_laps: 2, lap_distance: 120.0, ..Default::default() });
//!
//! let bytes = snapshot::encode(&snap);
//! assert_eq!(bytes.len(), SNAPSHOT_SIZE);
//!
//! let decoded = snapshot::decode(&bytes).unwrap();
//! assert_eq!(decoded.entities[0].total_distance(decoded.layout_length), 6_120.0);
//! ```

mod codec;
pub mod layout;

pub use codec::{decode, encode};
pub use layout::{MAX_CARS, SNAPSHOT_SIZE};

use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Slot identifier of a car. Stable within a session, may be reused across sessions.
pub type SlotId = i32;

/// Three-component float vector in simulator world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3 { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

/// Session type as published by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionType {
    #[default]
    Unavailable,
    Practice,
    Qualify,
    Race,
    Warmup,
    Unknown(i32),
}

impl SessionType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => SessionType::Unavailable,
            0 => SessionType::Practice,
            1 => SessionType::Qualify,
            2 => SessionType::Race,
            3 => SessionType::Warmup,
            other => SessionType::Unknown(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            SessionType::Unavailable => -1,
            SessionType::Practice => 0,
            SessionType::Qualify => 1,
            SessionType::Race => 2,
            SessionType::Warmup => 3,
            SessionType::Unknown(other) => other,
        }
    }
}

/// Phase within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Unavailable,
    Garage,
    Gridwalk,
    Formation,
    Countdown,
    Green,
    Checkered,
    Unknown(i32),
}

impl SessionPhase {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => SessionPhase::Unavailable,
            1 => SessionPhase::Garage,
            2 => SessionPhase::Gridwalk,
            3 => SessionPhase::Formation,
            4 => SessionPhase::Countdown,
            5 => SessionPhase::Green,
            6 => SessionPhase::Checkered,
            other => SessionPhase::Unknown(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            SessionPhase::Unavailable => -1,
            SessionPhase::Garage => 1,
            SessionPhase::Gridwalk => 2,
            SessionPhase::Formation => 3,
            SessionPhase::Countdown => 4,
            SessionPhase::Green => 5,
            SessionPhase::Checkered => 6,
            SessionPhase::Unknown(other) => other,
        }
    }
}

/// Finish status of one car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FinishStatus {
    #[default]
    Unavailable,
    None,
    Finished,
    Dnf,
    Dnq,
    Dns,
    Dq,
    Unknown(i32),
}

impl FinishStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => FinishStatus::Unavailable,
            0 => FinishStatus::None,
            1 => FinishStatus::Finished,
            2 => FinishStatus::Dnf,
            3 => FinishStatus::Dnq,
            4 => FinishStatus::Dns,
            5 => FinishStatus::Dq,
            other => FinishStatus::Unknown(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            FinishStatus::Unavailable => -1,
            FinishStatus::None => 0,
            FinishStatus::Finished => 1,
            FinishStatus::Dnf => 2,
            FinishStatus::Dnq => 3,
            FinishStatus::Dns => 4,
            FinishStatus::Dq => 5,
            FinishStatus::Unknown(other) => other,
        }
    }

    /// Whether the car has left the session for good (DNF, DQ or DNS).
    pub fn has_left_session(self) -> bool {
        matches!(self, FinishStatus::Dnf | FinishStatus::Dq | FinishStatus::Dns)
    }
}

/// Per-car state inside one snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityState {
    pub slot_id: SlotId,
    pub place: i32,
    pub completed_laps: i32,
    /// Meters travelled from the start/finish line this lap
    pub lap_distance: f32,
    /// Fraction of the lap completed, 0..1
    pub lap_distance_fraction: f32,
    pub position: Vector3,
    /// Euler angles (pitch, yaw, roll) in radians
    pub orientation: Vector3,
    pub car_length: f32,
    pub car_width: f32,
    /// Meters per second
    pub speed: f32,
    pub finish_status: FinishStatus,
    pub in_pitlane: bool,
    pub name: String,
}

impl EntityState {
    /// Cumulative distance: completed laps × track length + lap distance.
    pub fn total_distance(&self, track_length: f32) -> f64 {
        f64::from(self.completed_laps) * f64::from(track_length) + f64::from(self.lap_distance)
    }
}

/// One decoded telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub version_minor: i32,
    pub game_paused: bool,
    pub sim_ticks: i32,
    /// Session clock in seconds
    pub sim_time: f64,
    pub track_id: i32,
    pub layout_id: i32,
    /// Track length in meters; 0 when unknown
    pub layout_length: f32,
    pub session_type: SessionType,
    pub session_phase: SessionPhase,
    pub player_slot_id: SlotId,
    pub car_model_id: i32,
    pub player_place: i32,
    pub player_completed_laps: i32,
    pub track_name: String,
    pub car_name: String,
    /// Start lights lit: -1 unavailable, 0 to 5 during the countdown, 6 green
    pub start_lights: i32,
    pub entities: Vec<EntityState>,
}

impl Snapshot {
    /// Entity with the given slot id, if visible in this snapshot.
    pub fn entity(&self, slot_id: SlotId) -> Option<&EntityState> {
        self.entities.iter().find(|e| e.slot_id == slot_id)
    }

    /// The player's own entity.
    pub fn player(&self) -> Option<&EntityState> {
        self.entity(self.player_slot_id)
    }
}
