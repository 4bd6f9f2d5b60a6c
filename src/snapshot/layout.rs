//! Snapshot wire layout (version 2.0).
//!
//! Packed, little-endian, fixed size. This is slipstream's own image: the
//! simulator's native shared-memory struct is not decoded here, so a region or
//! datagram has to come from a slipstream publisher ([`encode`](super::encode)
//! or a [`Relay`](crate::Relay) fed by one).
//!
//! ```text
//! header (200 bytes)
//!   0   i32       version_major        36  i32  session_type
//!   4   i32       version_minor        40  i32  session_phase
//!   8   i32       game_paused          44  i32  player_slot_id
//!   12  i32       sim_ticks            48  i32  car_model_id
//!   16  f64       sim_time             52  i32  player_place
//!   24  i32       track_id             56  i32  player_completed_laps
//!   28  i32       layout_id            60  i32  num_cars
//!   32  f32       layout_length        64  [u8; 64] track_name
//!                                      128 [u8; 64] car_name
//!                                      192 i32  start_lights
//!                                      196 (reserved)
//! entities: MAX_CARS × 128 bytes starting at 200
//! ```

use crate::{Result, TelemetryError};

pub const VERSION_MAJOR: i32 = 2;
pub const VERSION_MINOR: i32 = 0;

pub const MAX_CARS: usize = 128;
pub const NAME_LEN: usize = 64;

pub const HEADER_SIZE: usize = 200;
pub const ENTITY_SIZE: usize = 128;
pub const SNAPSHOT_SIZE: usize = HEADER_SIZE + MAX_CARS * ENTITY_SIZE;

/// Header field offsets.
pub mod header {
    pub const VERSION_MAJOR: usize = 0;
    pub const VERSION_MINOR: usize = 4;
    pub const GAME_PAUSED: usize = 8;
    pub const SIM_TICKS: usize = 12;
    pub const SIM_TIME: usize = 16;
    pub const TRACK_ID: usize = 24;
    pub const LAYOUT_ID: usize = 28;
    pub const LAYOUT_LENGTH: usize = 32;
    pub const SESSION_TYPE: usize = 36;
    pub const SESSION_PHASE: usize = 40;
    pub const PLAYER_SLOT_ID: usize = 44;
    pub const CAR_MODEL_ID: usize = 48;
    pub const PLAYER_PLACE: usize = 52;
    pub const PLAYER_COMPLETED_LAPS: usize = 56;
    pub const NUM_CARS: usize = 60;
    pub const TRACK_NAME: usize = 64;
    pub const CAR_NAME: usize = 128;
    pub const START_LIGHTS: usize = 192;
}

/// Entity field offsets, relative to the start of one entity record.
pub mod entity {
    pub const SLOT_ID: usize = 0;
    pub const PLACE: usize = 4;
    pub const COMPLETED_LAPS: usize = 8;
    pub const LAP_DISTANCE: usize = 12;
    pub const LAP_DISTANCE_FRACTION: usize = 16;
    pub const POSITION: usize = 20;
    pub const ORIENTATION: usize = 32;
    pub const CAR_LENGTH: usize = 44;
    pub const CAR_WIDTH: usize = 48;
    pub const SPEED: usize = 52;
    pub const FINISH_STATUS: usize = 56;
    pub const IN_PITLANE: usize = 60;
    pub const NAME: usize = 64;
}

/// One named field of the wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub size: usize,
}

const fn field(name: &'static str, offset: usize, size: usize) -> Field {
    Field { name, offset, size }
}

pub const HEADER_FIELDS: &[Field] = &[
    field("version_major", header::VERSION_MAJOR, 4),
    field("version_minor", header::VERSION_MINOR, 4),
    field("game_paused", header::GAME_PAUSED, 4),
    field("sim_ticks", header::SIM_TICKS, 4),
    field("sim_time", header::SIM_TIME, 8),
    field("track_id", header::TRACK_ID, 4),
    field("layout_id", header::LAYOUT_ID, 4),
    field("layout_length", header::LAYOUT_LENGTH, 4),
    field("session_type", header::SESSION_TYPE, 4),
    field("session_phase", header::SESSION_PHASE, 4),
    field("player_slot_id", header::PLAYER_SLOT_ID, 4),
    field("car_model_id", header::CAR_MODEL_ID, 4),
    field("player_place", header::PLAYER_PLACE, 4),
    field("player_completed_laps", header::PLAYER_COMPLETED_LAPS, 4),
    field("num_cars", header::NUM_CARS, 4),
    field("track_name", header::TRACK_NAME, NAME_LEN),
    field("car_name", header::CAR_NAME, NAME_LEN),
    field("start_lights", header::START_LIGHTS, 4),
];

pub const ENTITY_FIELDS: &[Field] = &[
    field("slot_id", entity::SLOT_ID, 4),
    field("place", entity::PLACE, 4),
    field("completed_laps", entity::COMPLETED_LAPS, 4),
    field("lap_distance", entity::LAP_DISTANCE, 4),
    field("lap_distance_fraction", entity::LAP_DISTANCE_FRACTION, 4),
    field("position", entity::POSITION, 12),
    field("orientation", entity::ORIENTATION, 12),
    field("car_length", entity::CAR_LENGTH, 4),
    field("car_width", entity::CAR_WIDTH, 4),
    field("speed", entity::SPEED, 4),
    field("finish_status", entity::FINISH_STATUS, 4),
    field("in_pitlane", entity::IN_PITLANE, 4),
    field("name", entity::NAME, NAME_LEN),
];

/// Offset of entity record `index` from the start of the snapshot.
pub const fn entity_offset(index: usize) -> usize {
    HEADER_SIZE + index * ENTITY_SIZE
}

/// Verify the static layout tables.
///
/// Run once when a feed starts. A failure means the crate was built with an
/// inconsistent table and no frame could ever be decoded correctly.
pub fn verify() -> Result<()> {
    verify_table("header", HEADER_FIELDS, HEADER_SIZE)?;
    verify_table("entity", ENTITY_FIELDS, ENTITY_SIZE)?;

    if entity_offset(MAX_CARS) != SNAPSHOT_SIZE {
        return Err(TelemetryError::layout_error(format!(
            "entity array ends at {} but snapshot size is {}",
            entity_offset(MAX_CARS),
            SNAPSHOT_SIZE
        )));
    }
    Ok(())
}

fn verify_table(context: &str, fields: &[Field], record_size: usize) -> Result<()> {
    let mut end_of_previous = 0usize;
    let mut previous = "<start>";

    for field in fields {
        if field.size == 0 {
            return Err(TelemetryError::layout_error(format!(
                "{context}.{} has zero size",
                field.name
            )));
        }
        if field.offset < end_of_previous {
            return Err(TelemetryError::layout_error(format!(
                "{context}.{} at {} overlaps {context}.{previous} ending at {end_of_previous}",
                field.name, field.offset
            )));
        }
        end_of_previous = field.offset + field.size;
        previous = field.name;
        if end_of_previous > record_size {
            return Err(TelemetryError::layout_error(format!(
                "{context}.{} ends at {end_of_previous}, past the {record_size}-byte record",
                field.name
            )));
        }
    }
    Ok(())
}
