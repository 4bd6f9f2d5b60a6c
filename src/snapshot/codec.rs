//! Byte-level snapshot decoder and encoder.

use super::layout::{
    self, ENTITY_SIZE, MAX_CARS, NAME_LEN, SNAPSHOT_SIZE, VERSION_MAJOR, entity, header,
};
use super::{EntityState, FinishStatus, SessionPhase, SessionType, Snapshot, Vector3};
use crate::error::DecodeError;
use tracing::trace;

/// Decode a raw snapshot buffer.
///
/// The buffer must be exactly [`SNAPSHOT_SIZE`] bytes. Only the first `num_cars`
/// entity records are read; the rest of the array is ignored.
pub fn decode(data: &[u8]) -> Result<Snapshot, DecodeError> {
    if data.len() != SNAPSHOT_SIZE {
        return Err(DecodeError::SizeMismatch { expected: SNAPSHOT_SIZE, found: data.len() });
    }

    let version_major = parse_i32_le(data, header::VERSION_MAJOR)?;
    if version_major != VERSION_MAJOR {
        return Err(DecodeError::invalid_layout(format!(
            "unsupported major version {version_major}, expected {VERSION_MAJOR}"
        )));
    }

    let num_cars = parse_i32_le(data, header::NUM_CARS)?;
    let num_cars = usize::try_from(num_cars)
        .ok()
        .filter(|n| *n <= MAX_CARS)
        .ok_or_else(|| {
            DecodeError::invalid_layout(format!("car count {num_cars} outside 0..={MAX_CARS}"))
        })?;

    let layout_length = parse_f32_le(data, header::LAYOUT_LENGTH)?;
    if !layout_length.is_finite() || layout_length < 0.0 {
        return Err(DecodeError::invalid_layout(format!(
            "layout length {layout_length} is not a finite non-negative value"
        )));
    }

    let entities = (0..num_cars)
        .map(|index| {
            let start = layout::entity_offset(index);
            decode_entity(&data[start..start + ENTITY_SIZE])
        })
        .collect::<Result<Vec<_>, _>>()?;

    trace!(num_cars, layout_length, "Decoded snapshot");

    Ok(Snapshot {
        version_minor: parse_i32_le(data, header::VERSION_MINOR)?,
        game_paused: parse_i32_le(data, header::GAME_PAUSED)? != 0,
        sim_ticks: parse_i32_le(data, header::SIM_TICKS)?,
        sim_time: parse_f64_le(data, header::SIM_TIME)?,
        track_id: parse_i32_le(data, header::TRACK_ID)?,
        layout_id: parse_i32_le(data, header::LAYOUT_ID)?,
        layout_length,
        session_type: SessionType::from_raw(parse_i32_le(data, header::SESSION_TYPE)?),
        session_phase: SessionPhase::from_raw(parse_i32_le(data, header::SESSION_PHASE)?),
        player_slot_id: parse_i32_le(data, header::PLAYER_SLOT_ID)?,
        car_model_id: parse_i32_le(data, header::CAR_MODEL_ID)?,
        player_place: parse_i32_le(data, header::PLAYER_PLACE)?,
        player_completed_laps: parse_i32_le(data, header::PLAYER_COMPLETED_LAPS)?,
        track_name: parse_name(data, header::TRACK_NAME)?,
        car_name: parse_name(data, header::CAR_NAME)?,
        start_lights: parse_i32_le(data, header::START_LIGHTS)?,
        entities,
    })
}

fn decode_entity(record: &[u8]) -> Result<EntityState, DecodeError> {
    Ok(EntityState {
        slot_id: parse_i32_le(record, entity::SLOT_ID)?,
        place: parse_i32_le(record, entity::PLACE)?,
        completed_laps: parse_i32_le(record, entity::COMPLETED_LAPS)?,
        lap_distance: parse_f32_le(record, entity::LAP_DISTANCE)?,
        lap_distance_fraction: parse_f32_le(record, entity::LAP_DISTANCE_FRACTION)?,
        position: parse_vector3_le(record, entity::POSITION)?,
        orientation: parse_vector3_le(record, entity::ORIENTATION)?,
        car_length: parse_f32_le(record, entity::CAR_LENGTH)?,
        car_width: parse_f32_le(record, entity::CAR_WIDTH)?,
        speed: parse_f32_le(record, entity::SPEED)?,
        finish_status: FinishStatus::from_raw(parse_i32_le(record, entity::FINISH_STATUS)?),
        in_pitlane: parse_i32_le(record, entity::IN_PITLANE)? != 0,
        name: parse_name(record, entity::NAME)?,
    })
}

/// Encode a snapshot into its exact wire image.
///
/// Entities past [`MAX_CARS`] are dropped and names are truncated to fit their
/// NUL-terminated fields.
pub fn encode(snapshot: &Snapshot) -> Vec<u8> {
    let mut buf = vec![0u8; SNAPSHOT_SIZE];
    let num_cars = snapshot.entities.len().min(MAX_CARS);

    put_i32_le(&mut buf, header::VERSION_MAJOR, VERSION_MAJOR);
    put_i32_le(&mut buf, header::VERSION_MINOR, snapshot.version_minor);
    put_i32_le(&mut buf, header::GAME_PAUSED, i32::from(snapshot.game_paused));
    put_i32_le(&mut buf, header::SIM_TICKS, snapshot.sim_ticks);
    put_bytes(&mut buf, header::SIM_TIME, &snapshot.sim_time.to_le_bytes());
    put_i32_le(&mut buf, header::TRACK_ID, snapshot.track_id);
    put_i32_le(&mut buf, header::LAYOUT_ID, snapshot.layout_id);
    put_f32_le(&mut buf, header::LAYOUT_LENGTH, snapshot.layout_length);
    put_i32_le(&mut buf, header::SESSION_TYPE, snapshot.session_type.raw());
    put_i32_le(&mut buf, header::SESSION_PHASE, snapshot.session_phase.raw());
    put_i32_le(&mut buf, header::PLAYER_SLOT_ID, snapshot.player_slot_id);
    put_i32_le(&mut buf, header::CAR_MODEL_ID, snapshot.car_model_id);
    put_i32_le(&mut buf, header::PLAYER_PLACE, snapshot.player_place);
    put_i32_le(&mut buf, header::PLAYER_COMPLETED_LAPS, snapshot.player_completed_laps);
    // num_cars <= MAX_CARS, always fits
    put_i32_le(&mut buf, header::NUM_CARS, num_cars as i32);
    put_name(&mut buf, header::TRACK_NAME, &snapshot.track_name);
    put_name(&mut buf, header::CAR_NAME, &snapshot.car_name);
    put_i32_le(&mut buf, header::START_LIGHTS, snapshot.start_lights);

    for (index, state) in snapshot.entities.iter().take(num_cars).enumerate() {
        let start = layout::entity_offset(index);
        encode_entity(&mut buf[start..start + ENTITY_SIZE], state);
    }

    buf
}

fn encode_entity(record: &mut [u8], state: &EntityState) {
    put_i32_le(record, entity::SLOT_ID, state.slot_id);
    put_i32_le(record, entity::PLACE, state.place);
    put_i32_le(record, entity::COMPLETED_LAPS, state.completed_laps);
    put_f32_le(record, entity::LAP_DISTANCE, state.lap_distance);
    put_f32_le(record, entity::LAP_DISTANCE_FRACTION, state.lap_distance_fraction);
    put_vector3_le(record, entity::POSITION, state.position);
    put_vector3_le(record, entity::ORIENTATION, state.orientation);
    put_f32_le(record, entity::CAR_LENGTH, state.car_length);
    put_f32_le(record, entity::CAR_WIDTH, state.car_width);
    put_f32_le(record, entity::SPEED, state.speed);
    put_i32_le(record, entity::FINISH_STATUS, state.finish_status.raw());
    put_i32_le(record, entity::IN_PITLANE, i32::from(state.in_pitlane));
    put_name(record, entity::NAME, &state.name);
}

fn field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            DecodeError::invalid_layout(format!(
                "field at offset {offset} needs {N} bytes, record has {}",
                data.len()
            ))
        })
}

fn parse_i32_le(data: &[u8], offset: usize) -> Result<i32, DecodeError> {
    field::<4>(data, offset).map(i32::from_le_bytes)
}

fn parse_f32_le(data: &[u8], offset: usize) -> Result<f32, DecodeError> {
    field::<4>(data, offset).map(f32::from_le_bytes)
}

fn parse_f64_le(data: &[u8], offset: usize) -> Result<f64, DecodeError> {
    field::<8>(data, offset).map(f64::from_le_bytes)
}

fn parse_vector3_le(data: &[u8], offset: usize) -> Result<Vector3, DecodeError> {
    Ok(Vector3 {
        x: parse_f32_le(data, offset)?,
        y: parse_f32_le(data, offset + 4)?,
        z: parse_f32_le(data, offset + 8)?,
    })
}

/// NUL-terminated name field; invalid UTF-8 is replaced rather than rejected.
fn parse_name(data: &[u8], offset: usize) -> Result<String, DecodeError> {
    let raw = field::<NAME_LEN>(data, offset)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn put_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn put_i32_le(buf: &mut [u8], offset: usize, value: i32) {
    put_bytes(buf, offset, &value.to_le_bytes());
}

fn put_f32_le(buf: &mut [u8], offset: usize, value: f32) {
    put_bytes(buf, offset, &value.to_le_bytes());
}

fn put_vector3_le(buf: &mut [u8], offset: usize, value: Vector3) {
    put_f32_le(buf, offset, value.x);
    put_f32_le(buf, offset + 4, value.y);
    put_f32_le(buf, offset + 8, value.z);
}

fn put_name(buf: &mut [u8], offset: usize, name: &str) {
    // Leave room for the terminator and never split a UTF-8 sequence.
    let mut end = name.len().min(NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    put_bytes(buf, offset, &name.as_bytes()[..end]);
}
