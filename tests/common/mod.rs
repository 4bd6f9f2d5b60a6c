//! Snapshot fixtures built through the public API.

#![allow(dead_code)]

use slipstream::snapshot::{EntityState, FinishStatus, SessionPhase, SessionType, Snapshot};

pub const TRACK_LENGTH: f32 = 1000.0;

pub fn car(slot_id: i32, place: i32, completed_laps: i32, lap_distance: f32) -> EntityState {
    EntityState {
        slot_id,
        place,
        completed_laps,
        lap_distance,
        lap_distance_fraction: lap_distance / TRACK_LENGTH,
        car_length: 4.5,
        car_width: 1.9,
        speed: 50.0,
        finish_status: FinishStatus::None,
        name: format!("Driver {slot_id}"),
        ..EntityState::default()
    }
}

pub fn snapshot(ticks: i32, time: f64, entities: Vec<EntityState>) -> Snapshot {
    let player = entities.first().cloned().unwrap_or_default();
    Snapshot {
        sim_ticks: ticks,
        sim_time: time,
        track_id: 10,
        layout_id: 11,
        layout_length: TRACK_LENGTH,
        session_type: SessionType::Race,
        session_phase: SessionPhase::Green,
        player_slot_id: player.slot_id,
        car_model_id: 20,
        player_place: player.place,
        player_completed_laps: player.completed_laps,
        track_name: "Loop".to_string(),
        car_name: "Coupe".to_string(),
        entities,
        ..Snapshot::default()
    }
}

/// Player (slot 0) chasing slot 1 by 100m at 50 m/s, sampled every 0.2s.
pub fn chase(frame: usize) -> Snapshot {
    let player = 100.0 + 10.0 * frame as f32;
    snapshot(
        frame as i32 + 1,
        frame as f64 * 0.2,
        vec![car(0, 2, 0, player), car(1, 1, 0, player + 100.0)],
    )
}
