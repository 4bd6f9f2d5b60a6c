//! Ego-relative radar view.
//!
//! Every car is placed in the local frame of the reference car (the player):
//! `x` is lateral (negative = left), `z` is longitudinal (positive = ahead). A
//! car is "close" on one side when it is more beside than in front or behind,
//! or within one car length fore/aft.

use crate::snapshot::{EntityState, SlotId, Snapshot, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 3×3 rotation matrix, row major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix([[f64; 3]; 3]);

impl RotationMatrix {
    pub const IDENTITY: RotationMatrix =
        RotationMatrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// World-to-local rotation for a car with the given Euler orientation
    /// (pitch, yaw, roll in radians). The angles are negated and composed in
    /// intrinsic X, Y, Z order.
    pub fn from_euler(euler: Vector3) -> Self {
        let (s1, c1) = (-f64::from(euler.x)).sin_cos();
        let (s2, c2) = (-f64::from(euler.y)).sin_cos();
        let (s3, c3) = (-f64::from(euler.z)).sin_cos();

        RotationMatrix([
            [c2 * c3, -c2 * s3, s2],
            [c1 * s3 + c3 * s1 * s2, c1 * c3 - s1 * s2 * s3, -c2 * s1],
            [s1 * s3 - c1 * c3 * s2, c3 * s1 + c1 * s2 * s3, c1 * c2],
        ])
    }

    pub fn rotate(&self, v: Vector3) -> Vector3 {
        let (x, y, z) = (f64::from(v.x), f64::from(v.y), f64::from(v.z));
        let m = &self.0;
        Vector3 {
            x: (m[0][0] * x + m[0][1] * y + m[0][2] * z) as f32,
            y: (m[1][0] * x + m[1][1] * y + m[1][2] * z) as f32,
            z: (m[2][0] * x + m[2][1] * y + m[2][2] * z) as f32,
        }
    }
}

/// One car on the radar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarEntry {
    pub slot_id: SlotId,
    /// Position in the reference car's frame; zero for the reference car
    pub relative_position: Vector3,
    /// Orientation difference (other − reference)
    pub relative_orientation: Vector3,
    /// Planar distance, ignoring height
    pub distance: f64,
    /// Relative heading in radians
    pub yaw: f64,
    pub car_length: f32,
    pub car_width: f32,
    pub close_left: bool,
    pub close_right: bool,
    pub is_self: bool,
}

/// Radar view for one snapshot. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RadarFrame {
    pub entries: BTreeMap<SlotId, RadarEntry>,
    /// Distance to the nearest other car, if any
    pub closest_distance: Option<f64>,
    pub close_left: bool,
    pub close_right: bool,
    /// Session time of the snapshot this frame was computed from
    pub sim_time: f64,
}

impl RadarFrame {
    /// Compute the radar around the player's car.
    ///
    /// Returns an empty frame when the player's slot is not in the snapshot.
    pub fn compute(snapshot: &Snapshot) -> Self {
        match snapshot.player() {
            Some(reference) => Self::around(snapshot, reference),
            None => RadarFrame { sim_time: snapshot.sim_time, ..RadarFrame::default() },
        }
    }

    /// Compute the radar around an arbitrary reference car.
    pub fn around(snapshot: &Snapshot, reference: &EntityState) -> Self {
        let rotation = RotationMatrix::from_euler(reference.orientation);
        let mut frame = RadarFrame { sim_time: snapshot.sim_time, ..RadarFrame::default() };

        for other in snapshot.entities.iter().filter(|e| e.slot_id >= 0) {
            let entry = if other.slot_id == reference.slot_id {
                RadarEntry {
                    slot_id: other.slot_id,
                    relative_position: Vector3::ZERO,
                    relative_orientation: Vector3::ZERO,
                    distance: 0.0,
                    yaw: 0.0,
                    car_length: other.car_length,
                    car_width: other.car_width,
                    close_left: false,
                    close_right: false,
                    is_self: true,
                }
            } else {
                let entry = relative_entry(&rotation, reference, other);
                frame.closest_distance = Some(match frame.closest_distance {
                    Some(closest) => closest.min(entry.distance),
                    None => entry.distance,
                });
                frame.close_left |= entry.close_left;
                frame.close_right |= entry.close_right;
                entry
            };
            frame.entries.insert(entry.slot_id, entry);
        }

        frame
    }

    pub fn entry(&self, slot_id: SlotId) -> Option<&RadarEntry> {
        self.entries.get(&slot_id)
    }

    /// Every car except the reference.
    pub fn others(&self) -> impl Iterator<Item = &RadarEntry> {
        self.entries.values().filter(|e| !e.is_self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn relative_entry(rotation: &RotationMatrix, reference: &EntityState, other: &EntityState) -> RadarEntry {
    let rotated = rotation.rotate(other.position - reference.position);
    // The rotation yields a mirrored lateral axis
    let relative_position = Vector3 { x: -rotated.x, ..rotated };
    let relative_orientation = other.orientation - reference.orientation;

    let lateral = f64::from(relative_position.x);
    let forward = f64::from(relative_position.z);
    let close = is_car_close(forward, lateral, f64::from(other.car_length));

    RadarEntry {
        slot_id: other.slot_id,
        relative_position,
        relative_orientation,
        distance: lateral.hypot(forward),
        yaw: f64::from(relative_orientation.y),
        car_length: other.car_length,
        car_width: other.car_width,
        close_left: close && lateral < 0.0,
        close_right: close && lateral > 0.0,
        is_self: false,
    }
}

/// Whether a car at (`forward`, `lateral`) overlaps the reference car's flank:
/// more beside than ahead/behind, or within one car length fore/aft.
pub fn is_car_close(forward: f64, lateral: f64, length: f64) -> bool {
    forward.abs() < lateral.abs() || forward.abs() <= length
}

/// Angle (radians) of an on-screen pointer towards a car at local (`x`, `z`),
/// `distance` away. Measured from the longitudinal axis; positive for
/// ahead-right and behind-left.
pub fn pointer_rotation(distance: f64, x: f64, z: f64) -> f64 {
    if !(distance > 0.0) {
        return 0.0;
    }
    let angle = (z.abs() / distance).min(1.0).acos();
    if (x > 0.0 && z < 0.0) || (x < 0.0 && z > 0.0) { -angle } else { angle }
}
