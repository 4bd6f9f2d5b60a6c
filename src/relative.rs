//! Relative board: the cars physically around the player on track.

use crate::config::RelativeConfig;
use crate::snapshot::{EntityState, SlotId, Snapshot};
use serde::{Deserialize, Serialize};

/// One row of the relative board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeRow {
    pub slot_id: SlotId,
    pub place: i32,
    pub name: String,
    pub is_player: bool,
    pub in_pitlane: bool,
    /// Completed laps relative to the player
    pub lap_difference: i32,
    /// Meters along the track, positive ahead
    pub distance_gap: f64,
    /// Seconds, negative when the car is ahead of the player; 0 for the player
    pub time_gap: f64,
}

struct Ranked<'a> {
    entity: &'a EntityState,
    /// Circular lap-fraction difference to the player in [-0.5, 0.5]
    diff: f64,
}

/// Build the relative board around the player.
///
/// Cars are ordered by track position, nearest ahead first. Up to half of the
/// other rows go to cars ahead, but only while each one is within
/// `gap_threshold_secs`; the rest go to cars behind. The window slides when
/// there are not enough cars on one side. `gap(subject, target)` is the
/// subject's time gap to the target (see [`crate::gap::relative_gap`]).
///
/// Empty when the player is not in the snapshot or `max_entries` is 0.
pub fn relative_board(
    snapshot: &Snapshot,
    config: &RelativeConfig,
    gap: impl Fn(SlotId, SlotId) -> f64,
) -> Vec<RelativeRow> {
    let Some(player) = snapshot.player() else {
        return Vec::new();
    };
    if config.max_entries == 0 {
        return Vec::new();
    }

    let player_fraction = f64::from(player.lap_distance_fraction);
    let mut ranked: Vec<Ranked<'_>> = snapshot
        .entities
        .iter()
        .filter(|e| e.slot_id >= 0)
        .map(|entity| {
            let mut diff = f64::from(entity.lap_distance_fraction) - player_fraction;
            if diff > 0.5 {
                diff -= 1.0;
            } else if diff < -0.5 {
                diff += 1.0;
            }
            Ranked { entity, diff }
        })
        .collect();
    // Ahead (+) first, then the player (0), then behind (-)
    ranked.sort_by(|a, b| b.diff.total_cmp(&a.diff));

    let Some(player_index) = ranked.iter().position(|r| r.entity.slot_id == player.slot_id) else {
        return Vec::new();
    };

    let others = config.max_entries - 1;
    let ahead = (1..=others / 2)
        .map_while(|i| player_index.checked_sub(i))
        .take_while(|&index| {
            let seconds = gap(player.slot_id, ranked[index].entity.slot_id);
            seconds > 0.0 && seconds <= config.gap_threshold_secs
        })
        .count();
    let behind = others - ahead;

    let last = ranked.len() - 1;
    let mut start = player_index as isize - ahead as isize;
    let mut end = player_index + behind;
    if start < 0 {
        end += start.unsigned_abs();
        start = 0;
    }
    if end > last {
        start -= (end - last) as isize;
        end = last;
    }
    let start = start.max(0) as usize;

    let track_length = f64::from(snapshot.layout_length);
    ranked[start..=end]
        .iter()
        .map(|r| {
            let is_player = r.entity.slot_id == player.slot_id;
            RelativeRow {
                slot_id: r.entity.slot_id,
                place: r.entity.place,
                name: r.entity.name.clone(),
                is_player,
                in_pitlane: r.entity.in_pitlane,
                lap_difference: r.entity.completed_laps - player.completed_laps,
                distance_gap: r.diff * track_length,
                time_gap: if is_player { 0.0 } else { -gap(player.slot_id, r.entity.slot_id) },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SnapshotBuilder;

    const LAP_SECONDS: f64 = 100.0;

    /// Player in slot 0 at mid-lap; other slots at the given fractions.
    fn field(fractions: &[f64]) -> Snapshot {
        let mut builder = SnapshotBuilder::new(1000.0).player(0).car(0, 3, 500.0);
        for (i, &fraction) in fractions.iter().enumerate() {
            builder = builder.car(i as SlotId + 1, 3, (fraction * 1000.0) as f32);
        }
        builder.build()
    }

    /// Gap proportional to track separation, as a car at constant pace would see it
    fn gap_for(snapshot: &Snapshot) -> impl Fn(SlotId, SlotId) -> f64 + '_ {
        move |subject, target| {
            let s = snapshot.entity(subject).map_or(0.0, |e| f64::from(e.lap_distance_fraction));
            let t = snapshot.entity(target).map_or(0.0, |e| f64::from(e.lap_distance_fraction));
            (t - s) * LAP_SECONDS
        }
    }

    fn slots(rows: &[RelativeRow]) -> Vec<SlotId> {
        rows.iter().map(|r| r.slot_id).collect()
    }

    #[test]
    fn splits_rows_around_the_player() {
        let snap = field(&[0.55, 0.58, 0.7, 0.45, 0.4, 0.3]);
        let config = RelativeConfig { max_entries: 5, gap_threshold_secs: 10.0 };
        let rows = relative_board(&snap, &config, gap_for(&snap));

        assert_eq!(slots(&rows), vec![2, 1, 0, 4, 5]);
        assert!(rows[2].is_player);
        assert_eq!(rows[2].time_gap, 0.0);
        assert!((rows[1].time_gap + 5.0).abs() < 1e-3);
        assert!((rows[3].time_gap - 5.0).abs() < 1e-3);
        assert!((rows[0].distance_gap - 80.0).abs() < 1e-2);
    }

    #[test]
    fn far_cars_ahead_hand_their_rows_to_cars_behind() {
        let snap = field(&[0.55, 0.7, 0.45, 0.4, 0.3]);
        let config = RelativeConfig { max_entries: 5, gap_threshold_secs: 10.0 };
        let rows = relative_board(&snap, &config, gap_for(&snap));
        // 0.7 is 20s ahead: only one row ahead
        assert_eq!(slots(&rows), vec![1, 0, 3, 4, 5]);
    }

    #[test]
    fn window_slides_when_nobody_is_behind() {
        let snap = field(&[0.55, 0.58, 0.6, 0.62]);
        let config = RelativeConfig { max_entries: 5, gap_threshold_secs: 10.0 };
        let rows = relative_board(&snap, &config, gap_for(&snap));
        assert_eq!(rows.len(), 5);
        assert_eq!(rows.last().map(|r| r.slot_id), Some(0));
    }

    #[test]
    fn wraps_around_the_start_finish_line() {
        let mut snap = field(&[]);
        snap.entities[0].lap_distance_fraction = 0.98;
        snap = SnapshotBuilder::from(snap).car(1, 4, 20.0).build();
        let config = RelativeConfig { max_entries: 3, gap_threshold_secs: 10.0 };
        let rows = relative_board(&snap, &config, |_, _| 4.0);

        assert_eq!(slots(&rows), vec![1, 0]);
        assert!((rows[0].distance_gap - 40.0).abs() < 1e-2);
        assert_eq!(rows[0].lap_difference, 1);
        assert_eq!(rows[0].time_gap, -4.0);
    }

    #[test]
    fn empty_without_player_or_rows() {
        let snap = field(&[0.4]);
        let zero = RelativeConfig { max_entries: 0, ..RelativeConfig::default() };
        assert!(relative_board(&snap, &zero, |_, _| 0.0).is_empty());

        let mut orphan = snap.clone();
        orphan.player_slot_id = 42;
        assert!(relative_board(&orphan, &RelativeConfig::default(), |_, _| 0.0).is_empty());
    }

    #[test]
    fn single_row_board_is_the_player() {
        let snap = field(&[0.55, 0.45]);
        let config = RelativeConfig { max_entries: 1, gap_threshold_secs: 10.0 };
        let rows = relative_board(&snap, &config, gap_for(&snap));
        assert_eq!(slots(&rows), vec![0]);
    }
}
