//! Time gaps between two cars on a circular track.
//!
//! The gap between a subject and a target is "how long ago was the car in front
//! at the spot the car behind occupies now". Which car is in front is decided on
//! the circle (shortest arc), not by total distance, so a lapped car right
//! behind the leader on track gets a small gap rather than a lap's worth.

use crate::history::EntityHistory;

/// Seconds the subject trails the target.
///
/// Positive: the target is ahead on track and the subject reaches the target's
/// position this many seconds later. Negative: the subject is ahead. `0.0` when
/// the track length is unknown or the car ahead has no history covering the
/// other car's position.
///
/// An exact half-lap separation counts as "subject ahead".
pub fn relative_gap(subject: &EntityHistory, target: &EntityHistory, track_length: f64) -> f64 {
    if !(track_length > 0.0) {
        return 0.0;
    }

    let subject_distance = subject.last_known_distance();
    let target_distance = target.last_known_distance();
    let subject_lap_pos = subject_distance.rem_euclid(track_length);
    let target_lap_pos = target_distance.rem_euclid(track_length);

    let ahead_by = (target_lap_pos - subject_lap_pos).rem_euclid(track_length);
    if ahead_by < track_length / 2.0 {
        // Target ahead: when did it pass the subject's current spot?
        target
            .time_at_distance(target_distance - ahead_by)
            .map_or(0.0, |then| target.last_known_time() - then)
    } else {
        // Subject ahead: when did it pass the target's current spot?
        let behind_by = (subject_lap_pos - target_lap_pos).rem_euclid(track_length);
        subject
            .time_at_distance(subject_distance - behind_by)
            .map_or(0.0, |then| -(subject.last_known_time() - then))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LAP: f64 = 1000.0;
    const SPEED: f64 = 50.0;

    /// Car driving at constant speed from `from` to `to` (cumulative meters),
    /// starting at `start_time`.
    fn car(from: f64, to: f64, start_time: f64) -> EntityHistory {
        let mut history = EntityHistory::default();
        let mut distance = from;
        while distance <= to + 1e-9 {
            let laps = (distance / LAP).floor() as i32;
            history.record(distance, start_time + (distance - from) / SPEED, laps, LAP);
            distance += 10.0;
        }
        history
    }

    #[test]
    fn gap_across_the_start_finish_line() {
        // Target 100m ahead but already on the next lap
        let subject = car(800.0, 950.0, 0.0);
        let target = car(900.0, 1050.0, 0.0);

        assert!((relative_gap(&subject, &target, LAP) - 2.0).abs() < 1e-9);
        assert!((relative_gap(&target, &subject, LAP) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn lapped_car_directly_behind_gets_a_small_gap() {
        // Leader one lap up, 100m ahead on track
        let subject = car(1800.0, 1950.0, 0.0);
        let target = car(2900.0, 3050.0, 0.0);
        assert!((relative_gap(&subject, &target, LAP) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_track_length_gives_zero() {
        let subject = car(0.0, 100.0, 0.0);
        let target = car(50.0, 150.0, 0.0);
        assert_eq!(relative_gap(&subject, &target, 0.0), 0.0);
        assert_eq!(relative_gap(&subject, &target, -5.0), 0.0);
        assert_eq!(relative_gap(&subject, &target, f64::NAN), 0.0);
    }

    #[test]
    fn missing_history_gives_zero() {
        // Target only just started recording, subject's spot is behind its history
        let subject = car(100.0, 200.0, 0.0);
        let target = car(290.0, 300.0, 0.0);
        assert_eq!(relative_gap(&subject, &target, LAP), 0.0);
    }

    #[test]
    fn half_lap_tie_counts_as_subject_ahead() {
        // 500m apart either way; subject history covers the target's spot
        let subject = car(0.0, 700.0, 0.0);
        let target = car(100.0, 200.0, 0.0);
        let gap = relative_gap(&subject, &target, LAP);
        assert!((gap + 10.0).abs() < 1e-9, "gap was {gap}");
    }

    #[test]
    fn half_lap_tie_looks_up_the_subject_history() {
        // Only the target covers the other car's spot, so the tie finds nothing
        let subject = car(0.0, 200.0, 0.0);
        let target = car(100.0, 700.0, 0.0);
        assert_eq!(relative_gap(&subject, &target, LAP), 0.0);
    }

    proptest! {
        #[test]
        fn gap_sign_follows_track_order(offset in 20.0f64..400.0, base in 200.0f64..2000.0) {
            let subject = car(base - 600.0, base, 0.0);
            let target = car(base - 600.0 + offset, base + offset, 0.0);
            let forward = relative_gap(&subject, &target, LAP);
            let backward = relative_gap(&target, &subject, LAP);
            prop_assert!(forward > 0.0);
            prop_assert!(backward < 0.0);
        }
    }
}
