//! Discrete session events derived from consecutive snapshots.

use crate::snapshot::{SessionPhase, SessionType, Snapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Light count once the start is given.
const GREEN_LIGHTS: i32 = 6;

/// How the race was started, known once the pre-start phase is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartKind {
    /// Formation lap
    Rolling,
    /// Countdown on the grid
    Standing,
}

/// Something changed between two published snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// New session type, or the simulation clock went backwards (restart).
    /// Every car history is cleared before this is delivered.
    SessionTypeChanged { session_type: SessionType },
    /// `start_position` is the player's place when the phase turns green.
    SessionPhaseChanged {
        phase: SessionPhase,
        start: Option<StartKind>,
        start_position: Option<i32>,
    },
    /// The player completed a lap; `lap` is the completed lap count.
    NewLap { lap: i32 },
    PositionChanged { place: i32 },
    TrackChanged { track_id: i32, name: String },
    CarChanged { car_id: i32, name: String },
    /// Start lights changed while the start is pending: formation, countdown,
    /// or green until all lights have been seen.
    StartLightsChanged { lights: i32 },
}

/// Remembers the last seen values and reports the changes.
#[derive(Debug, Clone)]
pub(crate) struct SessionTracker {
    last_ticks: Option<i32>,
    session_type: Option<SessionType>,
    phase: Option<SessionPhase>,
    start: Option<StartKind>,
    last_lap: i32,
    place: i32,
    track_id: i32,
    car_id: i32,
    watching_lights: bool,
    start_lights: i32,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self {
            last_ticks: None,
            session_type: None,
            phase: None,
            start: None,
            last_lap: 0,
            place: 0,
            track_id: 0,
            car_id: 0,
            watching_lights: false,
            start_lights: -1,
        }
    }
}

impl SessionTracker {
    /// Compare `snapshot` with the previous one, in event order.
    pub(crate) fn observe(&mut self, snapshot: &Snapshot) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        let restarted = self.last_ticks.is_some_and(|ticks| snapshot.sim_ticks < ticks);
        if self.session_type != Some(snapshot.session_type) || restarted {
            self.session_type = Some(snapshot.session_type);
            self.last_lap = -1;
            info!(session_type = ?snapshot.session_type, restarted, "Session changed");
            events.push(SessionEvent::SessionTypeChanged { session_type: snapshot.session_type });
        }
        self.last_ticks = Some(snapshot.sim_ticks);

        if self.phase != Some(snapshot.session_phase) {
            let phase = snapshot.session_phase;
            self.phase = Some(phase);
            self.place = snapshot.player_place;
            match phase {
                SessionPhase::Formation => self.start = Some(StartKind::Rolling),
                SessionPhase::Countdown => self.start = Some(StartKind::Standing),
                _ => {}
            }
            let start_position = (phase == SessionPhase::Green).then_some(snapshot.player_place);
            info!(?phase, start = ?self.start, ?start_position, "Session phase changed");
            events.push(SessionEvent::SessionPhaseChanged { phase, start: self.start, start_position });
        }

        self.observe_start_lights(snapshot, &mut events);

        if snapshot.player_completed_laps != self.last_lap {
            self.last_lap = snapshot.player_completed_laps;
            if self.last_lap > 0 {
                info!(lap = self.last_lap + 1, "Starting lap");
                events.push(SessionEvent::NewLap { lap: self.last_lap });
            }
        }

        if snapshot.player_place != self.place {
            self.place = snapshot.player_place;
            info!(place = self.place, "Player position changed");
            events.push(SessionEvent::PositionChanged { place: self.place });
        }

        if snapshot.track_id != self.track_id && snapshot.track_id > 0 {
            self.track_id = snapshot.track_id;
            info!(track_id = self.track_id, name = %snapshot.track_name, "Track changed");
            events.push(SessionEvent::TrackChanged {
                track_id: self.track_id,
                name: snapshot.track_name.clone(),
            });
        }

        if snapshot.car_model_id != self.car_id && snapshot.car_model_id > 0 {
            self.car_id = snapshot.car_model_id;
            info!(car_id = self.car_id, name = %snapshot.car_name, "Car changed");
            events.push(SessionEvent::CarChanged { car_id: self.car_id, name: snapshot.car_name.clone() });
        }

        events
    }

    fn observe_start_lights(&mut self, snapshot: &Snapshot, events: &mut Vec<SessionEvent>) {
        let watching = match snapshot.session_phase {
            SessionPhase::Formation | SessionPhase::Countdown => true,
            SessionPhase::Green => self.start_lights < GREEN_LIGHTS,
            _ => false,
        };
        if watching != self.watching_lights {
            self.watching_lights = watching;
            debug!(watching, "Start light tracking changed");
            if watching {
                self.start_lights = -1;
            }
        }

        if self.watching_lights && snapshot.start_lights != self.start_lights {
            self.start_lights = snapshot.start_lights;
            debug!(lights = self.start_lights, "Start lights changed");
            events.push(SessionEvent::StartLightsChanged { lights: self.start_lights });
        }
    }
}
