use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

use crate::elevator::ElevatorState;
use crate::ladder::LadderState;
use crate::nav::{ElevatorId, LadderId, ObstacleId};
use crate::steering::MovementType;

const MAX_EVENTS: usize = 64;

/// Notable transitions of one agent's locomotion core.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocomotionEvent {
    Stuck { position: Vec3, count: u32 },
    Unstuck { position: Vec3 },
    UnstuckTeleport { to: Vec3 },
    /// Recovery gave up and the agent terminated itself.
    Fatal { position: Vec3, count: u32 },
    LadderStateChanged { ladder: LadderId, from: LadderState, to: LadderState },
    LadderTimedOut { ladder: LadderId, state: LadderState },
    ElevatorStateChanged { elevator: ElevatorId, from: ElevatorState, to: ElevatorState },
    ElevatorTimedOut { elevator: ElevatorId, state: ElevatorState },
    StrafeJumpStarted { midpoint: Vec3, right_side: bool },
    StrafeJumpCompleted,
    StrafeJumpAborted,
    JumpComplete { position: Vec3 },
    CatapultLaunched { velocity: Vec3 },
    ObstacleBreakStarted { obstacle: ObstacleId, timeout: f32 },
    ObstacleBreakFinished { obstacle: ObstacleId, destroyed: bool },
    MovementTypeChanged { movement: MovementType },
}

/// Bounded per-agent event buffer drained by the host.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    pub recent: VecDeque<LocomotionEvent>,
    pub dropped_events: u64,
}

impl EventLog {
    pub fn emit(&mut self, event: LocomotionEvent) {
        self.recent.push_back(event);
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            let first_overflow = self.dropped_events == 0;
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if first_overflow || self.dropped_events % MAX_EVENTS as u64 == 0 {
                warn!(
                    "[Locomotion events] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }

    pub fn drain(&mut self) -> Vec<LocomotionEvent> {
        self.recent.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_tracks_dropped_events() {
        let mut log = EventLog::default();
        for _ in 0..(MAX_EVENTS + 25) {
            log.emit(LocomotionEvent::StrafeJumpAborted);
        }
        assert_eq!(log.recent.len(), MAX_EVENTS);
        assert_eq!(log.dropped_events, 25);
        assert_eq!(log.drain().len(), MAX_EVENTS);
        assert!(log.is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(LocomotionEvent::Unstuck {
            position: Vec3::new(1.0, 2.0, 3.0),
        })
        .expect("event serializes");
        assert_eq!(json["type"], "unstuck");
    }
}
