//! Lift state machine: wait, call, board, operate, ride and exit.
//!
//! Every state after `MoveToWait` runs under a deadline derived from the
//! travel distance between the two floors. It is armed on leaving
//! `MoveToWait` and armed afresh on entering `WaitForArrival` and `Ride`.
//! The deadline is checked before any state logic, so an expired run ends
//! on the tick the deadline is reached.

use bevy::prelude::*;
use serde::Serialize;

use crate::arbitration::MoveWeight;
use crate::events::LocomotionEvent;
use crate::input::Button;
use crate::locomotion::{ExclusiveManeuver, Locomotion, ManeuverError};
use crate::nav::{AreaId, Elevator, ElevatorFloor, ElevatorId, ElevatorKind, World};
use crate::timers::CountdownTimer;
use crate::trace::distance_2d;

/// Wait positions closer than this to the platform spot are treated as
/// missing.
const DEGENERATE_WAIT_DISTANCE: f32 = 1.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevatorState {
    #[default]
    NotUsing,
    MoveToWait,
    Call,
    WaitForArrival,
    Enter,
    Operate,
    Ride,
    Exit,
}

#[derive(Clone, Debug)]
pub(crate) struct ElevatorRun {
    pub(crate) state: ElevatorState,
    pub(crate) elevator: ElevatorId,
    pub(crate) from: AreaId,
    pub(crate) to: AreaId,
    pub(crate) timeout: CountdownTimer,
    pub(crate) button_cooldown: CountdownTimer,
}

/// Seconds allowed for a trip between two floors.
pub fn elevator_travel_timeout(
    elevator: &Elevator,
    from: AreaId,
    to: AreaId,
    default_speed: f32,
    extra: f32,
) -> Option<f32> {
    let distance = elevator.length_between_floors(from, to)?;
    let speed = if elevator.speed > 0.0 {
        elevator.speed
    } else {
        default_speed
    };
    Some(distance / speed + extra)
}

fn has_usable_wait_position(floor: &ElevatorFloor) -> bool {
    floor
        .wait_position
        .is_some_and(|wait| wait.distance(floor.floor_position) > DEGENERATE_WAIT_DISTANCE)
}

enum Press {
    Pending,
    Done,
}

impl Locomotion {
    /// Rides `elevator` from the floor serving `from` to the one serving `to`.
    pub fn use_elevator(
        &mut self,
        elevator: ElevatorId,
        from: AreaId,
        to: AreaId,
        world: &dyn World,
    ) -> Result<(), ManeuverError> {
        let lift = world.elevator(elevator).ok_or(ManeuverError::MissingElevator)?;
        let origin = lift.floor_for_area(from).ok_or(ManeuverError::MissingFloor)?;
        if lift.floor_for_area(to).is_none() {
            return Err(ManeuverError::MissingFloor);
        }

        let first = if lift.kind == ElevatorKind::AutoTrigger {
            ElevatorState::Enter
        } else if !has_usable_wait_position(origin) {
            ElevatorState::Call
        } else {
            ElevatorState::MoveToWait
        };

        self.enter_exclusive(ExclusiveManeuver::Elevator);
        self.elevator = Some(ElevatorRun {
            state: ElevatorState::NotUsing,
            elevator,
            from,
            to,
            timeout: CountdownTimer::default(),
            button_cooldown: CountdownTimer::default(),
        });
        debug!(
            "[Locomotion elevator] Using {:?} from {:?} to {:?}",
            elevator, from, to
        );
        self.commit_elevator_state(first, &lift);
        Ok(())
    }

    pub(crate) fn cancel_elevator(&mut self) {
        if let Some(run) = self.elevator.take() {
            self.emit(LocomotionEvent::ElevatorStateChanged {
                elevator: run.elevator,
                from: run.state,
                to: ElevatorState::NotUsing,
            });
        }
    }

    /// Applies a transition, arming the travel deadline when leaving
    /// `MoveToWait` and re-arming it for the wait and the ride.
    fn commit_elevator_state(&mut self, next: ElevatorState, lift: &Elevator) {
        let now = self.now;
        let default_speed = self.config.elevator_default_speed;
        let extra = self.config.elevator_timeout_extra;
        let Some(run) = self.elevator.as_mut() else {
            return;
        };
        let from = run.state;
        if from == next {
            return;
        }
        let elevator = run.elevator;
        if next == ElevatorState::NotUsing {
            self.elevator = None;
        } else {
            let arm = matches!(next, ElevatorState::WaitForArrival | ElevatorState::Ride)
                || (next != ElevatorState::MoveToWait && !run.timeout.has_started());
            if arm {
                let limit = elevator_travel_timeout(lift, run.from, run.to, default_speed, extra)
                    .unwrap_or(extra);
                run.timeout.start(now, limit);
            }
            run.state = next;
        }
        debug!("[Locomotion elevator] {:?} -> {:?}", from, next);
        self.emit(LocomotionEvent::ElevatorStateChanged {
            elevator,
            from,
            to: next,
        });
    }

    pub(crate) fn elevator_update(&mut self, world: &dyn World) {
        let Some(run) = self.elevator.clone() else {
            return;
        };

        if run.timeout.has_started() && run.timeout.is_elapsed(self.now) {
            warn!(
                "[Locomotion elevator] Timed out on {:?} in state {:?}",
                run.elevator, run.state
            );
            self.emit(LocomotionEvent::ElevatorTimedOut {
                elevator: run.elevator,
                state: run.state,
            });
            self.elevator = None;
            self.emit(LocomotionEvent::ElevatorStateChanged {
                elevator: run.elevator,
                from: run.state,
                to: ElevatorState::NotUsing,
            });
            return;
        }

        let Some(lift) = world.elevator(run.elevator) else {
            warn!("[Locomotion elevator] {:?} vanished, aborting", run.elevator);
            self.cancel_elevator();
            return;
        };
        let (Some(origin), Some(destination)) = (
            lift.floor_for_area(run.from).cloned(),
            lift.floor_for_area(run.to).cloned(),
        ) else {
            warn!("[Locomotion elevator] Floor of {:?} vanished, aborting", run.elevator);
            self.cancel_elevator();
            return;
        };

        let next = match run.state {
            ElevatorState::NotUsing => ElevatorState::NotUsing,
            ElevatorState::MoveToWait => self.elevator_move_to_wait(&origin),
            ElevatorState::Call => self.elevator_call(&origin),
            ElevatorState::WaitForArrival => self.elevator_wait(&origin),
            ElevatorState::Enter => self.elevator_enter(&origin),
            ElevatorState::Operate => self.elevator_operate(&lift, &origin, &destination),
            ElevatorState::Ride => self.elevator_ride(&lift, &origin, &destination),
            ElevatorState::Exit => self.elevator_exit(&destination, world),
        };
        self.commit_elevator_state(next, &lift);
    }

    fn elevator_move_to_wait(&mut self, origin: &ElevatorFloor) -> ElevatorState {
        let Some(wait) = origin.wait_position else {
            return ElevatorState::Call;
        };
        let position = self.body.position;
        if (wait.z - position.z).abs() > self.config.step_height {
            warn!(
                "[Locomotion elevator] Wait position {:?} is not level with {:?}",
                wait, position
            );
            return ElevatorState::NotUsing;
        }
        if distance_2d(position, wait) <= self.config.elevator_move_range {
            return ElevatorState::Call;
        }
        self.move_towards(wait, MoveWeight::PRIORITY);
        ElevatorState::MoveToWait
    }

    fn elevator_call(&mut self, origin: &ElevatorFloor) -> ElevatorState {
        if origin.is_here {
            return ElevatorState::Enter;
        }
        let Some(button) = origin.call_button else {
            return ElevatorState::WaitForArrival;
        };
        match self.press_elevator_button(button.position, origin.shootable_button) {
            Press::Done => ElevatorState::WaitForArrival,
            Press::Pending => ElevatorState::Call,
        }
    }

    /// Walks to a button and uses it, or shoots it when it is only
    /// reachable that way.
    fn press_elevator_button(&mut self, button: Vec3, shootable: bool) -> Press {
        let now = self.now;
        let cooldown = self.config.button_cooldown;
        let distance = self.body.position.distance(button);
        let range = if shootable {
            self.config.shoot_range
        } else {
            self.config.use_range
        };
        self.face_towards(button, true);
        if distance > range {
            self.move_towards(button, MoveWeight::PRIORITY);
            return Press::Pending;
        }
        let Some(run) = self.elevator.as_mut() else {
            return Press::Pending;
        };
        if run.button_cooldown.is_running(now) {
            return Press::Pending;
        }
        run.button_cooldown.start(now, cooldown);
        let control = if shootable { Button::Attack } else { Button::Use };
        self.intents.press(control, 0.0);
        Press::Done
    }

    fn elevator_wait(&mut self, origin: &ElevatorFloor) -> ElevatorState {
        if origin.is_here {
            return ElevatorState::Enter;
        }
        let spot = origin.wait_position.unwrap_or(self.body.position);
        if distance_2d(self.body.position, spot) > self.config.elevator_move_range {
            self.move_towards(spot, MoveWeight::PRIORITY);
        } else {
            self.stop();
        }
        ElevatorState::WaitForArrival
    }

    fn elevator_enter(&mut self, origin: &ElevatorFloor) -> ElevatorState {
        let position = self.body.position;
        if !origin.is_here {
            return ElevatorState::WaitForArrival;
        }
        if (origin.floor_position.z - position.z).abs() > self.config.max_jump_height {
            warn!("[Locomotion elevator] Lift platform out of reach, aborting");
            return ElevatorState::NotUsing;
        }
        if distance_2d(position, origin.floor_position) <= self.config.elevator_move_range {
            return ElevatorState::Operate;
        }
        self.move_towards(origin.floor_position, MoveWeight::PRIORITY);
        ElevatorState::Enter
    }

    fn elevator_operate(
        &mut self,
        lift: &Elevator,
        origin: &ElevatorFloor,
        destination: &ElevatorFloor,
    ) -> ElevatorState {
        if destination.is_here || lift.kind == ElevatorKind::AutoTrigger {
            return ElevatorState::Ride;
        }
        let Some(button) = origin.use_button else {
            return ElevatorState::Ride;
        };
        match self.press_elevator_button(button.position, origin.shootable_button) {
            Press::Done => ElevatorState::Ride,
            Press::Pending => ElevatorState::Operate,
        }
    }

    fn elevator_ride(
        &mut self,
        lift: &Elevator,
        origin: &ElevatorFloor,
        destination: &ElevatorFloor,
    ) -> ElevatorState {
        if destination.is_here {
            return ElevatorState::Exit;
        }
        self.stop();
        if lift.is_multi_floor() {
            let halted_between = lift
                .stopped_floor()
                .filter(|floor| floor.area != origin.area && floor.area != destination.area);
            if let Some(floor) = halted_between {
                let button = floor.use_button.or(origin.use_button);
                if let Some(button) = button {
                    debug!(
                        "[Locomotion elevator] Lift halted at {:?}, pressing again",
                        floor.area
                    );
                    self.press_elevator_button(button.position, floor.shootable_button);
                }
            }
        }
        ElevatorState::Ride
    }

    fn elevator_exit(&mut self, destination: &ElevatorFloor, world: &dyn World) -> ElevatorState {
        let target = destination
            .wait_position
            .or_else(|| world.area(destination.area).map(|area| area.center))
            .unwrap_or(destination.floor_position);
        let position = self.body.position;
        if (target.z - position.z).abs() > self.config.max_jump_height {
            warn!("[Locomotion elevator] Exit {:?} out of reach from {:?}", target, position);
            return ElevatorState::NotUsing;
        }
        if distance_2d(position, target) <= self.config.elevator_move_range {
            return ElevatorState::NotUsing;
        }
        self.move_towards(target, MoveWeight::PRIORITY);
        ElevatorState::Exit
    }
}
