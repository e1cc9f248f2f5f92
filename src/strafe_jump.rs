//! Two-phase strafe jump around an obstruction.
//!
//! The solver searches yaw offsets of increasing size, left before right,
//! for a midpoint at half the travel distance that a crouched hull can reach
//! from a point one jump height above the start. The maneuver then jumps at
//! the midpoint and re-aims at the endpoint once it gets there.

use bevy::prelude::*;
use serde::Serialize;

use crate::arbitration::MoveWeight;
use crate::ballistics::velocity_to_reach;
use crate::config::LocomotionConfig;
use crate::events::LocomotionEvent;
use crate::locomotion::{ExclusiveManeuver, Locomotion, ManeuverError};
use crate::nav::World;
use crate::timers::CountdownTimer;
use crate::trace::{distance_2d, ground_direction, rotate_yaw, Hull, TraceQuery};

/// Shortest flight time used when re-aiming at the endpoint.
const MIN_FLIGHT_TIME: f32 = 0.1;
const LOOK_DISTANCE: f32 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrafeJumpState {
    #[default]
    Idle,
    Init,
    ToMidpoint,
    ToEndpoint,
}

#[derive(Clone, Debug)]
pub(crate) struct StrafeJumpRun {
    pub(crate) state: StrafeJumpState,
    pub(crate) start: Vec3,
    pub(crate) end: Vec3,
    pub(crate) midpoint: Vec3,
    /// Midpoint lies to the right of the start -> end line.
    pub(crate) right_side: bool,
    pub(crate) left_ground: bool,
    pub(crate) timeout: CountdownTimer,
}

/// Finds the first collision-free strafe midpoint between `start` and
/// `end`. Returns the midpoint and whether it lies on the right.
pub fn solve_strafe_midpoint<W: TraceQuery + ?Sized>(
    world: &W,
    config: &LocomotionConfig,
    start: Vec3,
    end: Vec3,
) -> Option<(Vec3, bool)> {
    let dir = ground_direction(start, end);
    if dir == Vec3::ZERO {
        return None;
    }
    let raised = start + Vec3::Z * config.max_jump_height;
    let reach = distance_2d(start, end) * 0.5;
    let hull = Hull::column(config.hull_width, 0.0, config.crouch_height);
    let steps = (config.strafe_max_angle / config.strafe_angle_step).floor() as u32;

    for step in 1..=steps {
        let angle = step as f32 * config.strafe_angle_step;
        for (yaw, right_side) in [(angle, false), (-angle, true)] {
            let candidate = raised + rotate_yaw(dir, yaw) * reach;
            if !world.trace_hull(raised, candidate, hull).did_hit() {
                return Some((candidate, right_side));
            }
        }
    }
    None
}

impl Locomotion {
    /// Strafe jumps from `start` to `end` around whatever blocks the
    /// straight line. Nothing changes when no midpoint is found.
    pub fn do_strafe_jump(&mut self, start: Vec3, end: Vec3, world: &dyn World) -> Result<(), ManeuverError> {
        if !self.caps.can_strafe_jump {
            return Err(ManeuverError::Incapable("strafe jump"));
        }
        let Some((midpoint, right_side)) = solve_strafe_midpoint(world, &self.config, start, end)
        else {
            debug!(
                "[Locomotion strafe] No strafe angle from {:?} to {:?}",
                start, end
            );
            return Err(ManeuverError::NoStrafeAngle);
        };

        self.enter_exclusive(ExclusiveManeuver::StrafeJump);
        let mut timeout = CountdownTimer::default();
        timeout.start(self.now, self.config.strafe_timeout);
        self.strafe = Some(StrafeJumpRun {
            state: StrafeJumpState::Init,
            start,
            end,
            midpoint,
            right_side,
            left_ground: false,
            timeout,
        });
        debug!(
            "[Locomotion strafe] Idle -> Init, midpoint {:?} ({})",
            midpoint,
            if right_side { "right" } else { "left" }
        );
        self.emit(LocomotionEvent::StrafeJumpStarted {
            midpoint,
            right_side,
        });
        Ok(())
    }

    pub(crate) fn cancel_strafe_jump(&mut self) {
        if self.strafe.take().is_some() {
            self.emit(LocomotionEvent::StrafeJumpAborted);
        }
    }

    pub(crate) fn strafe_jump_update(&mut self) {
        let Some(mut run) = self.strafe.take() else {
            return;
        };
        if run.timeout.is_elapsed(self.now) {
            warn!(
                "[Locomotion strafe] Timed out in {:?} heading for {:?}",
                run.state, run.end
            );
            self.emit(LocomotionEvent::StrafeJumpAborted);
            return;
        }
        if self.body.is_airborne() {
            run.left_ground = true;
        }

        let next = match run.state {
            StrafeJumpState::Idle => StrafeJumpState::Idle,
            StrafeJumpState::Init => self.strafe_init(&run),
            StrafeJumpState::ToMidpoint => self.strafe_to_midpoint(&run),
            StrafeJumpState::ToEndpoint => self.strafe_to_endpoint(&run),
        };
        self.commit_strafe_state(run, next);
    }

    /// Idle after `ToEndpoint` means the jump landed; from any other state
    /// it means the attempt failed.
    fn commit_strafe_state(&mut self, mut run: StrafeJumpRun, next: StrafeJumpState) {
        let from = run.state;
        if from != next {
            debug!("[Locomotion strafe] {:?} -> {:?}", from, next);
        }
        if next != StrafeJumpState::Idle {
            run.state = next;
            self.strafe = Some(run);
            return;
        }
        if from == StrafeJumpState::ToEndpoint {
            self.emit(LocomotionEvent::StrafeJumpCompleted);
            self.on_jump_complete();
        } else {
            self.emit(LocomotionEvent::StrafeJumpAborted);
        }
    }

    fn strafe_init(&mut self, run: &StrafeJumpRun) -> StrafeJumpState {
        if !self.body.on_ground {
            self.move_towards(run.start, MoveWeight::CRITICAL);
            return StrafeJumpState::Init;
        }
        if self.crouch_jump().is_err() {
            return StrafeJumpState::Init;
        }
        let takeoff = ground_direction(self.body.position, run.midpoint) * self.config.run_speed
            + Vec3::Z * self.config.jump_speed();
        self.intents.set_velocity_override(takeoff);
        self.move_towards(run.midpoint, MoveWeight::CRITICAL);
        StrafeJumpState::ToMidpoint
    }

    /// Aims a little to the side opposite the strafe while drifting.
    fn strafe_look(&mut self, run: &StrafeJumpRun) {
        let position = self.body.position;
        let offset = if run.right_side {
            self.config.strafe_look_offset
        } else {
            -self.config.strafe_look_offset
        };
        let look = rotate_yaw(ground_direction(position, run.end), offset);
        self.face_towards(position + look * LOOK_DISTANCE, true);
    }

    fn strafe_to_midpoint(&mut self, run: &StrafeJumpRun) -> StrafeJumpState {
        let position = self.body.position;
        if run.left_ground && self.body.on_ground {
            warn!(
                "[Locomotion strafe] Landed at {:?} before the midpoint",
                position
            );
            return StrafeJumpState::Idle;
        }
        self.move_towards(run.end, MoveWeight::CRITICAL);
        self.strafe_look(run);
        if distance_2d(position, run.midpoint) > self.config.hull_width {
            return StrafeJumpState::ToMidpoint;
        }
        let flight = (distance_2d(position, run.end) / self.config.run_speed).max(MIN_FLIGHT_TIME);
        let velocity = velocity_to_reach(position, run.end, self.config.gravity, flight);
        self.intents.set_velocity_override(velocity);
        StrafeJumpState::ToEndpoint
    }

    fn strafe_to_endpoint(&mut self, run: &StrafeJumpRun) -> StrafeJumpState {
        if self.body.on_ground || self.body.on_ladder {
            return StrafeJumpState::Idle;
        }
        self.move_towards(run.end, MoveWeight::CRITICAL);
        self.strafe_look(run);
        StrafeJumpState::ToEndpoint
    }
}
