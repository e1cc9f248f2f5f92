//! Jump primitives, gap and ledge jumps, blast jumps and catapults.

use bevy::prelude::*;
use serde::Serialize;

use crate::arbitration::MoveWeight;
use crate::ballistics::{solve_launch_velocity, time_to_land};
use crate::events::LocomotionEvent;
use crate::input::Button;
use crate::locomotion::{ExclusiveManeuver, Locomotion, ManeuverError};
use crate::timers::CountdownTimer;
use crate::trace::{distance_2d, ground_direction};

/// Which jump was actually performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpKind {
    Jump,
    CrouchJump,
    DoubleJump,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct JumpStatus {
    pub(crate) is_jumping: bool,
    pub(crate) is_jumping_across_gap: bool,
    pub(crate) is_climbing_obstacle: bool,
    /// Landing is tracked and completion fires the jump-complete callback.
    pub(crate) airborne_tracking: bool,
    pub(crate) left_ground: bool,
    pub(crate) cooldown: CountdownTimer,
    pub(crate) window: CountdownTimer,
    /// Delayed second press of a double jump.
    pub(crate) assist: CountdownTimer,
    pub(crate) landing: Option<Vec3>,
    pub(crate) forward: Vec3,
}

impl JumpStatus {
    fn clear_flags(&mut self) {
        self.is_jumping = false;
        self.is_jumping_across_gap = false;
        self.is_climbing_obstacle = false;
        self.airborne_tracking = false;
        self.left_ground = false;
        self.window.invalidate();
        self.assist.invalidate();
        self.landing = None;
    }

    fn is_tracking(&self) -> bool {
        self.is_jumping
            || self.is_jumping_across_gap
            || self.is_climbing_obstacle
            || self.airborne_tracking
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatapultPhase {
    Approach,
    Airborne,
}

#[derive(Clone, Debug)]
pub(crate) struct CatapultRun {
    pub(crate) phase: CatapultPhase,
    pub(crate) start: Vec3,
    pub(crate) landing: Vec3,
    pub(crate) timeout: CountdownTimer,
    pub(crate) corrected: bool,
}

impl Locomotion {
    fn start_jump(&mut self, crouch: bool) -> Result<(), ManeuverError> {
        if self.jump.cooldown.is_running(self.now) || self.body.jump_held {
            return Err(ManeuverError::Busy);
        }
        if crouch {
            self.intents.press(Button::Crouch, self.config.crouch_jump_hold);
        }
        self.intents.press(Button::Jump, 0.0);
        self.jump.cooldown.start(self.now, self.config.jump_cooldown);
        self.jump.window.start(self.now, self.config.jump_duration);
        self.jump.is_jumping = true;
        self.jump.left_ground = false;
        Ok(())
    }

    pub fn jump(&mut self) -> Result<JumpKind, ManeuverError> {
        self.start_jump(false)?;
        Ok(JumpKind::Jump)
    }

    pub fn crouch_jump(&mut self) -> Result<JumpKind, ManeuverError> {
        self.start_jump(true)?;
        Ok(JumpKind::CrouchJump)
    }

    /// Double jump, or a crouch jump for agents that cannot double jump.
    pub fn double_jump(&mut self) -> Result<JumpKind, ManeuverError> {
        if !self.caps.can_double_jump {
            return self.crouch_jump();
        }
        self.start_jump(true)?;
        self.jump
            .assist
            .start(self.now, self.config.double_jump_delay);
        Ok(JumpKind::DoubleJump)
    }

    pub fn is_able_to_double_jump(&self) -> bool {
        self.caps.can_double_jump
    }

    /// Jumps toward `landing`, snapping horizontal velocity at it.
    ///
    /// Gaps that are too long or too high for a single jump use a double
    /// jump when the agent can; otherwise it falls back to a crouch jump.
    /// Landings above `max_double_jump_height` are refused.
    pub fn jump_across_gap(&mut self, landing: Vec3, forward: Vec3) -> Result<JumpKind, ManeuverError> {
        if !self.caps.can_jump_gaps {
            return Err(ManeuverError::Incapable("jump across gaps"));
        }
        self.check_reachable_height(landing)?;
        let position = self.body.position;
        let distance = distance_2d(position, landing);
        let rise = landing.z - position.z;
        let needs_double =
            distance > self.config.max_gap_jump_distance || rise > self.config.max_jump_height;

        let kind = if needs_double && self.caps.can_double_jump {
            self.double_jump()?
        } else {
            if needs_double {
                debug!(
                    "[Locomotion jump] Gap to {:?} needs a double jump, using crouch jump",
                    landing
                );
            }
            self.crouch_jump()?
        };

        self.track_landing(landing, forward);
        self.jump.is_jumping_across_gap = true;

        let jump_speed = self.config.jump_speed();
        let dir = ground_direction(position, landing);
        let horizontal = time_to_land(jump_speed, rise.min(self.config.max_jump_height), self.config.gravity)
            .map_or(self.config.run_speed, |flight| distance / flight.max(0.05))
            .min(self.config.run_speed * 1.5);
        self.intents
            .set_velocity_override(dir * horizontal + Vec3::Z * jump_speed);
        self.face_towards(landing, true);
        Ok(kind)
    }

    pub fn climb_up_to_ledge(&mut self, landing: Vec3, forward: Vec3) -> Result<JumpKind, ManeuverError> {
        let kind = self.crouch_jump()?;
        self.start_ledge_climb(landing, forward);
        Ok(kind)
    }

    pub fn double_jump_to_ledge(&mut self, landing: Vec3, forward: Vec3) -> Result<JumpKind, ManeuverError> {
        self.check_reachable_height(landing)?;
        let kind = self.double_jump()?;
        self.start_ledge_climb(landing, forward);
        Ok(kind)
    }

    fn start_ledge_climb(&mut self, landing: Vec3, forward: Vec3) {
        self.track_landing(landing, forward);
        self.jump.is_climbing_obstacle = true;
        self.move_towards(landing, MoveWeight::STANDARD_JUMPS);
        self.face_towards(landing, true);
    }

    /// Crouch jump while firing at the ground behind `start`.
    pub fn blast_jump_to(&mut self, start: Vec3, landing: Vec3, forward: Vec3) -> Result<JumpKind, ManeuverError> {
        if !self.caps.can_blast_jump {
            return Err(ManeuverError::Incapable("blast jump"));
        }
        if !self.body.on_ground {
            return Err(ManeuverError::NotOnGround);
        }
        let kind = self.crouch_jump()?;
        let forward = Vec3::new(forward.x, forward.y, 0.0).normalize_or_zero();
        self.face_towards(start - forward * self.config.hull_width, true);
        self.intents.press(Button::Attack, 0.0);
        self.track_landing(landing, forward);
        self.jump.is_jumping_across_gap = true;
        Ok(kind)
    }

    fn check_reachable_height(&self, landing: Vec3) -> Result<(), ManeuverError> {
        if landing.z - self.body.position.z > self.config.max_double_jump_height {
            return Err(ManeuverError::Incapable("jump that high"));
        }
        Ok(())
    }

    fn track_landing(&mut self, landing: Vec3, forward: Vec3) {
        self.jump.airborne_tracking = true;
        self.jump.landing = Some(landing);
        self.jump.forward = forward;
    }

    pub(crate) fn jump_update(&mut self) {
        if self.jump.assist.has_started() && self.jump.assist.is_elapsed(self.now) {
            self.jump.assist.invalidate();
            if self.body.is_airborne() {
                self.intents.press(Button::Jump, 0.0);
            }
        }

        if !self.jump.is_tracking() {
            return;
        }

        if self.body.is_airborne() {
            self.jump.left_ground = true;
            if let Some(landing) = self.jump.landing {
                self.move_towards(landing, MoveWeight::STANDARD_JUMPS);
                let heading = self.body.position + self.jump.forward * 100.0;
                self.face_towards(heading, false);
                if self.jump.is_jumping_across_gap
                    && distance_2d(self.body.position, landing) > self.config.hull_half_width()
                {
                    let dir = ground_direction(self.body.position, landing);
                    let speed = self.body.ground_speed();
                    self.intents
                        .set_velocity_override(dir * speed + Vec3::Z * self.body.velocity.z);
                }
            }
            return;
        }

        let tracked = self.jump.airborne_tracking;
        if self.jump.left_ground {
            if tracked {
                self.on_jump_complete();
            } else {
                self.jump.clear_flags();
            }
        } else if self.jump.window.is_elapsed(self.now) {
            self.jump.clear_flags();
        } else if let Some(landing) = self.jump.landing {
            self.move_towards(landing, MoveWeight::STANDARD_JUMPS);
        }
    }

    /// Landing callback: clears jump state, asks the path follower to
    /// re-center and bleeds off residual momentum.
    pub fn on_jump_complete(&mut self) {
        self.jump.clear_flags();
        self.recenter_request = true;
        self.do_counter_strafe(self.config.counter_strafe_time);
        self.stop_and_wait(self.config.post_jump_wait);
        let position = self.body.position;
        debug!("[Locomotion jump] Landed at {:?}", position);
        self.emit(LocomotionEvent::JumpComplete { position });
    }

    /// Walks onto a launcher at `start` and steers the flight to `landing`.
    pub fn use_catapult(&mut self, start: Vec3, landing: Vec3) -> Result<(), ManeuverError> {
        if !self.caps.can_use_catapults {
            return Err(ManeuverError::Incapable("use catapults"));
        }
        self.enter_exclusive(ExclusiveManeuver::Catapult);
        let mut timeout = CountdownTimer::default();
        timeout.start(self.now, self.config.catapult_timeout);
        self.catapult = Some(CatapultRun {
            phase: CatapultPhase::Approach,
            start,
            landing,
            timeout,
            corrected: false,
        });
        Ok(())
    }

    pub fn catapult_phase(&self) -> Option<CatapultPhase> {
        self.catapult.as_ref().map(|run| run.phase)
    }

    pub(crate) fn catapult_update(&mut self) {
        let Some(mut run) = self.catapult.take() else {
            return;
        };
        if run.timeout.is_elapsed(self.now) {
            warn!("[Locomotion catapult] Gave up reaching {:?}", run.landing);
            return;
        }

        if run.phase == CatapultPhase::Approach {
            if self.body.is_airborne() && self.body.velocity.z > 0.0 {
                run.phase = CatapultPhase::Airborne;
            } else {
                self.move_towards(run.start, MoveWeight::CRITICAL);
                self.catapult = Some(run);
                return;
            }
        }

        if self.body.on_ground || self.body.on_ladder {
            self.on_jump_complete();
            return;
        }

        self.move_towards(run.landing, MoveWeight::CRITICAL);
        self.face_towards(run.landing, true);
        if !run.corrected {
            run.corrected = true;
            let speed = self.body.velocity.length().min(self.config.catapult_speed);
            if let Some(velocity) =
                solve_launch_velocity(self.body.position, run.landing, self.config.gravity, speed)
            {
                self.intents.set_velocity_override(velocity);
                self.emit(LocomotionEvent::CatapultLaunched { velocity });
            }
        }
        self.catapult = Some(run);
    }
}
