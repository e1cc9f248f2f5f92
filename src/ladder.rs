//! Ladder state machine: approach, mount, climb and dismount in both
//! directions, bounded by a length-scaled timeout.

use bevy::prelude::*;
use serde::Serialize;

use crate::arbitration::MoveWeight;
use crate::ballistics::velocity_to_reach;
use crate::events::LocomotionEvent;
use crate::input::Button;
use crate::locomotion::{ExclusiveManeuver, Locomotion, ManeuverError};
use crate::nav::{AreaId, Ladder, LadderId, LadderKind, NavArea, World};
use crate::timers::CountdownTimer;
use crate::trace::distance_2d;

/// Height above/below the current position the climb steering aims at.
const CLIMB_LOOKAHEAD: f32 = 100.0;
/// Outward offset keeping the agent off the ladder face while climbing.
const CLIMB_OUTWARD_BIAS: f32 = 2.0;
/// Flight time used when the dismount launch bridges to the exit area.
const DISMOUNT_FLIGHT_TIME: f32 = 0.4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderState {
    #[default]
    NotUsing,
    ApproachingUp,
    ApproachingDown,
    UsingUp,
    UsingDown,
    ExitingUp,
    ExitingDown,
}

#[derive(Clone, Debug)]
pub(crate) struct LadderRun {
    pub(crate) state: LadderState,
    pub(crate) ladder: LadderId,
    pub(crate) exit: AreaId,
    pub(crate) timeout: CountdownTimer,
    pub(crate) grace: CountdownTimer,
    pub(crate) goal_z: f32,
    pub(crate) launched: bool,
}

/// Height at which an ascending agent starts dismounting.
///
/// Simple ladders dismount one step below the exit area, never above half a
/// step under the physical top. Useable ladders carry the agent to the top
/// themselves.
pub fn ascent_goal_height(ladder: &Ladder, exit: &NavArea, step_height: f32) -> f32 {
    match ladder.kind {
        LadderKind::Simple => {
            (exit.center.z - step_height).min(ladder.top.z - step_height * 0.5)
        }
        LadderKind::Useable => ladder.top.z - step_height,
    }
}

pub fn descent_goal_height(ladder: &Ladder, exit: &NavArea, step_height: f32) -> f32 {
    (exit.center.z + step_height).max(ladder.bottom.z + step_height * 0.5)
}

impl Locomotion {
    pub fn climb_ladder(&mut self, ladder: LadderId, exit: AreaId, world: &dyn World) -> Result<(), ManeuverError> {
        self.start_ladder(ladder, exit, world, LadderState::ApproachingUp)
    }

    pub fn descend_ladder(&mut self, ladder: LadderId, exit: AreaId, world: &dyn World) -> Result<(), ManeuverError> {
        self.start_ladder(ladder, exit, world, LadderState::ApproachingDown)
    }

    fn start_ladder(
        &mut self,
        id: LadderId,
        exit: AreaId,
        world: &dyn World,
        state: LadderState,
    ) -> Result<(), ManeuverError> {
        if !self.caps.can_climb {
            return Err(ManeuverError::Incapable("climb ladders"));
        }
        let ladder = world.ladder(id).ok_or(ManeuverError::MissingLadder)?;
        let area = world.area(exit).ok_or(ManeuverError::MissingArea)?;
        let step = self.config.step_height;
        let goal_z = if state == LadderState::ApproachingUp {
            ascent_goal_height(&ladder, &area, step)
        } else {
            descent_goal_height(&ladder, &area, step)
        };
        let limit = ladder.length().abs() / self.config.ladder_min_speed
            + self.config.ladder_timeout_grace;

        self.enter_exclusive(ExclusiveManeuver::Ladder);
        let mut timeout = CountdownTimer::default();
        timeout.start(self.now, limit);
        self.ladder = Some(LadderRun {
            state: LadderState::NotUsing,
            ladder: id,
            exit,
            timeout,
            grace: CountdownTimer::default(),
            goal_z,
            launched: false,
        });
        debug!(
            "[Locomotion ladder] Using {:?} toward {:?} (goal z {:.1}, timeout {:.1}s)",
            id, exit, goal_z, limit
        );
        self.commit_ladder_state(state);
        Ok(())
    }

    pub(crate) fn cancel_ladder(&mut self) {
        if self.ladder.is_some() {
            self.commit_ladder_state(LadderState::NotUsing);
        }
    }

    /// The single place ladder state changes are applied.
    fn commit_ladder_state(&mut self, next: LadderState) {
        let Some(run) = self.ladder.as_mut() else {
            return;
        };
        let from = run.state;
        let ladder = run.ladder;
        if from == next {
            return;
        }
        if next == LadderState::NotUsing {
            self.ladder = None;
        } else {
            run.state = next;
            run.grace.invalidate();
        }
        debug!("[Locomotion ladder] {:?} -> {:?}", from, next);
        self.emit(LocomotionEvent::LadderStateChanged {
            ladder,
            from,
            to: next,
        });
    }

    pub(crate) fn traverse_ladder(&mut self, world: &dyn World) {
        let Some(run) = self.ladder.clone() else {
            return;
        };

        if run.timeout.is_elapsed(self.now) {
            warn!(
                "[Locomotion ladder] Timed out on {:?} in state {:?}",
                run.ladder, run.state
            );
            self.emit(LocomotionEvent::LadderTimedOut {
                ladder: run.ladder,
                state: run.state,
            });
            self.commit_ladder_state(LadderState::NotUsing);
            return;
        }

        let (Some(ladder), Some(area)) = (world.ladder(run.ladder), world.area(run.exit)) else {
            warn!(
                "[Locomotion ladder] {:?} or exit {:?} vanished, aborting",
                run.ladder, run.exit
            );
            self.commit_ladder_state(LadderState::NotUsing);
            return;
        };

        let next = match run.state {
            LadderState::NotUsing => LadderState::NotUsing,
            LadderState::ApproachingUp => self.ladder_approach_up(&ladder),
            LadderState::ApproachingDown => self.ladder_approach_down(&ladder),
            LadderState::UsingUp => self.ladder_climb_up(&ladder, run.goal_z),
            LadderState::UsingDown => self.ladder_climb_down(&ladder, run.goal_z),
            LadderState::ExitingUp => self.ladder_exit_up(&ladder, &area, run.goal_z, world),
            LadderState::ExitingDown => self.ladder_exit_down(&area),
        };
        self.commit_ladder_state(next);
    }

    /// Arms the mount grace once attached and reports whether it elapsed.
    fn ladder_mount_settled(&mut self) -> bool {
        let now = self.now;
        let grace = self.config.ladder_mount_grace;
        let Some(run) = self.ladder.as_mut() else {
            return false;
        };
        if !run.grace.has_started() {
            run.grace.start(now, grace);
            return false;
        }
        run.grace.is_elapsed(now)
    }

    fn ladder_approach_up(&mut self, ladder: &Ladder) -> LadderState {
        if self.body.on_ladder {
            self.move_towards(ladder.pos_at_height(ladder.top.z), MoveWeight::CRITICAL);
            return if self.ladder_mount_settled() {
                LadderState::UsingUp
            } else {
                LadderState::ApproachingUp
            };
        }

        let mount = ladder.mount_point(self.config.hull_half_width());
        self.face_towards(ladder.top, true);
        if distance_2d(self.body.position, mount) > 8.0 {
            self.move_towards(mount, MoveWeight::CRITICAL);
        } else {
            self.move_towards(ladder.pos_at_height(self.body.position.z), MoveWeight::CRITICAL);
            if ladder.kind == LadderKind::Useable {
                self.intents.press(Button::Use, 0.0);
            }
        }
        LadderState::ApproachingUp
    }

    fn ladder_approach_down(&mut self, ladder: &Ladder) -> LadderState {
        let offset = self.config.hull_half_width() + 4.0;
        if self.body.on_ladder {
            let below = ladder.pos_at_height(self.body.position.z - CLIMB_LOOKAHEAD)
                + ladder.normal * offset;
            self.move_towards(below, MoveWeight::CRITICAL);
            return if self.ladder_mount_settled() {
                LadderState::UsingDown
            } else {
                LadderState::ApproachingDown
            };
        }

        let mount = ladder.top - ladder.normal * offset;
        self.face_towards(ladder.bottom, true);
        self.move_towards(mount, MoveWeight::CRITICAL);
        if ladder.kind == LadderKind::Useable
            && distance_2d(self.body.position, mount) <= self.config.use_range
        {
            self.intents.press(Button::Use, 0.0);
        }
        LadderState::ApproachingDown
    }

    fn ladder_climb_up(&mut self, ladder: &Ladder, goal_z: f32) -> LadderState {
        let z = self.body.position.z;
        if z >= goal_z || z >= ladder.top.z {
            return LadderState::ExitingUp;
        }
        if !self.body.on_ladder {
            debug!("[Locomotion ladder] Fell off {:?} at z {:.1}", ladder.id, z);
            return LadderState::NotUsing;
        }
        let target = ladder.pos_at_height(z + CLIMB_LOOKAHEAD) + ladder.normal * CLIMB_OUTWARD_BIAS;
        let target = Vec3::new(target.x, target.y, z + CLIMB_LOOKAHEAD);
        self.move_towards(target, MoveWeight::CRITICAL);
        self.face_towards(ladder.top, true);
        LadderState::UsingUp
    }

    fn ladder_climb_down(&mut self, ladder: &Ladder, goal_z: f32) -> LadderState {
        let z = self.body.position.z;
        if z <= goal_z || (self.body.on_ground && !self.body.on_ladder) {
            return LadderState::ExitingDown;
        }
        if !self.body.on_ladder {
            debug!("[Locomotion ladder] Let go of {:?} at z {:.1}", ladder.id, z);
            return LadderState::NotUsing;
        }
        let offset = self.config.hull_half_width() + 4.0;
        let target = ladder.pos_at_height(z - CLIMB_LOOKAHEAD) + ladder.normal * offset;
        let target = Vec3::new(target.x, target.y, z - CLIMB_LOOKAHEAD);
        self.move_towards(target, MoveWeight::CRITICAL);
        self.face_towards(ladder.bottom, true);
        LadderState::UsingDown
    }

    fn ladder_exit_up(&mut self, ladder: &Ladder, area: &NavArea, goal_z: f32, world: &dyn World) -> LadderState {
        let position = self.body.position;
        let step = self.config.step_height;
        if self.body.on_ground && (position.z - area.center.z).abs() < step {
            return LadderState::NotUsing;
        }

        self.move_towards(area.center, MoveWeight::CRITICAL);
        self.face_towards(area.center, true);
        if ladder.kind == LadderKind::Useable && self.body.on_ladder {
            self.intents.press(Button::Jump, 0.0);
        }

        let launched = self.ladder.as_ref().is_some_and(|run| run.launched);
        let airborne_above = self.body.is_airborne() && position.z > goal_z;
        let gap = !launched
            && self.body.on_ground
            && crate::traversal::has_potential_gap(world, &self.config, position, area.center).is_some();
        if !launched && (airborne_above || gap) {
            let velocity = velocity_to_reach(
                position,
                area.center + Vec3::Z * step,
                self.config.gravity,
                DISMOUNT_FLIGHT_TIME,
            );
            self.intents.set_velocity_override(velocity);
            if let Some(run) = self.ladder.as_mut() {
                run.launched = true;
            }
        }
        LadderState::ExitingUp
    }

    fn ladder_exit_down(&mut self, area: &NavArea) -> LadderState {
        let position = self.body.position;
        if self.body.on_ground
            && (position.z - area.center.z).abs() < self.config.step_height
            && (!self.body.on_ladder || distance_2d(position, area.center) < self.config.hull_width)
        {
            return LadderState::NotUsing;
        }
        self.move_towards(area.center, MoveWeight::CRITICAL);
        LadderState::ExitingDown
    }
}
