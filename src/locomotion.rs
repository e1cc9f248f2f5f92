//! The per-agent locomotion core.
//!
//! [`Locomotion::update`] runs once per simulation tick. It refreshes the
//! body snapshot, resets the steering gate, then drives the stuck detector
//! and every maneuver state machine in a fixed order before upstream callers
//! issue their own steering requests for the same tick.

use std::sync::Arc;

use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::arbitration::MoveGate;
use crate::body::BodyState;
use crate::config::{Capabilities, LocomotionConfig};
use crate::elevator::{ElevatorRun, ElevatorState};
use crate::events::{EventLog, LocomotionEvent};
use crate::input::{InputFrame, InputIntents};
use crate::jump::{CatapultRun, JumpStatus};
use crate::ladder::{LadderRun, LadderState};
use crate::nav::World;
use crate::obstacle::ObstacleBreak;
use crate::steering::MovementTypeStatus;
use crate::strafe_jump::{StrafeJumpRun, StrafeJumpState};
use crate::stuck::StuckStatus;
use crate::timers::CountdownTimer;

/// Why a maneuver could not be started.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManeuverError {
    #[error("ladder no longer exists")]
    MissingLadder,
    #[error("nav area no longer exists")]
    MissingArea,
    #[error("elevator no longer exists")]
    MissingElevator,
    #[error("elevator has no floor for the requested area")]
    MissingFloor,
    #[error("obstacle no longer exists")]
    MissingObstacle,
    #[error("obstacle cannot be broken")]
    NotBreakable,
    #[error("agent is unable to {0}")]
    Incapable(&'static str),
    #[error("no collision-free strafe angle found")]
    NoStrafeAngle,
    #[error("another jump is still in progress")]
    Busy,
    #[error("agent must be on the ground")]
    NotOnGround,
}

/// Maneuvers that take exclusive control of the agent. At most one runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusiveManeuver {
    Ladder,
    Elevator,
    StrafeJump,
    Catapult,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MotionStats {
    pub speed: f32,
    pub ground_speed: f32,
    pub motion_vector: Vec3,
    pub ground_motion_vector: Vec3,
}

#[derive(Component)]
pub struct Locomotion {
    pub(crate) config: Arc<LocomotionConfig>,
    pub(crate) caps: Capabilities,
    pub(crate) now: f32,
    pub(crate) body: BodyState,
    pub(crate) gate: MoveGate,
    pub(crate) intents: InputIntents,
    pub(crate) events: EventLog,
    pub(crate) rng: SmallRng,
    pub(crate) motion: MotionStats,
    pub(crate) stuck: StuckStatus,
    pub(crate) movement: MovementTypeStatus,
    pub(crate) jump: JumpStatus,
    pub(crate) ladder: Option<LadderRun>,
    pub(crate) elevator: Option<ElevatorRun>,
    pub(crate) strafe: Option<StrafeJumpRun>,
    pub(crate) catapult: Option<CatapultRun>,
    pub(crate) obstacle: Option<ObstacleBreak>,
    pub(crate) counter_strafe: CountdownTimer,
    pub(crate) stop_and_wait: CountdownTimer,
    pub(crate) recenter_request: bool,
    pub(crate) unstuck_goal: Option<Vec3>,
}

impl Locomotion {
    pub fn new(config: Arc<LocomotionConfig>, caps: Capabilities, seed: u64) -> Self {
        let mut intents = InputIntents::default();
        intents.set_desired_speed(config.run_speed);
        Self {
            config,
            caps,
            now: 0.0,
            body: BodyState::default(),
            gate: MoveGate::default(),
            intents,
            events: EventLog::default(),
            rng: SmallRng::seed_from_u64(seed),
            motion: MotionStats::default(),
            stuck: StuckStatus::default(),
            movement: MovementTypeStatus::default(),
            jump: JumpStatus::default(),
            ladder: None,
            elevator: None,
            strafe: None,
            catapult: None,
            obstacle: None,
            counter_strafe: CountdownTimer::default(),
            stop_and_wait: CountdownTimer::default(),
            recenter_request: false,
            unstuck_goal: None,
        }
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn body(&self) -> &BodyState {
        &self.body
    }

    pub fn now(&self) -> f32 {
        self.now
    }

    /// Advances the core by one tick.
    pub fn update(&mut self, now: f32, body: BodyState, world: &dyn World) {
        self.now = now;
        self.body = body;
        self.gate.reset();
        self.intents.begin_tick(now);

        if !body.alive {
            return;
        }

        self.stuck_monitor(world);
        self.traverse_ladder(world);
        self.elevator_update(world);
        self.strafe_jump_update();
        self.catapult_update();
        self.obstacle_break_update(world);
        self.jump_update();
        self.movement_type_update();
        self.counter_strafe_update();
        self.update_motion_stats();
    }

    fn update_motion_stats(&mut self) {
        let velocity = self.body.velocity;
        let ground = self.body.ground_velocity();
        self.motion = MotionStats {
            speed: velocity.length(),
            ground_speed: ground.length(),
            motion_vector: velocity.normalize_or_zero(),
            ground_motion_vector: ground.normalize_or_zero(),
        };
    }

    /// Clears every state machine back to idle, as on respawn.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.intents.reset();
        self.intents.set_desired_speed(self.config.run_speed);
        self.motion = MotionStats::default();
        self.stuck = StuckStatus::default();
        self.movement = MovementTypeStatus::default();
        self.jump = JumpStatus::default();
        self.ladder = None;
        self.elevator = None;
        self.strafe = None;
        self.catapult = None;
        self.obstacle = None;
        self.counter_strafe.invalidate();
        self.stop_and_wait.invalidate();
        self.recenter_request = false;
        self.unstuck_goal = None;
    }

    pub fn active_exclusive(&self) -> Option<ExclusiveManeuver> {
        if self.ladder.is_some() {
            Some(ExclusiveManeuver::Ladder)
        } else if self.elevator.is_some() {
            Some(ExclusiveManeuver::Elevator)
        } else if self.strafe.is_some() {
            Some(ExclusiveManeuver::StrafeJump)
        } else if self.catapult.is_some() {
            Some(ExclusiveManeuver::Catapult)
        } else {
            None
        }
    }

    /// Cancels every exclusive maneuver other than `kind`.
    pub(crate) fn enter_exclusive(&mut self, kind: ExclusiveManeuver) {
        if kind != ExclusiveManeuver::Ladder {
            self.cancel_ladder();
        }
        if kind != ExclusiveManeuver::Elevator {
            self.cancel_elevator();
        }
        if kind != ExclusiveManeuver::StrafeJump {
            self.cancel_strafe_jump();
        }
        if kind != ExclusiveManeuver::Catapult {
            self.catapult = None;
        }
    }

    pub(crate) fn emit(&mut self, event: LocomotionEvent) {
        self.events.emit(event);
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck.is_stuck
    }

    pub fn stuck_count(&self) -> u32 {
        self.stuck.count
    }

    pub fn is_using_ladder(&self) -> bool {
        self.ladder.is_some()
    }

    pub fn ladder_state(&self) -> LadderState {
        self.ladder.as_ref().map_or(LadderState::NotUsing, |run| run.state)
    }

    pub fn is_using_elevator(&self) -> bool {
        self.elevator.is_some()
    }

    pub fn elevator_state(&self) -> ElevatorState {
        self.elevator
            .as_ref()
            .map_or(ElevatorState::NotUsing, |run| run.state)
    }

    pub fn strafe_jump_state(&self) -> StrafeJumpState {
        self.strafe
            .as_ref()
            .map_or(StrafeJumpState::Idle, |run| run.state)
    }

    pub fn is_using_catapult(&self) -> bool {
        self.catapult.is_some()
    }

    pub fn is_breaking_obstacle(&self) -> bool {
        self.obstacle.is_some()
    }

    pub fn is_climbing_or_jumping(&self) -> bool {
        self.jump.is_jumping
            || self.jump.is_jumping_across_gap
            || self.jump.is_climbing_obstacle
            || self.jump.airborne_tracking
            || self.jump.window.is_running(self.now)
    }

    /// True while an exclusive maneuver or a tracked jump blocks normal
    /// path following.
    pub fn is_controlling_movements(&self) -> bool {
        self.active_exclusive().is_some()
            || self.obstacle.is_some()
            || self.jump.is_jumping_across_gap
            || self.jump.is_climbing_obstacle
    }

    /// False while maneuvers that own the route (ladder, lift, catapult) run.
    pub fn is_pathing_allowed(&self) -> bool {
        self.ladder.is_none() && self.elevator.is_none() && self.catapult.is_none()
    }

    pub fn motion(&self) -> MotionStats {
        self.motion
    }

    pub fn speed(&self) -> f32 {
        self.motion.speed
    }

    pub fn ground_speed(&self) -> f32 {
        self.motion.ground_speed
    }

    pub fn motion_vector(&self) -> Vec3 {
        self.motion.motion_vector
    }

    pub fn ground_motion_vector(&self) -> Vec3 {
        self.motion.ground_motion_vector
    }

    /// Actuator output accumulated so far this tick.
    pub fn input_frame(&self) -> InputFrame {
        self.intents.frame()
    }

    pub fn take_events(&mut self) -> Vec<LocomotionEvent> {
        self.events.drain()
    }

    /// Returns true once after a tracked jump lands, so the path follower
    /// can re-center on the route.
    pub fn take_recenter_request(&mut self) -> bool {
        std::mem::take(&mut self.recenter_request)
    }

    /// Position the teleport recovery moves the agent to.
    pub fn set_unstuck_goal(&mut self, goal: Option<Vec3>) {
        self.unstuck_goal = goal;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::sandbox::SandboxWorld;

    pub fn flat_world() -> SandboxWorld {
        SandboxWorld::default().with_solid(
            Vec3::new(-4000.0, -4000.0, -64.0),
            Vec3::new(4000.0, 4000.0, 0.0),
        )
    }

    pub fn locomotion() -> Locomotion {
        locomotion_with(Capabilities::default())
    }

    pub fn locomotion_with(caps: Capabilities) -> Locomotion {
        Locomotion::new(Arc::new(LocomotionConfig::default()), caps, 7)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::arbitration::MoveWeight;
    use crate::nav::{AreaId, ElevatorFloor, ElevatorId, ElevatorKind, Elevator, Ladder, LadderId, LadderKind};

    fn ladder_world() -> crate::sandbox::SandboxWorld {
        flat_world()
            .with_ladder(Ladder {
                id: LadderId(1),
                top: Vec3::new(0.0, 0.0, 256.0),
                bottom: Vec3::ZERO,
                normal: Vec3::NEG_X,
                width: 32.0,
                kind: LadderKind::Simple,
            })
            .with_area(AreaId(2), Vec3::new(64.0, 0.0, 256.0))
            .with_area(AreaId(10), Vec3::new(0.0, 300.0, 0.0))
            .with_area(AreaId(11), Vec3::new(0.0, 300.0, 500.0))
            .with_elevator(Elevator {
                id: ElevatorId(5),
                floors: vec![
                    ElevatorFloor {
                        area: AreaId(10),
                        floor_position: Vec3::new(0.0, 300.0, 0.0),
                        wait_position: None,
                        call_button: None,
                        use_button: None,
                        shootable_button: false,
                        is_here: false,
                    },
                    ElevatorFloor {
                        area: AreaId(11),
                        floor_position: Vec3::new(0.0, 300.0, 500.0),
                        wait_position: None,
                        call_button: None,
                        use_button: None,
                        shootable_button: false,
                        is_here: false,
                    },
                ],
                speed: 100.0,
                kind: ElevatorKind::Elevator,
            })
    }

    #[test]
    fn entering_an_exclusive_maneuver_cancels_the_others() {
        let world = ladder_world();
        let mut loco = locomotion();
        loco.update(0.0, BodyState::at(Vec3::new(-40.0, 0.0, 0.0)), &world);

        loco.climb_ladder(LadderId(1), AreaId(2), &world)
            .expect("ladder is valid");
        assert_eq!(loco.active_exclusive(), Some(ExclusiveManeuver::Ladder));

        loco.use_elevator(ElevatorId(5), AreaId(10), AreaId(11), &world)
            .expect("elevator is valid");
        assert_eq!(loco.active_exclusive(), Some(ExclusiveManeuver::Elevator));
        assert!(!loco.is_using_ladder());

        loco.use_catapult(Vec3::new(100.0, 0.0, 0.0), Vec3::new(900.0, 0.0, 0.0))
            .expect("catapults allowed");
        assert_eq!(loco.active_exclusive(), Some(ExclusiveManeuver::Catapult));
        assert!(!loco.is_using_elevator());
        assert!(!loco.is_pathing_allowed());

        let active = [
            loco.is_using_ladder(),
            loco.is_using_elevator(),
            loco.strafe_jump_state() != StrafeJumpState::Idle,
            loco.is_using_catapult(),
        ];
        assert_eq!(active.iter().filter(|&&a| a).count(), 1);
    }

    #[test]
    fn reset_returns_every_machine_to_idle() {
        let world = ladder_world();
        let mut loco = locomotion();
        loco.update(0.0, BodyState::at(Vec3::new(-40.0, 0.0, 0.0)), &world);
        loco.climb_ladder(LadderId(1), AreaId(2), &world)
            .expect("ladder is valid");
        loco.move_towards(Vec3::new(100.0, 0.0, 0.0), MoveWeight::CRITICAL);
        loco.reset();
        assert_eq!(loco.ladder_state(), LadderState::NotUsing);
        assert_eq!(loco.elevator_state(), ElevatorState::NotUsing);
        assert!(!loco.is_stuck());
        assert!(!loco.is_controlling_movements());
        assert!(loco.input_frame().buttons.is_empty());
        assert!(loco.gate.admit(MoveWeight::DEFAULT));
    }

    #[test]
    fn motion_stats_follow_body_velocity() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState {
            velocity: Vec3::new(30.0, 40.0, 120.0),
            ..BodyState::default()
        };
        loco.update(0.0, body, &world);
        assert!((loco.speed() - 130.0).abs() < 1e-3);
        assert!((loco.ground_speed() - 50.0).abs() < 1e-3);
        assert!((loco.ground_motion_vector() - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-5);
    }

    #[test]
    fn dead_agents_do_nothing() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState {
            alive: false,
            ..BodyState::default()
        };
        loco.update(0.0, body, &world);
        loco.update(50.0, body, &world);
        assert!(!loco.is_stuck());
        assert!(loco.take_events().is_empty());
    }
}
