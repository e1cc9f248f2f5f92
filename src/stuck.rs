//! Stuck detection and escalating recovery.
//!
//! An agent counts as stuck when movement has been requested recently but it
//! has not moved `stuck_radius` units within `radius / (min_speed / 4)`
//! seconds. Recovery escalates with the stuck count: jump or break whatever
//! is ahead, then teleport to the next ground goal, and finally
//! self-terminate. The count survives unstuck and idle periods; only a
//! teleport or [`Locomotion::reset`] clears it.

use bevy::prelude::*;
use rand::Rng;

use crate::arbitration::MoveWeight;
use crate::events::LocomotionEvent;
use crate::input::Button;
use crate::locomotion::Locomotion;
use crate::nav::World;
use crate::timers::{CountdownTimer, IntervalTimer};

#[derive(Clone, Debug, Default)]
pub(crate) struct StuckStatus {
    pub(crate) is_stuck: bool,
    /// Time the current stuck episode began.
    pub(crate) stuck_since: Option<f32>,
    /// Position the agent last made confirmed progress from.
    pub(crate) anchor: Vec3,
    /// Time since the anchor was last moved.
    pub(crate) progress: IntervalTimer,
    pub(crate) last_request: IntervalTimer,
    pub(crate) recheck: CountdownTimer,
    pub(crate) count: u32,
}

impl StuckStatus {
    pub(crate) fn note_move_request(&mut self, now: f32) {
        self.last_request.start(now);
    }

    fn update_not_stuck(&mut self, now: f32, position: Vec3) {
        self.anchor = position;
        self.progress.start(now);
    }
}

impl Locomotion {
    pub(crate) fn stuck_monitor(&mut self, world: &dyn World) {
        let now = self.now;
        let position = self.body.position;
        let idle = self
            .stuck
            .last_request
            .is_greater_than(now, self.config.stuck_idle_time);

        if idle || !self.stuck.progress.has_started() {
            if self.stuck.is_stuck {
                self.clear_stuck(position);
            }
            self.stuck.update_not_stuck(now, position);
            return;
        }

        if position.distance(self.stuck.anchor) >= self.config.stuck_radius {
            if self.stuck.is_stuck {
                self.clear_stuck(position);
            }
            self.stuck.update_not_stuck(now, position);
            return;
        }

        if self.stuck.is_stuck {
            if self.stuck.recheck.is_elapsed(now) {
                self.stuck.count += 1;
                self.stuck
                    .recheck
                    .start(now, self.config.stuck_recheck_interval);
                self.emit(LocomotionEvent::Stuck {
                    position,
                    count: self.stuck.count,
                });
                self.recover_from_stuck(world);
            }
            return;
        }

        let quarter_speed = self.config.min_movement_speed() / 4.0;
        let stuck_time = self.config.stuck_radius / quarter_speed;
        if self.stuck.progress.is_greater_than(now, stuck_time) {
            self.stuck.is_stuck = true;
            self.stuck.stuck_since = Some(now);
            self.stuck.count += 1;
            self.stuck
                .recheck
                .start(now, self.config.stuck_recheck_interval);
            debug!(
                "[Locomotion stuck] Stuck at {:?} (count {})",
                position, self.stuck.count
            );
            self.emit(LocomotionEvent::Stuck {
                position,
                count: self.stuck.count,
            });
            self.recover_from_stuck(world);
        }
    }

    fn clear_stuck(&mut self, position: Vec3) {
        debug!("[Locomotion stuck] Unstuck at {:?}", position);
        self.stuck.is_stuck = false;
        self.stuck.stuck_since = None;
        self.stuck.recheck.invalidate();
        self.emit(LocomotionEvent::Unstuck { position });
    }

    /// Position the current stuck episode started from.
    pub fn stuck_anchor(&self) -> Option<Vec3> {
        self.stuck.is_stuck.then_some(self.stuck.anchor)
    }

    pub fn stuck_since(&self) -> Option<f32> {
        self.stuck.stuck_since
    }

    fn recover_from_stuck(&mut self, world: &dyn World) {
        let count = self.stuck.count;
        let position = self.body.position;

        if count >= self.config.unstuck_fatal_count {
            error!(
                "[Locomotion stuck] Agent stuck {} times in a row at {:?}, terminating",
                count, position
            );
            self.intents.request_suicide();
            self.emit(LocomotionEvent::Fatal { position, count });
            return;
        }

        let teleport_enabled = self
            .config
            .unstuck_teleport_count
            .is_some_and(|threshold| count >= threshold);
        if teleport_enabled {
            if let Some(goal) = self.unstuck_goal {
                warn!(
                    "[Locomotion stuck] Teleporting from {:?} to {:?} after {} attempts",
                    position, goal, count
                );
                self.intents.request_teleport(goal);
                self.emit(LocomotionEvent::UnstuckTeleport { to: goal });
                self.stuck = StuckStatus::default();
                return;
            }
        }

        if self.obstacle.is_none() {
            if let Some(obstacle) = self.obstacle_ahead(world) {
                if self.break_obstacle(obstacle, world).is_ok() {
                    return;
                }
            }
        }

        let jumped = if count % 2 == 1 {
            self.jump()
        } else {
            self.crouch_jump()
        };
        if let Err(err) = jumped {
            debug!("[Locomotion stuck] Recovery jump skipped: {}", err);
        }
        let side = if self.rng.gen_bool(0.5) {
            Button::Left
        } else {
            Button::Right
        };
        self.intents.press(side, 0.5);
        if let Some(goal) = self.unstuck_goal {
            self.move_towards(goal, MoveWeight::PRIORITY);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::arbitration::MoveWeight;
    use crate::body::BodyState;
    use crate::events::LocomotionEvent;
    use crate::locomotion::test_support::*;
    use crate::locomotion::Locomotion;
    use crate::sandbox::SandboxWorld;
    use bevy::prelude::*;

    const DT: f32 = 0.1;

    /// Ticks with a standing-still body while requesting movement.
    fn push_against_wall(loco: &mut Locomotion, world: &SandboxWorld, from: f32, until: f32, body: BodyState) -> f32 {
        let mut now = from;
        while now < until {
            loco.update(now, body, world);
            loco.move_towards(Vec3::new(1000.0, 0.0, 0.0), MoveWeight::NAVIGATOR);
            now += DT;
        }
        now
    }

    #[test]
    fn idle_agents_are_never_stuck() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState::default();
        let mut now = 0.0;
        while now < 20.0 {
            loco.update(now, body, &world);
            now += DT;
        }
        assert!(!loco.is_stuck());
    }

    #[test]
    fn blocked_agent_becomes_stuck_then_recovers_once_it_moves() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState::default();
        // 100 / (120 / 4) = 3.33 seconds without progress.
        let now = push_against_wall(&mut loco, &world, 0.0, 3.0, body);
        assert!(!loco.is_stuck());
        let now = push_against_wall(&mut loco, &world, now, 3.6, body);
        assert!(loco.is_stuck());
        let anchor = loco.stuck_anchor().expect("stuck anchor");
        assert!(anchor.distance(body.position) < loco.config().stuck_radius);

        let moved = BodyState::at(Vec3::new(60.0, 0.0, 0.0));
        loco.update(now, moved, &world);
        assert!(loco.is_stuck(), "60 units is inside the stuck radius");
        let moved = BodyState::at(Vec3::new(100.0, 0.0, 0.0));
        loco.update(now + DT, moved, &world);
        assert!(!loco.is_stuck(), "clears within one evaluation");
        let events = loco.take_events();
        assert!(events.iter().any(|e| matches!(e, LocomotionEvent::Stuck { .. })));
        assert!(events.iter().any(|e| matches!(e, LocomotionEvent::Unstuck { .. })));
    }

    #[test]
    fn escalation_teleports_then_terminates() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState::default();
        push_against_wall(&mut loco, &world, 0.0, 30.0, body);
        // No unstuck goal: teleport is skipped and the counter reaches fatal.
        assert!(loco.input_frame().suicide);
        assert!(loco
            .take_events()
            .iter()
            .any(|e| matches!(e, LocomotionEvent::Fatal { .. })));

        let mut loco = locomotion();
        loco.set_unstuck_goal(Some(Vec3::new(500.0, 0.0, 0.0)));
        let mut now = 0.0;
        let mut teleported = None;
        while now < 30.0 && teleported.is_none() {
            loco.update(now, body, &world);
            loco.move_towards(Vec3::new(1000.0, 0.0, 0.0), MoveWeight::NAVIGATOR);
            teleported = loco.input_frame().teleport;
            now += DT;
        }
        assert_eq!(teleported, Some(Vec3::new(500.0, 0.0, 0.0)));
        assert!(!loco.input_frame().suicide);
        assert!(!loco.is_stuck(), "teleport resets the detector");
    }

    #[test]
    fn stuck_count_survives_idle_periods() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState::default();
        let now = push_against_wall(&mut loco, &world, 0.0, 3.6, body);
        assert!(loco.is_stuck());
        assert_eq!(loco.stuck_count(), 1);

        // Standing still by choice clears the episode but not the count.
        loco.update(now, body, &world);
        loco.update(now + 0.5, body, &world);
        assert!(!loco.is_stuck());
        assert_eq!(loco.stuck_count(), 1);

        push_against_wall(&mut loco, &world, now + 0.6, now + 4.3, body);
        assert!(loco.is_stuck());
        assert_eq!(loco.stuck_count(), 2);

        loco.reset();
        assert_eq!(loco.stuck_count(), 0);
    }
}
