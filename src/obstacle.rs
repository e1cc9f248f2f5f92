//! Breaking or using props that block the route.

use bevy::prelude::*;

use crate::arbitration::MoveWeight;
use crate::events::LocomotionEvent;
use crate::input::Button;
use crate::locomotion::{Locomotion, ManeuverError};
use crate::nav::{ObstacleId, World};
use crate::timers::CountdownTimer;

#[derive(Clone, Debug)]
pub(crate) struct ObstacleBreak {
    pub(crate) obstacle: ObstacleId,
    pub(crate) timeout: CountdownTimer,
}

impl Locomotion {
    /// Starts attacking a breakable obstacle until it is gone or the
    /// health-derived timeout runs out.
    pub fn break_obstacle(&mut self, id: ObstacleId, world: &dyn World) -> Result<(), ManeuverError> {
        let obstacle = world.obstacle(id).ok_or(ManeuverError::MissingObstacle)?;
        if !obstacle.breakable {
            return Err(ManeuverError::NotBreakable);
        }
        let timeout = (obstacle.health / self.config.obstacle_damage_per_second)
            .max(self.config.obstacle_min_break_time);
        let mut timer = CountdownTimer::default();
        timer.start(self.now, timeout);
        self.obstacle = Some(ObstacleBreak {
            obstacle: id,
            timeout: timer,
        });
        debug!(
            "[Locomotion obstacle] Breaking {:?} (health {}, timeout {:.1}s)",
            id, obstacle.health, timeout
        );
        self.emit(LocomotionEvent::ObstacleBreakStarted {
            obstacle: id,
            timeout,
        });
        Ok(())
    }

    pub fn breaking_obstacle(&self) -> Option<ObstacleId> {
        self.obstacle.as_ref().map(|run| run.obstacle)
    }

    pub(crate) fn obstacle_break_update(&mut self, world: &dyn World) {
        let Some(run) = self.obstacle.take() else {
            return;
        };
        let id = run.obstacle;
        let Some(obstacle) = world.obstacle(id).filter(|o| !o.is_destroyed()) else {
            self.emit(LocomotionEvent::ObstacleBreakFinished {
                obstacle: id,
                destroyed: true,
            });
            return;
        };

        if run.timeout.is_elapsed(self.now) {
            warn!(
                "[Locomotion obstacle] Could not break {:?} in {:.1}s",
                id,
                run.timeout.duration()
            );
            if self.config.obstacle_force_destroy {
                self.intents.request_force_destroy(id);
            }
            self.emit(LocomotionEvent::ObstacleBreakFinished {
                obstacle: id,
                destroyed: self.config.obstacle_force_destroy,
            });
            return;
        }

        let position = self.body.position;
        self.face_towards(obstacle.position, true);
        if position.distance(obstacle.position) <= self.config.obstacle_attack_range {
            self.intents.press(Button::Attack, 0.0);
            if obstacle.position.z < position.z + self.config.crouch_height * 0.5 {
                self.intents.press(Button::Crouch, 0.0);
            }
        } else {
            self.move_towards(obstacle.position, MoveWeight::PRIORITY);
        }
        self.obstacle = Some(run);
    }

    /// Breakable obstacle directly in the agent's way, if any.
    pub(crate) fn obstacle_ahead(&self, world: &dyn World) -> Option<ObstacleId> {
        let from = self.body.position + Vec3::Z * (self.config.step_height + 1.0);
        let heading = self
            .intents
            .recent_move_goal()
            .map(|goal| crate::trace::ground_direction(self.body.position, goal))
            .filter(|dir| *dir != Vec3::ZERO)
            .unwrap_or(self.body.forward);
        let to = from + heading * self.config.obstacle_attack_range;
        let trace = world.trace_line(from, to);
        trace
            .obstacle
            .filter(|&id| world.obstacle(id).is_some_and(|o| o.breakable))
    }

    /// Reacts to an obstacle the path follower ran into on the way to
    /// `goal`: useable props are used, breakable ones broken.
    pub fn obstacle_on_path(&mut self, id: ObstacleId, goal: Vec3, world: &dyn World) -> Result<(), ManeuverError> {
        let obstacle = world.obstacle(id).ok_or(ManeuverError::MissingObstacle)?;
        if obstacle.useable {
            self.face_towards(obstacle.position, true);
            if self.body.position.distance(obstacle.position) <= self.config.use_range {
                self.intents.press(Button::Use, 0.0);
            } else {
                self.move_towards(goal, MoveWeight::PRIORITY);
            }
            return Ok(());
        }
        if self.obstacle.is_some() {
            return Ok(());
        }
        self.break_obstacle(id, world)
    }
}

#[cfg(test)]
mod tests {
    use crate::arbitration::MoveWeight;
    use crate::body::BodyState;
    use crate::events::LocomotionEvent;
    use crate::input::Button;
    use crate::locomotion::test_support::*;
    use crate::locomotion::ManeuverError;
    use crate::nav::{Obstacle, ObstacleId};
    use crate::sandbox::SandboxWorld;
    use bevy::prelude::*;

    fn crate_world(health: f32, breakable: bool) -> SandboxWorld {
        flat_world().with_obstacle(
            Obstacle {
                id: ObstacleId(9),
                position: Vec3::new(60.0, 0.0, 24.0),
                health,
                breakable,
                useable: false,
            },
            Vec3::new(40.0, -24.0, 0.0),
            Vec3::new(80.0, 24.0, 48.0),
        )
    }

    #[test]
    fn breaking_attacks_until_destroyed() {
        let mut world = crate_world(150.0, true);
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        loco.break_obstacle(ObstacleId(9), &world)
            .expect("breakable");
        loco.update(0.1, BodyState::default(), &world);
        assert!(loco.input_frame().is_pressed(Button::Attack));
        assert!(loco.is_controlling_movements());

        world.damage_obstacle(ObstacleId(9), 150.0);
        loco.update(0.2, BodyState::default(), &world);
        assert!(!loco.is_breaking_obstacle());
        assert!(loco.take_events().iter().any(|e| matches!(
            e,
            LocomotionEvent::ObstacleBreakFinished { destroyed: true, .. }
        )));
    }

    #[test]
    fn timeout_requests_forced_destroy() {
        let world = crate_world(150.0, true);
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        loco.break_obstacle(ObstacleId(9), &world)
            .expect("breakable");
        // 150 health at 100 dps gives 1.5 seconds.
        loco.update(1.4, BodyState::default(), &world);
        assert!(loco.is_breaking_obstacle());
        loco.update(1.5, BodyState::default(), &world);
        assert!(!loco.is_breaking_obstacle());
        assert_eq!(loco.input_frame().force_destroy, Some(ObstacleId(9)));
    }

    #[test]
    fn unbreakable_obstacles_are_refused() {
        let world = crate_world(150.0, false);
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        assert_eq!(
            loco.break_obstacle(ObstacleId(9), &world),
            Err(ManeuverError::NotBreakable)
        );
        assert_eq!(
            loco.break_obstacle(ObstacleId(77), &world),
            Err(ManeuverError::MissingObstacle)
        );
    }

    #[test]
    fn obstacle_ahead_follows_the_steering_goal() {
        let world = crate_world(150.0, true);
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        loco.move_towards(Vec3::new(500.0, 0.0, 0.0), MoveWeight::NAVIGATOR);
        assert_eq!(loco.obstacle_ahead(&world), Some(ObstacleId(9)));
        loco.update(0.1, BodyState::default(), &world);
        loco.move_towards(Vec3::new(-500.0, 0.0, 0.0), MoveWeight::NAVIGATOR);
        assert_eq!(loco.obstacle_ahead(&world), None);

        loco.obstacle_on_path(ObstacleId(9), Vec3::new(500.0, 0.0, 0.0), &world)
            .expect("breakable obstacle accepted");
        assert_eq!(loco.breaking_obstacle(), Some(ObstacleId(9)));
    }

    #[test]
    fn stuck_agent_breaks_the_crate_it_steers_into_while_looking_away() {
        let world = crate_world(400.0, true);
        let mut loco = locomotion();
        let body = BodyState {
            forward: Vec3::Y,
            ..BodyState::default()
        };
        let mut now: f32 = 0.0;
        while now < 6.0 && !loco.is_breaking_obstacle() {
            loco.update(now, body, &world);
            loco.move_towards(Vec3::new(500.0, 0.0, 0.0), MoveWeight::NAVIGATOR);
            now += 0.1;
        }
        assert!(loco.is_stuck());
        assert_eq!(loco.breaking_obstacle(), Some(ObstacleId(9)));
    }
}
