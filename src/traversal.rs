//! Cheap geometric probes used before committing to a route or maneuver.

use bevy::prelude::*;
use serde::Serialize;

use crate::config::LocomotionConfig;
use crate::locomotion::Locomotion;
use crate::nav::{ObstacleId, World};
use crate::trace::{distance_2d, ground_direction, Hull, TraceQuery};

/// Outcome of a standing-hull sweep between two feet positions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Traversability {
    pub clear: bool,
    pub fraction: f32,
    pub obstacle: Option<ObstacleId>,
}

/// Sweeps the standing hull, lifted by one step, from `from` to `to`. A
/// clear sweep still fails when `to` has no ground within a survivable drop.
pub fn is_potentially_traversable<W: TraceQuery + ?Sized>(
    world: &W,
    config: &LocomotionConfig,
    from: Vec3,
    to: Vec3,
) -> Traversability {
    let lift = Vec3::Z * config.step_height;
    let hull = Hull::column(
        config.hull_width,
        0.0,
        config.stand_height - config.step_height,
    );
    let trace = world.trace_hull(from + lift, to + lift, hull);
    let landing = || {
        world
            .trace_line(to + lift, to - Vec3::Z * config.max_drop_height)
            .did_hit()
    };
    Traversability {
        clear: !trace.did_hit() && landing(),
        fraction: if trace.start_solid { 0.0 } else { trace.fraction },
        obstacle: trace.obstacle,
    }
}

/// Probes for ground every half hull width along `from -> to`. Returns the
/// ground distance from `from` to the first probe that finds nothing within
/// jump height below the interpolated path.
pub fn has_potential_gap<W: TraceQuery + ?Sized>(
    world: &W,
    config: &LocomotionConfig,
    from: Vec3,
    to: Vec3,
) -> Option<f32> {
    let length = distance_2d(from, to);
    let spacing = config.hull_half_width();
    if length < spacing {
        return None;
    }
    let samples = (length / spacing).floor() as u32;
    (1..=samples).find_map(|i| {
        let along = i as f32 * spacing;
        let probe = from.lerp(to, along / length);
        let top = probe + Vec3::Z * config.step_height;
        let bottom = probe - Vec3::Z * config.max_jump_height;
        (!world.trace_line(top, bottom).did_hit()).then_some(along)
    })
}

/// True when there is no ground just ahead of `position` along `forward`.
pub fn is_gap<W: TraceQuery + ?Sized>(
    world: &W,
    config: &LocomotionConfig,
    position: Vec3,
    forward: Vec3,
) -> bool {
    let dir = Vec3::new(forward.x, forward.y, 0.0).normalize_or_zero();
    if dir == Vec3::ZERO {
        return false;
    }
    let ahead = position + dir * config.hull_width * 2.0;
    has_potential_gap(world, config, position, ahead).is_some()
}

impl Locomotion {
    pub fn is_potentially_traversable(&self, to: Vec3, world: &dyn World) -> Traversability {
        is_potentially_traversable(world, &self.config, self.body.position, to)
    }

    pub fn has_potential_gap(&self, to: Vec3, world: &dyn World) -> Option<f32> {
        has_potential_gap(world, &self.config, self.body.position, to)
    }

    /// Gap check along the current steering goal, or the body heading when
    /// idle.
    pub fn is_gap_ahead(&self, world: &dyn World) -> bool {
        let position = self.body.position;
        let heading = self
            .intents
            .move_goal()
            .map(|goal| ground_direction(position, goal))
            .filter(|dir| *dir != Vec3::ZERO)
            .unwrap_or(self.body.forward);
        is_gap(world, &self.config, position, heading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::Obstacle;
    use crate::sandbox::SandboxWorld;

    fn two_ledges() -> SandboxWorld {
        SandboxWorld::default()
            .with_solid(Vec3::new(-500.0, -500.0, -64.0), Vec3::new(0.0, 500.0, 0.0))
            .with_solid(Vec3::new(200.0, -500.0, -64.0), Vec3::new(700.0, 500.0, 0.0))
    }

    #[test]
    fn flat_ground_is_traversable_and_gapless() {
        let world = two_ledges();
        let config = LocomotionConfig::default();
        let from = Vec3::new(-300.0, 0.0, 0.0);
        let to = Vec3::new(-20.0, 0.0, 0.0);
        let probe = is_potentially_traversable(&world, &config, from, to);
        assert!(probe.clear);
        assert_eq!(probe.fraction, 1.0);
        assert_eq!(has_potential_gap(&world, &config, from, to), None);
        assert!(!is_gap(&world, &config, from, Vec3::X));
    }

    #[test]
    fn gap_is_found_at_the_first_empty_probe() {
        let world = two_ledges();
        let config = LocomotionConfig::default();
        let from = Vec3::new(-40.0, 0.0, 0.0);
        let to = Vec3::new(300.0, 0.0, 0.0);
        // Probes at -24, -8, +8: the third one is over the pit.
        assert_eq!(has_potential_gap(&world, &config, from, to), Some(48.0));
        assert!(is_gap(&world, &config, Vec3::new(-10.0, 0.0, 0.0), Vec3::X));
        assert!(!is_gap(&world, &config, Vec3::new(-10.0, 0.0, 0.0), Vec3::NEG_X));
    }

    #[test]
    fn bottomless_drops_are_not_traversable() {
        let world = two_ledges();
        let config = LocomotionConfig::default();
        let from = Vec3::new(-300.0, 0.0, 0.0);
        let probe = is_potentially_traversable(&world, &config, from, Vec3::new(100.0, 0.0, 0.0));
        assert!(!probe.clear);
        assert_eq!(probe.fraction, 1.0);
        assert_eq!(probe.obstacle, None);

        // Ground 300 units below the edge is within max_drop_height.
        let pit = two_ledges().with_solid(
            Vec3::new(0.0, -500.0, -364.0),
            Vec3::new(200.0, 500.0, -300.0),
        );
        assert!(is_potentially_traversable(&pit, &config, from, Vec3::new(100.0, 0.0, 0.0)).clear);
    }

    #[test]
    fn walls_and_props_block_the_hull() {
        let world = SandboxWorld::default()
            .with_solid(Vec3::new(-500.0, -500.0, -64.0), Vec3::new(500.0, 500.0, 0.0))
            .with_obstacle(
                Obstacle {
                    id: ObstacleId(4),
                    position: Vec3::new(100.0, 0.0, 32.0),
                    health: 50.0,
                    breakable: true,
                    useable: false,
                },
                Vec3::new(90.0, -40.0, 0.0),
                Vec3::new(110.0, 40.0, 64.0),
            );
        let config = LocomotionConfig::default();
        let probe =
            is_potentially_traversable(&world, &config, Vec3::ZERO, Vec3::new(200.0, 0.0, 0.0));
        assert!(!probe.clear);
        assert_eq!(probe.obstacle, Some(ObstacleId(4)));
        // Contact at x = 90 - 16 = 74 of 200.
        assert!((probe.fraction - 0.37).abs() < 1e-3);
    }

    #[test]
    fn agent_probes_follow_its_position_and_goal() {
        let world = two_ledges();
        let mut loco = crate::locomotion::test_support::locomotion();
        loco.update(0.0, crate::body::BodyState::at(Vec3::new(-10.0, 0.0, 0.0)), &world);
        // Facing +X by default, toward the pit.
        assert!(loco.is_gap_ahead(&world));

        loco.move_towards(Vec3::new(-300.0, 0.0, 0.0), crate::arbitration::MoveWeight::DEFAULT);
        assert!(!loco.is_gap_ahead(&world));
        assert!(loco.is_potentially_traversable(Vec3::new(-200.0, 0.0, 0.0), &world).clear);
        assert_eq!(loco.has_potential_gap(Vec3::new(300.0, 0.0, 0.0), &world), Some(16.0));
    }
}
