//! Launch-velocity solvers used by the bounded velocity corrections.

use bevy::prelude::*;

/// Low-arc launch velocity of magnitude `speed` that lands at `to` under
/// `gravity` (positive, pulling along -Z). `None` when out of range.
pub fn solve_launch_velocity(from: Vec3, to: Vec3, gravity: f32, speed: f32) -> Option<Vec3> {
    let delta = to - from;
    let horizontal = Vec2::new(delta.x, delta.y);
    let d = horizontal.length();
    let h = delta.z;
    let v2 = speed * speed;

    if d < 1e-3 {
        return (h <= 0.0 || v2 >= 2.0 * gravity * h).then_some(Vec3::Z * speed);
    }

    let discriminant = v2 * v2 - gravity * (gravity * d * d + 2.0 * h * v2);
    if discriminant < 0.0 {
        return None;
    }
    let tan = (v2 - discriminant.sqrt()) / (gravity * d);
    let angle = tan.atan();
    let dir = horizontal / d;
    Some(Vec3::new(
        dir.x * speed * angle.cos(),
        dir.y * speed * angle.cos(),
        speed * angle.sin(),
    ))
}

/// Velocity that travels from `from` to `to` in exactly `time` seconds.
pub fn velocity_to_reach(from: Vec3, to: Vec3, gravity: f32, time: f32) -> Vec3 {
    let time = time.max(1e-3);
    let delta = to - from;
    Vec3::new(
        delta.x / time,
        delta.y / time,
        delta.z / time + 0.5 * gravity * time,
    )
}

/// Flight time for a jump of vertical speed `vz` to come back down to a
/// surface `dz` above the takeoff point, if it gets there at all.
pub fn time_to_land(vz: f32, dz: f32, gravity: f32) -> Option<f32> {
    let discriminant = vz * vz - 2.0 * gravity * dz;
    if discriminant < 0.0 {
        return None;
    }
    Some((vz + discriminant.sqrt()) / gravity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(from: Vec3, velocity: Vec3, gravity: f32, horizontal_target: f32) -> Vec3 {
        let horizontal_speed = velocity.truncate().length();
        let t = horizontal_target / horizontal_speed;
        from + velocity * t - Vec3::Z * 0.5 * gravity * t * t
    }

    #[test]
    fn launch_solution_lands_on_target() {
        let from = Vec3::ZERO;
        let to = Vec3::new(300.0, 0.0, 50.0);
        let velocity = solve_launch_velocity(from, to, 800.0, 700.0).expect("reachable");
        assert!((velocity.length() - 700.0).abs() < 1e-2);
        let landed = simulate(from, velocity, 800.0, 300.0);
        assert!(landed.distance(to) < 1.0, "landed at {landed:?}");
    }

    #[test]
    fn out_of_range_targets_have_no_solution() {
        assert!(solve_launch_velocity(Vec3::ZERO, Vec3::new(5000.0, 0.0, 0.0), 800.0, 300.0).is_none());
        assert!(solve_launch_velocity(Vec3::ZERO, Vec3::new(0.0, 0.0, 500.0), 800.0, 300.0).is_none());
        assert!(solve_launch_velocity(Vec3::ZERO, Vec3::new(0.0, 0.0, 50.0), 800.0, 300.0).is_some());
    }

    #[test]
    fn timed_velocity_reaches_target() {
        let from = Vec3::new(10.0, 20.0, 0.0);
        let to = Vec3::new(110.0, -30.0, 40.0);
        let v = velocity_to_reach(from, to, 800.0, 0.5);
        let end = from + v * 0.5 - Vec3::Z * 0.5 * 800.0 * 0.25;
        assert!(end.distance(to) < 1e-3);
        assert!(time_to_land(400.0, 0.0, 800.0).is_some_and(|t| (t - 1.0).abs() < 1e-5));
        assert!(time_to_land(100.0, 57.0, 800.0).is_none());
    }
}
