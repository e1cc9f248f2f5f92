use bevy::prelude::*;

use crate::nav::ObstacleId;

/// Outcome of a line or hull sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trace {
    /// Portion of the sweep completed before the first contact, in `[0, 1]`.
    pub fraction: f32,
    pub end: Vec3,
    pub normal: Vec3,
    /// Breakable or useable prop that stopped the sweep, if any.
    pub obstacle: Option<ObstacleId>,
    pub start_solid: bool,
}

impl Trace {
    /// A sweep that reached `to` unobstructed.
    pub fn clear(to: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end: to,
            normal: Vec3::ZERO,
            obstacle: None,
            start_solid: false,
        }
    }

    pub fn did_hit(&self) -> bool {
        self.start_solid || self.fraction < 1.0
    }
}

/// Axis-aligned hull relative to the agent origin (feet).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hull {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Hull {
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// Square hull of the given width spanning `bottom..top` above the feet.
    pub fn column(width: f32, bottom: f32, top: f32) -> Self {
        let half = width * 0.5;
        Self {
            mins: Vec3::new(-half, -half, bottom),
            maxs: Vec3::new(half, half, top),
        }
    }
}

/// Collision queries against world geometry. Implemented by the host.
pub trait TraceQuery {
    fn trace_line(&self, from: Vec3, to: Vec3) -> Trace;
    fn trace_hull(&self, from: Vec3, to: Vec3, hull: Hull) -> Trace;
}

/// Result of sweeping a point against a single box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlabHit {
    /// Distance along the unit direction at which the sweep enters the box.
    pub distance: f32,
    pub normal: Vec3,
    pub start_solid: bool,
}

/// Sweeps a point along `dir_normalized` against the box `min..max`.
///
/// Touching a face without penetrating does not count as a hit, so a hull
/// resting on a floor can still slide along it or leave it.
pub fn ray_box(
    origin: Vec3,
    dir_normalized: Vec3,
    max_distance: f32,
    min: Vec3,
    max: Vec3,
) -> Option<SlabHit> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut enter_normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir_normalized[axis];
        let (mn, mx) = (min[axis], max[axis]);
        if d.abs() < 1e-6 {
            if o <= mn || o >= mx {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (mn - o) * inv;
        let mut t2 = (mx - o) * inv;
        let mut normal = Vec3::ZERO;
        normal[axis] = -d.signum();
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_enter {
            t_enter = t1;
            enter_normal = normal;
        }
        t_exit = t_exit.min(t2);
        if t_enter >= t_exit {
            return None;
        }
    }

    if t_exit <= 0.0 {
        return None;
    }
    if t_enter < 0.0 {
        return Some(SlabHit {
            distance: 0.0,
            normal: Vec3::ZERO,
            start_solid: true,
        });
    }
    if t_enter <= max_distance {
        Some(SlabHit {
            distance: t_enter,
            normal: enter_normal,
            start_solid: false,
        })
    } else {
        None
    }
}

/// Sweeps `hull` from `from` to `to` against one box by expanding the box
/// with the hull extents and casting the origin through it.
pub fn sweep_box(from: Vec3, to: Vec3, hull: Hull, min: Vec3, max: Vec3) -> Option<SlabHit> {
    let delta = to - from;
    let length = delta.length();
    let expanded_min = min - hull.maxs;
    let expanded_max = max - hull.mins;
    if length <= 1e-4 {
        let inside = (0..3).all(|axis| from[axis] > expanded_min[axis] && from[axis] < expanded_max[axis]);
        return inside.then_some(SlabHit {
            distance: 0.0,
            normal: Vec3::ZERO,
            start_solid: true,
        });
    }
    ray_box(from, delta / length, length, expanded_min, expanded_max)
}

/// Unit direction from `from` to `to` projected onto the ground plane.
pub fn ground_direction(from: Vec3, to: Vec3) -> Vec3 {
    let delta = to - from;
    Vec3::new(delta.x, delta.y, 0.0).normalize_or_zero()
}

pub fn distance_2d(a: Vec3, b: Vec3) -> f32 {
    a.truncate().distance(b.truncate())
}

/// Rotates a vector around the Z axis by `degrees`.
pub fn rotate_yaw(v: Vec3, degrees: f32) -> Vec3 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec3::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_box_reports_entry_distance_and_normal() {
        let hit = ray_box(
            Vec3::new(-10.0, 0.5, 0.5),
            Vec3::X,
            100.0,
            Vec3::ZERO,
            Vec3::ONE,
        )
        .expect("ray should hit the box");
        assert!((hit.distance - 10.0).abs() < 1e-4);
        assert_eq!(hit.normal, Vec3::NEG_X);
        assert!(!hit.start_solid);
    }

    #[test]
    fn touching_a_face_is_not_a_hit() {
        // Sliding along the top face of a floor.
        assert!(ray_box(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::X,
            50.0,
            Vec3::new(-100.0, -100.0, -10.0),
            Vec3::new(100.0, 100.0, 0.0),
        )
        .is_none());
        // Leaving the floor upwards.
        assert!(ray_box(
            Vec3::ZERO,
            Vec3::Z,
            50.0,
            Vec3::new(-100.0, -100.0, -10.0),
            Vec3::new(100.0, 100.0, 0.0),
        )
        .is_none());
        // Probing down into the floor hits immediately.
        let probe = ray_box(
            Vec3::ZERO,
            Vec3::NEG_Z,
            2.0,
            Vec3::new(-100.0, -100.0, -10.0),
            Vec3::new(100.0, 100.0, 0.0),
        )
        .expect("downward probe hits floor");
        assert_eq!(probe.distance, 0.0);
        assert_eq!(probe.normal, Vec3::Z);
    }

    #[test]
    fn sweep_box_accounts_for_hull_extents() {
        let hull = Hull::column(32.0, 0.0, 72.0);
        let wall_min = Vec3::new(100.0, -50.0, 0.0);
        let wall_max = Vec3::new(120.0, 50.0, 200.0);
        let hit = sweep_box(Vec3::ZERO, Vec3::new(200.0, 0.0, 0.0), hull, wall_min, wall_max)
            .expect("hull sweep should hit the wall");
        assert!((hit.distance - 84.0).abs() < 1e-3);

        let above = sweep_box(
            Vec3::new(0.0, 0.0, 200.0),
            Vec3::new(200.0, 0.0, 200.0),
            hull,
            wall_min,
            wall_max,
        );
        assert!(above.is_none(), "hull resting on top of the wall passes");
    }

    #[test]
    fn rotate_yaw_quarter_turn() {
        let v = rotate_yaw(Vec3::X, 90.0);
        assert!((v - Vec3::Y).length() < 1e-5);
    }
}
