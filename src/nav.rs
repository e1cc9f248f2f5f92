//! Navigation-mesh entities the locomotion core refers to by handle.
//!
//! The host owns ladders, areas, lifts and breakable props; the core only
//! keeps ids and re-resolves them every tick, treating a missing entity as an
//! abort condition for whatever maneuver referenced it.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::trace::TraceQuery;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LadderId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElevatorId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderKind {
    /// Climbed by walking into it.
    #[default]
    Simple,
    /// Entered with the use key; dismounts at the top on its own.
    Useable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ladder {
    pub id: LadderId,
    pub top: Vec3,
    pub bottom: Vec3,
    /// Horizontal unit vector pointing away from the climbable face.
    pub normal: Vec3,
    pub width: f32,
    #[serde(default)]
    pub kind: LadderKind,
}

impl Ladder {
    pub fn length(&self) -> f32 {
        self.top.z - self.bottom.z
    }

    /// Point on the ladder axis at height `z`, clamped to the ladder ends.
    pub fn pos_at_height(&self, z: f32) -> Vec3 {
        let length = self.length();
        if length <= f32::EPSILON {
            return self.bottom;
        }
        let t = ((z - self.bottom.z) / length).clamp(0.0, 1.0);
        self.bottom.lerp(self.top, t)
    }

    /// Where the agent stands to grab the ladder from below.
    pub fn mount_point(&self, hull_half_width: f32) -> Vec3 {
        self.bottom + self.normal * (hull_half_width + 4.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavArea {
    pub id: AreaId,
    pub center: Vec3,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevatorKind {
    /// Starts moving as soon as something stands on it.
    AutoTrigger,
    Door,
    MoveLinear,
    Train,
    #[default]
    Elevator,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ButtonRef {
    pub position: Vec3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElevatorFloor {
    pub area: AreaId,
    /// Standing spot on the platform when it rests at this floor.
    pub floor_position: Vec3,
    /// Spot next to the shaft to wait at. `None` means the agent walks on
    /// directly.
    #[serde(default)]
    pub wait_position: Option<Vec3>,
    #[serde(default)]
    pub call_button: Option<ButtonRef>,
    #[serde(default)]
    pub use_button: Option<ButtonRef>,
    #[serde(default)]
    pub shootable_button: bool,
    /// True while the platform is resting at this floor.
    #[serde(default)]
    pub is_here: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Elevator {
    pub id: ElevatorId,
    pub floors: Vec<ElevatorFloor>,
    /// Travel speed in units per second, `0` when unknown.
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub kind: ElevatorKind,
}

impl Elevator {
    pub fn floor_for_area(&self, area: AreaId) -> Option<&ElevatorFloor> {
        self.floors.iter().find(|floor| floor.area == area)
    }

    pub fn floor_index(&self, area: AreaId) -> Option<usize> {
        self.floors.iter().position(|floor| floor.area == area)
    }

    pub fn length_between_floors(&self, from: AreaId, to: AreaId) -> Option<f32> {
        let a = self.floor_for_area(from)?;
        let b = self.floor_for_area(to)?;
        Some(a.floor_position.distance(b.floor_position))
    }

    /// Floor the platform currently rests at, if any.
    pub fn stopped_floor(&self) -> Option<&ElevatorFloor> {
        self.floors.iter().find(|floor| floor.is_here)
    }

    pub fn is_multi_floor(&self) -> bool {
        self.floors.len() > 2
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub position: Vec3,
    pub health: f32,
    #[serde(default)]
    pub breakable: bool,
    #[serde(default)]
    pub useable: bool,
}

impl Obstacle {
    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }
}

/// Lookups into host navigation data. Every call may return `None` once the
/// referenced entity disappears.
pub trait NavQuery {
    fn ladder(&self, id: LadderId) -> Option<Ladder>;
    fn area(&self, id: AreaId) -> Option<NavArea>;
    fn elevator(&self, id: ElevatorId) -> Option<Elevator>;
    fn obstacle(&self, id: ObstacleId) -> Option<Obstacle>;
}

/// Everything the locomotion core needs from the host world.
pub trait World: TraceQuery + NavQuery {}

impl<T: TraceQuery + NavQuery + ?Sized> World for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Ladder {
        Ladder {
            id: LadderId(1),
            top: Vec3::new(0.0, 0.0, 256.0),
            bottom: Vec3::ZERO,
            normal: Vec3::NEG_X,
            width: 32.0,
            kind: LadderKind::Simple,
        }
    }

    #[test]
    fn ladder_position_clamps_to_ends() {
        let ladder = ladder();
        assert_eq!(ladder.length(), 256.0);
        assert_eq!(ladder.pos_at_height(128.0), Vec3::new(0.0, 0.0, 128.0));
        assert_eq!(ladder.pos_at_height(-50.0), ladder.bottom);
        assert_eq!(ladder.pos_at_height(900.0), ladder.top);
        assert_eq!(ladder.mount_point(16.0), Vec3::new(-20.0, 0.0, 0.0));
    }

    #[test]
    fn elevator_floor_lookups() {
        let floor = |area: u32, z: f32, here: bool| ElevatorFloor {
            area: AreaId(area),
            floor_position: Vec3::new(0.0, 0.0, z),
            wait_position: None,
            call_button: None,
            use_button: None,
            shootable_button: false,
            is_here: here,
        };
        let lift = Elevator {
            id: ElevatorId(3),
            floors: vec![floor(10, 0.0, false), floor(11, 500.0, true), floor(12, 1000.0, false)],
            speed: 100.0,
            kind: ElevatorKind::Elevator,
        };
        assert_eq!(lift.length_between_floors(AreaId(10), AreaId(12)), Some(1000.0));
        assert_eq!(lift.length_between_floors(AreaId(10), AreaId(99)), None);
        assert_eq!(lift.stopped_floor().map(|f| f.area), Some(AreaId(11)));
        assert_eq!(lift.floor_index(AreaId(12)), Some(2));
        assert!(lift.is_multi_floor());
    }
}
