//! In-memory world made of axis-aligned boxes plus navigation entities.
//!
//! Used by the headless runner and the tests; real hosts implement
//! [`TraceQuery`] and [`NavQuery`] over their own collision data.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::nav::{
    AreaId, Elevator, ElevatorId, Ladder, LadderId, NavArea, NavQuery, Obstacle, ObstacleId,
};
use crate::trace::{sweep_box, Hull, Trace, TraceQuery};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolidBox {
    pub min: Vec3,
    pub max: Vec3,
    /// Set when the box is a breakable or useable prop.
    #[serde(default)]
    pub obstacle: Option<ObstacleId>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxWorld {
    pub solids: Vec<SolidBox>,
    pub ladders: Vec<Ladder>,
    pub areas: Vec<NavArea>,
    pub elevators: Vec<Elevator>,
    pub obstacles: Vec<Obstacle>,
}

impl SandboxWorld {
    pub fn with_solid(mut self, min: Vec3, max: Vec3) -> Self {
        self.solids.push(SolidBox {
            min,
            max,
            obstacle: None,
        });
        self
    }

    pub fn with_ladder(mut self, ladder: Ladder) -> Self {
        self.ladders.push(ladder);
        self
    }

    pub fn with_area(mut self, id: AreaId, center: Vec3) -> Self {
        self.areas.push(NavArea { id, center });
        self
    }

    pub fn with_elevator(mut self, elevator: Elevator) -> Self {
        self.elevators.push(elevator);
        self
    }

    /// Adds a prop that blocks traces inside `min..max`.
    pub fn with_obstacle(mut self, obstacle: Obstacle, min: Vec3, max: Vec3) -> Self {
        self.solids.push(SolidBox {
            min,
            max,
            obstacle: Some(obstacle.id),
        });
        self.obstacles.push(obstacle);
        self
    }

    /// Marks which floor the lift platform currently rests at. `None` means
    /// it is travelling between floors.
    pub fn set_elevator_at(&mut self, id: ElevatorId, area: Option<AreaId>) {
        if let Some(elevator) = self.elevators.iter_mut().find(|e| e.id == id) {
            for floor in &mut elevator.floors {
                floor.is_here = Some(floor.area) == area;
            }
        }
    }

    /// Applies damage to a prop, removing its collision once destroyed.
    pub fn damage_obstacle(&mut self, id: ObstacleId, amount: f32) {
        let Some(obstacle) = self.obstacles.iter_mut().find(|o| o.id == id) else {
            return;
        };
        obstacle.health -= amount;
        if obstacle.is_destroyed() {
            self.remove_obstacle(id);
        }
    }

    pub fn remove_obstacle(&mut self, id: ObstacleId) {
        self.obstacles.retain(|o| o.id != id);
        self.solids.retain(|s| s.obstacle != Some(id));
    }

    pub fn remove_ladder(&mut self, id: LadderId) {
        self.ladders.retain(|l| l.id != id);
    }

    fn sweep(&self, from: Vec3, to: Vec3, hull: Hull) -> Trace {
        let length = from.distance(to);
        let mut best: Option<(f32, Vec3, Option<ObstacleId>, bool)> = None;
        for solid in &self.solids {
            let Some(hit) = sweep_box(from, to, hull, solid.min, solid.max) else {
                continue;
            };
            if best.map_or(true, |(distance, ..)| hit.distance < distance) {
                best = Some((hit.distance, hit.normal, solid.obstacle, hit.start_solid));
            }
        }
        match best {
            None => Trace::clear(to),
            Some((distance, normal, obstacle, start_solid)) => {
                let fraction = if length > 1e-4 {
                    (distance / length).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                Trace {
                    fraction,
                    end: from.lerp(to, fraction),
                    normal,
                    obstacle,
                    start_solid,
                }
            }
        }
    }
}

impl TraceQuery for SandboxWorld {
    fn trace_line(&self, from: Vec3, to: Vec3) -> Trace {
        self.sweep(from, to, Hull::new(Vec3::ZERO, Vec3::ZERO))
    }

    fn trace_hull(&self, from: Vec3, to: Vec3, hull: Hull) -> Trace {
        self.sweep(from, to, hull)
    }
}

impl NavQuery for SandboxWorld {
    fn ladder(&self, id: LadderId) -> Option<Ladder> {
        self.ladders.iter().find(|l| l.id == id).cloned()
    }

    fn area(&self, id: AreaId) -> Option<NavArea> {
        self.areas.iter().find(|a| a.id == id).cloned()
    }

    fn elevator(&self, id: ElevatorId) -> Option<Elevator> {
        self.elevators.iter().find(|e| e.id == id).cloned()
    }

    fn obstacle(&self, id: ObstacleId) -> Option<Obstacle> {
        self.obstacles.iter().find(|o| o.id == id).cloned()
    }
}
