use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Physical state of the agent as reported by the host each tick.
#[derive(Component, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    /// Feet position.
    pub position: Vec3,
    pub velocity: Vec3,
    /// Horizontal view direction.
    pub forward: Vec3,
    pub on_ground: bool,
    pub on_ladder: bool,
    pub crouched: bool,
    /// Whether the jump control was held during the previous tick.
    pub jump_held: bool,
    pub alive: bool,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            forward: Vec3::X,
            on_ground: true,
            on_ladder: false,
            crouched: false,
            jump_held: false,
            alive: true,
        }
    }
}

impl BodyState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn ground_velocity(&self) -> Vec3 {
        Vec3::new(self.velocity.x, self.velocity.y, 0.0)
    }

    pub fn ground_speed(&self) -> f32 {
        self.ground_velocity().length()
    }

    pub fn is_airborne(&self) -> bool {
        !self.on_ground && !self.on_ladder
    }

    /// Unit right vector derived from `forward` (Z up).
    pub fn right(&self) -> Vec3 {
        let forward = Vec3::new(self.forward.x, self.forward.y, 0.0).normalize_or_zero();
        Vec3::new(forward.y, -forward.x, 0.0)
    }
}
