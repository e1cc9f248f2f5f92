use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::nav::ObstacleId;

/// Controls the core can press on behalf of the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Crouch,
    Use,
    Attack,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Forward,
        Button::Back,
        Button::Left,
        Button::Right,
        Button::Jump,
        Button::Crouch,
        Button::Use,
        Button::Attack,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn is_directional(self) -> bool {
        matches!(
            self,
            Button::Forward | Button::Back | Button::Left | Button::Right
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookPriority {
    Low,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LookRequest {
    pub target: Vec3,
    pub priority: LookPriority,
    pub until: f32,
}

/// Accumulates everything the core wants the actuator to do this tick.
///
/// Directional buttons and steering are per tick and replaced by every
/// honored steering call. Other buttons may be held for a duration.
#[derive(Clone, Debug, Default)]
pub struct InputIntents {
    now: f32,
    hold_until: [Option<f32>; 8],
    tapped: [bool; 8],
    wish_dir: Vec2,
    move_goal: Option<Vec3>,
    /// Goal of the last tick that steered at all.
    previous_move_goal: Option<Vec3>,
    look: Option<LookRequest>,
    velocity_override: Option<Vec3>,
    teleport: Option<Vec3>,
    suicide: bool,
    force_destroy: Option<ObstacleId>,
    desired_speed: f32,
}

impl InputIntents {
    /// Clears per-tick output and drops expired holds.
    pub fn begin_tick(&mut self, now: f32) {
        self.now = now;
        self.tapped = [false; 8];
        for hold in &mut self.hold_until {
            if hold.is_some_and(|until| now >= until) {
                *hold = None;
            }
        }
        self.wish_dir = Vec2::ZERO;
        if let Some(goal) = self.move_goal.take() {
            self.previous_move_goal = Some(goal);
        }
        self.velocity_override = None;
        self.teleport = None;
        self.force_destroy = None;
        if self.look.is_some_and(|look| now >= look.until) {
            self.look = None;
        }
    }

    /// Presses `button` now. A positive `hold` keeps it pressed for that
    /// many seconds.
    pub fn press(&mut self, button: Button, hold: f32) {
        self.tapped[button.index()] = true;
        if hold > 0.0 {
            let until = self.now + hold;
            let slot = &mut self.hold_until[button.index()];
            *slot = Some(slot.map_or(until, |current| current.max(until)));
        }
    }

    pub fn release(&mut self, button: Button) {
        self.tapped[button.index()] = false;
        self.hold_until[button.index()] = None;
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.tapped[button.index()] || self.hold_until[button.index()].is_some()
    }

    /// Replaces this tick's steering. `wish_dir` is `(forward, right)` in
    /// the agent's view frame.
    pub fn set_steering(&mut self, wish_dir: Vec2, goal: Option<Vec3>, buttons: &[Button]) {
        for button in Button::ALL.into_iter().filter(|b| b.is_directional()) {
            self.release(button);
        }
        for &button in buttons {
            self.tapped[button.index()] = true;
        }
        self.wish_dir = wish_dir;
        self.move_goal = goal;
    }

    pub fn clear_steering(&mut self) {
        self.set_steering(Vec2::ZERO, None, &[]);
    }

    pub fn move_goal(&self) -> Option<Vec3> {
        self.move_goal
    }

    /// This tick's steering goal, or the last one honored before it.
    pub fn recent_move_goal(&self) -> Option<Vec3> {
        self.move_goal.or(self.previous_move_goal)
    }

    /// Submits a look request. A live request of higher priority is kept.
    pub fn request_look(&mut self, target: Vec3, priority: LookPriority, duration: f32) -> bool {
        if let Some(current) = self.look {
            if self.now < current.until && current.priority > priority {
                return false;
            }
        }
        self.look = Some(LookRequest {
            target,
            priority,
            until: self.now + duration,
        });
        true
    }

    pub fn look(&self) -> Option<LookRequest> {
        self.look
    }

    pub fn set_velocity_override(&mut self, velocity: Vec3) {
        self.velocity_override = Some(velocity);
    }

    pub fn velocity_override(&self) -> Option<Vec3> {
        self.velocity_override
    }

    pub fn request_teleport(&mut self, position: Vec3) {
        self.teleport = Some(position);
    }

    pub fn request_suicide(&mut self) {
        self.suicide = true;
    }

    pub fn request_force_destroy(&mut self, obstacle: ObstacleId) {
        self.force_destroy = Some(obstacle);
    }

    pub fn set_desired_speed(&mut self, speed: f32) {
        self.desired_speed = speed;
    }

    pub fn desired_speed(&self) -> f32 {
        self.desired_speed
    }

    /// Snapshot handed to the actuator.
    pub fn frame(&self) -> InputFrame {
        InputFrame {
            buttons: Button::ALL
                .into_iter()
                .filter(|&button| self.is_pressed(button))
                .collect(),
            wish_dir: self.wish_dir,
            move_goal: self.move_goal,
            look: self.look,
            velocity_override: self.velocity_override,
            teleport: self.teleport,
            suicide: self.suicide,
            force_destroy: self.force_destroy,
            desired_speed: self.desired_speed,
        }
    }

    pub fn reset(&mut self) {
        let now = self.now;
        *self = Self::default();
        self.now = now;
    }
}

/// Actuator-facing output of one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    pub buttons: Vec<Button>,
    pub wish_dir: Vec2,
    /// World position the steering is heading for, if any.
    pub move_goal: Option<Vec3>,
    pub look: Option<LookRequest>,
    pub velocity_override: Option<Vec3>,
    pub teleport: Option<Vec3>,
    pub suicide: bool,
    pub force_destroy: Option<ObstacleId>,
    pub desired_speed: f32,
}

impl InputFrame {
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons.contains(&button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_buttons_survive_until_their_deadline() {
        let mut intents = InputIntents::default();
        intents.begin_tick(1.0);
        intents.press(Button::Crouch, 0.5);
        intents.press(Button::Use, 0.0);
        assert!(intents.frame().is_pressed(Button::Use));

        intents.begin_tick(1.25);
        assert!(intents.is_pressed(Button::Crouch));
        assert!(!intents.is_pressed(Button::Use), "taps last a single tick");

        intents.begin_tick(1.5);
        assert!(!intents.is_pressed(Button::Crouch));
    }

    #[test]
    fn steering_replaces_previous_directional_buttons() {
        let mut intents = InputIntents::default();
        intents.begin_tick(0.0);
        intents.press(Button::Jump, 0.2);
        intents.set_steering(Vec2::new(1.0, 0.0), Some(Vec3::X), &[Button::Forward]);
        intents.set_steering(Vec2::new(0.0, -1.0), Some(Vec3::Y), &[Button::Left]);
        let frame = intents.frame();
        assert!(frame.is_pressed(Button::Left));
        assert!(!frame.is_pressed(Button::Forward));
        assert!(frame.is_pressed(Button::Jump));
        assert_eq!(frame.move_goal, Some(Vec3::Y));
    }

    #[test]
    fn low_priority_look_does_not_replace_live_high_priority() {
        let mut intents = InputIntents::default();
        intents.begin_tick(0.0);
        assert!(intents.request_look(Vec3::X, LookPriority::High, 0.5));
        assert!(!intents.request_look(Vec3::Y, LookPriority::Low, 0.5));
        assert_eq!(intents.look().map(|l| l.target), Some(Vec3::X));

        intents.begin_tick(0.6);
        assert!(intents.look().is_none());
        assert!(intents.request_look(Vec3::Y, LookPriority::Low, 0.5));
    }
}
