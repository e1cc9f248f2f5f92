//! Primitive steering calls shared by every maneuver and upstream caller.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::arbitration::MoveWeight;
use crate::events::LocomotionEvent;
use crate::input::{Button, LookPriority};
use crate::locomotion::Locomotion;
use crate::timers::CountdownTimer;
use crate::trace::ground_direction;

/// Directional components below this magnitude do not press a button.
const DIRECTION_EPSILON: f32 = 0.25;
/// Ground speed under which counter-strafing stops.
const COUNTER_STRAFE_STOP_SPEED: f32 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Walk,
    #[default]
    Run,
    Sprint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
    Critical,
    /// Nothing can override it until it expires.
    Mandatory,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MovementTypeStatus {
    pub(crate) current: MovementType,
    pub(crate) priority: RequestPriority,
    pub(crate) expires: CountdownTimer,
}

impl Locomotion {
    /// Steers toward `pos` if `weight` wins this tick's arbitration.
    pub fn move_towards(&mut self, pos: Vec3, weight: MoveWeight) -> bool {
        if self.stop_and_wait.is_running(self.now) && weight < MoveWeight::COUNTERSTRAFE {
            return false;
        }
        if !self.gate.admit(weight) {
            return false;
        }
        self.apply_steering(pos);
        self.stuck.note_move_request(self.now);
        true
    }

    fn apply_steering(&mut self, pos: Vec3) {
        let dir = ground_direction(self.body.position, pos);
        let forward = Vec3::new(self.body.forward.x, self.body.forward.y, 0.0).normalize_or_zero();
        let right = self.body.right();
        let ahead = dir.dot(forward);
        let side = dir.dot(right);

        let mut buttons = Vec::with_capacity(2);
        if ahead > DIRECTION_EPSILON {
            buttons.push(Button::Forward);
        } else if ahead < -DIRECTION_EPSILON {
            buttons.push(Button::Back);
        }
        if side > DIRECTION_EPSILON {
            buttons.push(Button::Right);
        } else if side < -DIRECTION_EPSILON {
            buttons.push(Button::Left);
        }
        self.intents
            .set_steering(Vec2::new(ahead, side), Some(pos), &buttons);
    }

    /// Steers toward `pos` and writes a horizontal velocity override of
    /// `speed` (default: desired speed) toward it, keeping vertical speed.
    pub fn accelerate_towards(&mut self, pos: Vec3, speed: Option<f32>, weight: MoveWeight) -> bool {
        if !self.move_towards(pos, weight) {
            return false;
        }
        let speed = speed.unwrap_or(self.intents.desired_speed());
        let dir = ground_direction(self.body.position, pos);
        self.intents.set_velocity_override(Vec3::new(
            dir.x * speed,
            dir.y * speed,
            self.body.velocity.z,
        ));
        true
    }

    /// Requests the view to turn toward `pos`.
    pub fn face_towards(&mut self, pos: Vec3, important: bool) -> bool {
        let priority = if important {
            LookPriority::High
        } else {
            LookPriority::Low
        };
        let duration = self.config.look_duration;
        self.intents.request_look(pos, priority, duration)
    }

    /// Drops this tick's steering without touching the gate.
    pub fn stop(&mut self) {
        self.intents.clear_steering();
    }

    pub fn press_button(&mut self, button: Button, hold: f32) {
        self.intents.press(button, hold);
    }

    pub fn release_button(&mut self, button: Button) {
        self.intents.release(button);
    }

    /// Steers against the current motion for `duration` seconds.
    pub fn do_counter_strafe(&mut self, duration: f32) {
        self.counter_strafe.start(self.now, duration);
    }

    /// Rejects steering below counter-strafe weight for `duration` seconds.
    pub fn stop_and_wait(&mut self, duration: f32) {
        self.stop_and_wait.start(self.now, duration);
    }

    pub fn is_stop_and_wait(&self) -> bool {
        self.stop_and_wait.is_running(self.now)
    }

    pub(crate) fn counter_strafe_update(&mut self) {
        if !self.counter_strafe.is_running(self.now) {
            return;
        }
        if self.body.ground_speed() < COUNTER_STRAFE_STOP_SPEED {
            self.counter_strafe.invalidate();
            return;
        }
        let against = self.body.position - self.body.ground_velocity().normalize_or_zero() * 50.0;
        self.move_towards(against, MoveWeight::COUNTERSTRAFE);
    }

    /// Asks to switch between walking, running and sprinting. Granted when
    /// `priority` is at least the active request's or that one expired.
    pub fn request_movement_type(
        &mut self,
        kind: MovementType,
        priority: RequestPriority,
        duration: f32,
    ) -> bool {
        let status = &self.movement;
        if status.expires.is_running(self.now) && priority < status.priority {
            return false;
        }
        let changed = status.current != kind;
        self.movement.current = kind;
        self.movement.priority = priority;
        self.movement.expires.start(self.now, duration);
        self.apply_movement_speed();
        if changed {
            debug!("[Locomotion steering] Movement type {:?} ({:?})", kind, priority);
            self.emit(LocomotionEvent::MovementTypeChanged { movement: kind });
        }
        true
    }

    pub fn movement_type(&self) -> MovementType {
        self.movement.current
    }

    pub(crate) fn movement_type_update(&mut self) {
        let status = &self.movement;
        if status.current != MovementType::Run
            && status.expires.has_started()
            && status.expires.is_elapsed(self.now)
        {
            self.movement.current = MovementType::Run;
            self.movement.priority = RequestPriority::Low;
            self.movement.expires.invalidate();
            self.apply_movement_speed();
            self.emit(LocomotionEvent::MovementTypeChanged {
                movement: MovementType::Run,
            });
        }
    }

    fn apply_movement_speed(&mut self) {
        let speed = match self.movement.current {
            MovementType::Walk => self.config.walk_speed(),
            MovementType::Run => self.config.run_speed,
            MovementType::Sprint => self.config.sprint_speed(),
        };
        self.intents.set_desired_speed(speed);
    }

    pub fn desired_speed(&self) -> f32 {
        self.intents.desired_speed()
    }
}

#[cfg(test)]
mod tests {
    use crate::arbitration::MoveWeight;
    use crate::body::BodyState;
    use crate::input::Button;
    use crate::locomotion::test_support::*;
    use crate::steering::{MovementType, RequestPriority};
    use bevy::prelude::*;

    #[test]
    fn heaviest_request_wins_regardless_of_order() {
        let world = flat_world();
        let requests = [
            (Vec3::new(100.0, 0.0, 0.0), MoveWeight::DEFAULT),
            (Vec3::new(0.0, 100.0, 0.0), MoveWeight::PRIORITY),
            (Vec3::new(-100.0, 0.0, 0.0), MoveWeight::NAVIGATOR),
        ];
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        let mut reference = locomotion();
        reference.update(0.0, BodyState::default(), &world);
        reference.move_towards(requests[1].0, requests[1].1);
        let expected = reference.input_frame();

        for order in orders {
            let mut loco = locomotion();
            loco.update(0.0, BodyState::default(), &world);
            for index in order {
                let (pos, weight) = requests[index];
                loco.move_towards(pos, weight);
            }
            assert_eq!(loco.input_frame(), expected, "order {order:?}");
        }
        assert!(expected.is_pressed(Button::Left));
        assert!(!expected.is_pressed(Button::Forward));
    }

    #[test]
    fn gate_resets_every_tick() {
        let world = flat_world();
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        assert!(loco.move_towards(Vec3::new(100.0, 0.0, 0.0), MoveWeight::CRITICAL));
        assert!(!loco.move_towards(Vec3::new(-100.0, 0.0, 0.0), MoveWeight::DEFAULT));
        loco.update(0.1, BodyState::default(), &world);
        assert!(loco.move_towards(Vec3::new(-100.0, 0.0, 0.0), MoveWeight::DEFAULT));
        assert!(loco.input_frame().is_pressed(Button::Back));
    }

    #[test]
    fn accelerate_towards_overrides_horizontal_velocity_only() {
        let world = flat_world();
        let mut loco = locomotion();
        let body = BodyState {
            velocity: Vec3::new(0.0, 0.0, 120.0),
            on_ground: false,
            ..BodyState::default()
        };
        let east = Vec3::new(500.0, 0.0, 0.0);
        loco.update(0.0, body, &world);
        assert!(loco.move_towards(Vec3::new(0.0, 500.0, 0.0), MoveWeight::PRIORITY));
        assert!(!loco.accelerate_towards(east, None, MoveWeight::NAVIGATOR));
        assert_eq!(loco.input_frame().velocity_override, None);

        loco.update(0.1, body, &world);
        assert!(loco.accelerate_towards(east, None, MoveWeight::NAVIGATOR));
        let frame = loco.input_frame();
        assert_eq!(frame.move_goal, Some(east));
        assert_eq!(frame.velocity_override, Some(Vec3::new(300.0, 0.0, 120.0)));

        loco.update(0.2, body, &world);
        assert!(loco.accelerate_towards(Vec3::new(0.0, -500.0, 0.0), Some(150.0), MoveWeight::NAVIGATOR));
        assert_eq!(
            loco.input_frame().velocity_override,
            Some(Vec3::new(0.0, -150.0, 120.0))
        );
    }

    #[test]
    fn stop_and_wait_blocks_light_requests() {
        let world = flat_world();
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        loco.stop_and_wait(0.2);
        assert!(!loco.move_towards(Vec3::X * 100.0, MoveWeight::NAVIGATOR));
        assert!(loco.move_towards(Vec3::X * 100.0, MoveWeight::COUNTERSTRAFE));
        loco.update(0.3, BodyState::default(), &world);
        assert!(loco.move_towards(Vec3::X * 100.0, MoveWeight::NAVIGATOR));
    }

    #[test]
    fn counter_strafe_steers_against_motion() {
        let world = flat_world();
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        loco.do_counter_strafe(0.1);
        let moving = BodyState {
            velocity: Vec3::new(250.0, 0.0, 0.0),
            ..BodyState::default()
        };
        loco.update(0.05, moving, &world);
        assert!(loco.input_frame().is_pressed(Button::Back));
        assert!(!loco.move_towards(Vec3::X * 100.0, MoveWeight::NAVIGATOR));
    }

    #[test]
    fn movement_type_requests_respect_priority_and_expiry() {
        let world = flat_world();
        let mut loco = locomotion();
        loco.update(0.0, BodyState::default(), &world);
        assert!(loco.request_movement_type(MovementType::Walk, RequestPriority::High, 1.0));
        assert_eq!(loco.desired_speed(), loco.config().walk_speed());
        assert!(!loco.request_movement_type(MovementType::Sprint, RequestPriority::Low, 1.0));
        assert_eq!(loco.movement_type(), MovementType::Walk);

        loco.update(1.5, BodyState::default(), &world);
        assert_eq!(loco.movement_type(), MovementType::Run);
        assert!(loco.request_movement_type(MovementType::Sprint, RequestPriority::Low, 1.0));
        assert_eq!(loco.desired_speed(), loco.config().sprint_speed());
    }
}
