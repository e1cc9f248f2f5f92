//! Deterministic headless harness: a kinematic hull driven by the
//! locomotion core and a path follower at a fixed 60 Hz tick.
//!
//! The hull walks straight at its steering goal, jumps on a fresh jump
//! press, climbs ladders it stands against and honours velocity overrides
//! and teleports. Lifts are not moved; elevator behavior is exercised by
//! toggling floor presence on the world directly.

use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::body::BodyState;
use crate::config::{Capabilities, LocomotionConfig};
use crate::elevator::ElevatorState;
use crate::events::LocomotionEvent;
use crate::input::{Button, InputFrame};
use crate::ladder::LadderState;
use crate::locomotion::Locomotion;
use crate::path::{PathFollower, PathSegment};
use crate::sandbox::SandboxWorld;
use crate::trace::{distance_2d, Hull, TraceQuery};

const DT: f32 = 1.0 / 60.0;
/// Gap kept between the hull and any surface it rests against.
const SURFACE_EPSILON: f32 = 0.03125;
const GROUND_PROBE: f32 = 2.0;
/// Extra reach beyond the hull at which a ladder can be grabbed.
const LADDER_REACH: f32 = 8.0;
const LADDER_CLIMB_SPEED: f32 = 200.0;

#[derive(Deserialize, Clone, Debug)]
pub struct SimulationRequest {
    pub world: SandboxWorld,
    pub spawn: Vec3,
    #[serde(default)]
    pub path: Vec<PathSegment>,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub max_frames: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval: u32,
    #[serde(default)]
    pub seed: u64,
}

fn default_record_interval() -> u32 {
    1
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimOutcome {
    PathCompleted,
    RepathRequested,
    Died,
    Timeout,
}

#[derive(Serialize, Clone, Debug)]
pub struct SimulationResult {
    pub outcome: SimOutcome,
    pub frames_elapsed: u32,
    pub final_body: BodyState,
    pub trace: Vec<TraceFrame>,
    pub events: Vec<SimEvent>,
}

#[derive(Serialize, Clone, Debug)]
pub struct TraceFrame {
    pub frame: u32,
    pub position: Vec3,
    pub velocity: Vec3,
    pub on_ground: bool,
    pub on_ladder: bool,
    pub ladder: LadderState,
    pub elevator: ElevatorState,
}

#[derive(Serialize, Clone, Debug)]
pub struct SimEvent {
    pub frame: u32,
    #[serde(flatten)]
    pub event: LocomotionEvent,
}

/// Kinematic state the core does not see.
#[derive(Default)]
struct HullState {
    jump_was_down: bool,
    double_jumped: bool,
}

pub fn run_simulation(config: Arc<LocomotionConfig>, request: &SimulationRequest) -> SimulationResult {
    let world = &request.world;
    let mut loco = Locomotion::new(config.clone(), request.capabilities, request.seed);
    let mut follower = PathFollower::new(request.path.clone());
    let mut hull_state = HullState::default();

    let mut body = BodyState::at(request.spawn + Vec3::Z * SURFACE_EPSILON);
    body.on_ground = probe_ground(world, &config, body.position, body.crouched);
    body.on_ladder = ladder_attached(world, &config, body.position);

    let mut trace = Vec::new();
    let mut events = Vec::new();
    let mut outcome = SimOutcome::Timeout;
    let mut frames_elapsed = 0;

    for frame in 0..request.max_frames {
        frames_elapsed = frame;
        let now = frame as f32 * DT;
        loco.update(now, body, world);
        follower.update(&mut loco, world);
        let input = loco.input_frame();
        events.extend(
            loco.take_events()
                .into_iter()
                .map(|event| SimEvent { frame, event }),
        );

        if input.suicide {
            body.alive = false;
            outcome = SimOutcome::Died;
            trace.push(record(frame, &body, &loco));
            break;
        }
        if let Some(to) = input.teleport {
            body.position = to + Vec3::Z * SURFACE_EPSILON;
            body.velocity = Vec3::ZERO;
        }

        step_body(world, &config, request.capabilities, &mut body, &mut hull_state, &input);

        if request.record_interval > 0 && frame % request.record_interval == 0 {
            trace.push(record(frame, &body, &loco));
        }

        if follower.needs_repath() {
            outcome = SimOutcome::RepathRequested;
            break;
        }
        if follower.is_finished()
            && loco.active_exclusive().is_none()
            && !loco.is_controlling_movements()
        {
            outcome = SimOutcome::PathCompleted;
            break;
        }
    }

    SimulationResult {
        outcome,
        frames_elapsed,
        final_body: body,
        trace,
        events,
    }
}

fn record(frame: u32, body: &BodyState, loco: &Locomotion) -> TraceFrame {
    TraceFrame {
        frame,
        position: body.position,
        velocity: body.velocity,
        on_ground: body.on_ground,
        on_ladder: body.on_ladder,
        ladder: loco.ladder_state(),
        elevator: loco.elevator_state(),
    }
}

fn hull_for(config: &LocomotionConfig, crouched: bool) -> Hull {
    let height = if crouched {
        config.crouch_height
    } else {
        config.stand_height
    };
    Hull::column(config.hull_width, 0.0, height)
}

fn probe_ground(world: &SandboxWorld, config: &LocomotionConfig, position: Vec3, crouched: bool) -> bool {
    let hull = hull_for(config, crouched);
    let trace = world.trace_hull(position, position - Vec3::Z * GROUND_PROBE, hull);
    trace.did_hit() && !trace.start_solid && trace.normal.z >= config.slope_limit
}

fn ladder_attached(world: &SandboxWorld, config: &LocomotionConfig, position: Vec3) -> bool {
    let reach = config.hull_half_width() + LADDER_REACH;
    world.ladders.iter().any(|ladder| {
        position.z >= ladder.bottom.z - 1.0
            && position.z <= ladder.top.z
            && distance_2d(position, ladder.pos_at_height(position.z)) <= reach
    })
}

fn step_body(
    world: &SandboxWorld,
    config: &LocomotionConfig,
    caps: Capabilities,
    body: &mut BodyState,
    hull_state: &mut HullState,
    input: &InputFrame,
) {
    let jump_down = input.is_pressed(Button::Jump);
    let jump_edge = jump_down && !hull_state.jump_was_down;
    hull_state.jump_was_down = jump_down;
    body.jump_held = jump_down;
    body.crouched = input.is_pressed(Button::Crouch);
    let hull = hull_for(config, body.crouched);

    let wish = wish_velocity(body, input);
    if let Some(velocity) = input.velocity_override {
        body.velocity = velocity;
    } else if body.on_ground || body.on_ladder {
        body.velocity.x = wish.x;
        body.velocity.y = wish.y;
    }

    if jump_edge {
        if body.on_ground || body.on_ladder {
            body.velocity.z = body.velocity.z.max(config.jump_speed());
            body.on_ground = false;
            body.on_ladder = false;
        } else if caps.can_double_jump && !hull_state.double_jumped {
            body.velocity.z = config.jump_speed();
            hull_state.double_jumped = true;
        }
    }

    let climbing = body.on_ladder && input.velocity_override.is_none();
    if climbing {
        body.velocity.z = input.move_goal.map_or(0.0, |goal| {
            ((goal.z - body.position.z) / DT).clamp(-LADDER_CLIMB_SPEED, LADDER_CLIMB_SPEED)
        });
    } else if !body.on_ground {
        body.velocity.z -= config.gravity * DT;
    } else {
        body.velocity.z = body.velocity.z.max(0.0);
    }

    let can_step = body.on_ground || body.on_ladder;
    let mut position = body.position;
    for axis in [Vec3::X, Vec3::Y] {
        let delta = axis * body.velocity.dot(axis) * DT;
        if delta != Vec3::ZERO {
            let (moved, blocked) = move_axis(world, hull, position, delta, can_step, config.step_height);
            position = moved;
            if blocked {
                body.velocity -= axis * body.velocity.dot(axis);
            }
        }
    }

    let dz = body.velocity.z * DT;
    if dz != 0.0 {
        let to = position + Vec3::Z * dz;
        let trace = world.trace_hull(position, to, hull);
        if trace.did_hit() && !trace.start_solid {
            position = trace.end - Vec3::Z * SURFACE_EPSILON * dz.signum();
            body.velocity.z = 0.0;
        } else {
            position = to;
        }
    }

    body.position = position;
    body.on_ground = body.velocity.z <= 0.0 && probe_ground(world, config, position, body.crouched);
    body.on_ladder = ladder_attached(world, config, position);
    if body.on_ground {
        hull_state.double_jumped = false;
    }

    let facing = input
        .look
        .map(|look| look.target - position)
        .or_else(|| input.move_goal.map(|goal| goal - position))
        .map(|dir| Vec3::new(dir.x, dir.y, 0.0).normalize_or_zero())
        .filter(|dir| *dir != Vec3::ZERO);
    if let Some(forward) = facing {
        body.forward = forward;
    }
}

/// Horizontal velocity toward the steering goal, capped so it never
/// overshoots within one tick.
fn wish_velocity(body: &BodyState, input: &InputFrame) -> Vec3 {
    let Some(goal) = input.move_goal else {
        return Vec3::ZERO;
    };
    let delta = Vec3::new(goal.x - body.position.x, goal.y - body.position.y, 0.0);
    let distance = delta.length();
    if distance < 1e-3 {
        return Vec3::ZERO;
    }
    let speed = input.desired_speed.min(distance / DT);
    delta / distance * speed
}

/// Moves along one horizontal axis, stepping up ledges no taller than
/// `step` when grounded. Returns the new position and whether it was
/// blocked.
fn move_axis(
    world: &SandboxWorld,
    hull: Hull,
    position: Vec3,
    delta: Vec3,
    can_step: bool,
    step: f32,
) -> (Vec3, bool) {
    let to = position + delta;
    let trace = world.trace_hull(position, to, hull);
    if !trace.did_hit() || trace.start_solid {
        return (to, false);
    }

    if can_step {
        let raised = position + Vec3::Z * step;
        if !world.trace_hull(position, raised, hull).did_hit()
            && !world.trace_hull(raised, raised + delta, hull).did_hit()
        {
            return (raised + delta, false);
        }
    }

    let length = delta.length();
    let travel = (length * trace.fraction - SURFACE_EPSILON).max(0.0);
    (position + delta / length * travel, true)
}
