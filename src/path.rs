//! Path segments handed down by the navigator and the follower that turns
//! them into locomotion calls.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::arbitration::MoveWeight;
use crate::locomotion::{Locomotion, ManeuverError};
use crate::nav::{AreaId, ElevatorId, LadderId, World};
use crate::steering::{MovementType, RequestPriority};
use crate::trace::distance_2d;

/// Curvature above which the follower slows to a walk.
const WALK_CURVATURE: f32 = 0.5;
const CORNER_WALK_TIME: f32 = 0.5;
/// Stuck count after which the route is considered bad.
const REPATH_STUCK_COUNT: u32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    #[default]
    Ground,
    DropFromLedge,
    ClimbUp,
    ClimbDoubleJump,
    JumpOverGap,
    LadderUp,
    LadderDown,
    BlastJump,
    Elevator,
    Catapult,
    StrafeJump,
}

impl SegmentKind {
    /// Segments walked to rather than handed to a maneuver.
    pub fn is_walked(self) -> bool {
        matches!(self, SegmentKind::Ground | SegmentKind::DropFromLedge)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSegment {
    pub kind: SegmentKind,
    pub goal: Vec3,
    pub forward: Vec3,
    pub curvature: f32,
    /// Area the segment ends in. Ladder exits and lift floors use it.
    pub area: Option<AreaId>,
    pub ladder: Option<LadderId>,
    pub elevator: Option<ElevatorId>,
}

impl PathSegment {
    pub fn ground(goal: Vec3) -> Self {
        Self {
            goal,
            ..Self::default()
        }
    }

    pub fn maneuver(kind: SegmentKind, goal: Vec3) -> Self {
        Self {
            kind,
            goal,
            ..Self::default()
        }
    }
}

/// Walks a segment list, one call into the core per tick.
#[derive(Component, Clone, Debug, Default)]
pub struct PathFollower {
    segments: Vec<PathSegment>,
    cursor: usize,
    needs_repath: bool,
}

impl PathFollower {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self {
            segments,
            cursor: 0,
            needs_repath: false,
        }
    }

    pub fn set_path(&mut self, segments: Vec<PathSegment>) {
        *self = Self::new(segments);
    }

    pub fn clear(&mut self) {
        self.set_path(Vec::new());
    }

    pub fn current(&self) -> Option<&PathSegment> {
        self.segments.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.segments.len()
    }

    pub fn needs_repath(&self) -> bool {
        self.needs_repath
    }

    fn next_ground_goal(&self) -> Option<Vec3> {
        self.segments
            .iter()
            .skip(self.cursor)
            .find(|segment| segment.kind == SegmentKind::Ground)
            .map(|segment| segment.goal)
    }

    fn previous_area(&self) -> Option<AreaId> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.segments.get(index))
            .and_then(|segment| segment.area)
    }

    fn is_reached(&self, loco: &Locomotion, goal: Vec3) -> bool {
        let position = loco.body().position;
        let config = loco.config();
        distance_2d(position, goal) <= config.hull_width
            && (position.z - goal.z).abs() < config.stand_height
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn repath(&mut self, reason: &str) {
        if !self.needs_repath {
            warn!(
                "[Locomotion path] Segment {} needs a new route: {}",
                self.cursor, reason
            );
        }
        self.needs_repath = true;
    }

    /// Skips walked segments already behind the agent after a landing.
    fn recenter(&mut self, loco: &Locomotion) {
        while let Some(segment) = self.current() {
            if !segment.kind.is_walked() || !self.is_reached(loco, segment.goal) {
                break;
            }
            self.advance();
        }
        debug!("[Locomotion path] Re-centered at segment {}", self.cursor);
    }

    /// Runs after [`Locomotion::update`] in the same tick.
    pub fn update(&mut self, loco: &mut Locomotion, world: &dyn World) {
        if loco.take_recenter_request() {
            self.recenter(loco);
        }
        loco.set_unstuck_goal(self.next_ground_goal());

        if self.is_finished() {
            return;
        }
        if loco.is_stuck() && loco.stuck_count() >= REPATH_STUCK_COUNT {
            self.repath("stuck too often");
        }
        if !loco.is_pathing_allowed() || loco.is_controlling_movements() {
            return;
        }

        let Some(segment) = self.current().cloned() else {
            return;
        };
        // Walked goals are still steered at while a new route is pending.
        if segment.kind.is_walked() {
            self.walk(loco, &segment);
            return;
        }
        if self.needs_repath {
            return;
        }

        match self.start_maneuver(loco, &segment, world) {
            Ok(()) => {
                debug!(
                    "[Locomotion path] Started {:?} toward {:?}",
                    segment.kind, segment.goal
                );
                self.advance();
            }
            Err(ManeuverError::Busy) => {}
            Err(err) => self.repath(&err.to_string()),
        }
    }

    fn walk(&mut self, loco: &mut Locomotion, segment: &PathSegment) {
        if self.is_reached(loco, segment.goal) {
            self.advance();
            return;
        }
        if segment.curvature > WALK_CURVATURE {
            loco.request_movement_type(
                MovementType::Walk,
                RequestPriority::Medium,
                CORNER_WALK_TIME,
            );
        }
        loco.move_towards(segment.goal, MoveWeight::NAVIGATOR);
    }

    fn start_maneuver(
        &self,
        loco: &mut Locomotion,
        segment: &PathSegment,
        world: &dyn World,
    ) -> Result<(), ManeuverError> {
        let position = loco.body().position;
        let goal = segment.goal;
        let forward = segment.forward;
        match segment.kind {
            SegmentKind::Ground | SegmentKind::DropFromLedge => Ok(()),
            SegmentKind::ClimbUp => loco.climb_up_to_ledge(goal, forward).map(drop),
            SegmentKind::ClimbDoubleJump => loco.double_jump_to_ledge(goal, forward).map(drop),
            SegmentKind::JumpOverGap => loco.jump_across_gap(goal, forward).map(drop),
            SegmentKind::BlastJump => loco.blast_jump_to(position, goal, forward).map(drop),
            SegmentKind::LadderUp | SegmentKind::LadderDown => {
                let ladder = segment.ladder.ok_or(ManeuverError::MissingLadder)?;
                let exit = segment.area.ok_or(ManeuverError::MissingArea)?;
                if segment.kind == SegmentKind::LadderUp {
                    loco.climb_ladder(ladder, exit, world)
                } else {
                    loco.descend_ladder(ladder, exit, world)
                }
            }
            SegmentKind::Elevator => {
                let elevator = segment.elevator.ok_or(ManeuverError::MissingElevator)?;
                let from = self.previous_area().ok_or(ManeuverError::MissingFloor)?;
                let to = segment.area.ok_or(ManeuverError::MissingFloor)?;
                loco.use_elevator(elevator, from, to, world)
            }
            SegmentKind::Catapult => loco.use_catapult(position, goal),
            SegmentKind::StrafeJump => loco.do_strafe_jump(position, goal, world),
        }
    }
}
