use std::sync::Arc;

use bevy::prelude::*;
use serde::Serialize;

use crate::body::BodyState;
use crate::events::LocomotionEvent;
use crate::input::InputFrame;
use crate::locomotion::Locomotion;
use crate::nav::World;
use crate::path::PathFollower;

/// Runs every bot's locomotion core at the fixed tick rate.
pub struct LocomotionPlugin;

impl Plugin for LocomotionPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<LocomotionNotice>().add_systems(
            FixedPreUpdate,
            (tick_locomotion, follow_paths, publish_inputs).chain(),
        );
    }
}

/// Shared, read-only collision and navigation data.
#[derive(Resource, Clone)]
pub struct NavWorld(pub Arc<dyn World + Send + Sync>);

impl NavWorld {
    pub fn new(world: impl World + Send + Sync + 'static) -> Self {
        Self(Arc::new(world))
    }
}

/// Actuator output for the current tick, read by the host's controller.
#[derive(Component, Clone, Debug, Default, PartialEq, Serialize)]
pub struct BotInput(pub InputFrame);

#[derive(Event, Clone, Debug, PartialEq)]
pub struct LocomotionNotice {
    pub entity: Entity,
    pub event: LocomotionEvent,
}

pub fn tick_locomotion(
    time: Res<Time>,
    nav: Option<Res<NavWorld>>,
    mut bots: Query<(&mut Locomotion, &BodyState)>,
) {
    let Some(nav) = nav else {
        return;
    };
    let now = time.elapsed_secs();
    for (mut loco, body) in bots.iter_mut() {
        loco.update(now, *body, nav.0.as_ref());
    }
}

pub fn follow_paths(
    nav: Option<Res<NavWorld>>,
    mut bots: Query<(&mut PathFollower, &mut Locomotion)>,
) {
    let Some(nav) = nav else {
        return;
    };
    for (mut follower, mut loco) in bots.iter_mut() {
        follower.update(&mut loco, nav.0.as_ref());
    }
}

pub fn publish_inputs(
    mut commands: Commands,
    mut bots: Query<(Entity, &mut Locomotion, Option<&mut BotInput>)>,
    mut notices: EventWriter<LocomotionNotice>,
) {
    for (entity, mut loco, input) in bots.iter_mut() {
        let frame = loco.input_frame();
        match input {
            Some(mut input) => input.0 = frame,
            None => {
                commands.entity(entity).insert(BotInput(frame));
            }
        }
        for event in loco.take_events() {
            notices.send(LocomotionNotice { entity, event });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locomotion::test_support::*;
    use crate::path::PathSegment;
    use crate::sandbox::SandboxWorld;
    use crate::steering::{MovementType, RequestPriority};

    fn setup_app(world: SandboxWorld) -> App {
        let mut app = App::new();
        app.insert_resource(NavWorld::new(world))
            .insert_resource(Time::<()>::default())
            .add_event::<LocomotionNotice>()
            .add_systems(Update, (tick_locomotion, follow_paths, publish_inputs).chain());
        app
    }

    #[test]
    fn path_following_bots_publish_steering() {
        let mut app = setup_app(flat_world());
        let goal = Vec3::new(300.0, 0.0, 0.0);
        app.world_mut().spawn((
            locomotion(),
            BodyState::default(),
            PathFollower::new(vec![PathSegment::ground(goal)]),
        ));
        app.update();

        let mut query = app.world_mut().query::<&BotInput>();
        let input = query.single(app.world());
        assert_eq!(input.0.move_goal, Some(goal));
        assert_eq!(input.0.desired_speed, 300.0);
    }

    #[test]
    fn core_events_are_forwarded_as_notices() {
        let mut app = setup_app(flat_world());
        let mut loco = locomotion();
        loco.request_movement_type(MovementType::Sprint, RequestPriority::High, 5.0);
        let entity = app.world_mut().spawn((loco, BodyState::default())).id();
        app.update();

        let events = app.world().resource::<Events<LocomotionNotice>>();
        let mut cursor = events.get_cursor();
        let notices: Vec<_> = cursor.read(events).cloned().collect();
        assert_eq!(
            notices,
            vec![LocomotionNotice {
                entity,
                event: LocomotionEvent::MovementTypeChanged {
                    movement: MovementType::Sprint,
                },
            }]
        );
    }
}
