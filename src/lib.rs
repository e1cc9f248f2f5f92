//! Locomotion core for autonomous game agents.
//!
//! A [`Locomotion`] instance turns path segments and maneuver requests into
//! per-tick actuator intents ([`InputFrame`]). Hosts supply the physical
//! state of the agent ([`BodyState`]) and a [`World`] for collision and
//! navigation lookups, either directly or through [`LocomotionPlugin`].

pub mod arbitration;
pub mod ballistics;
pub mod body;
pub mod config;
pub mod elevator;
pub mod events;
pub mod input;
pub mod jump;
pub mod ladder;
pub mod locomotion;
pub mod nav;
pub mod obstacle;
pub mod path;
pub mod plugin;
pub mod sandbox;
pub mod simulation;
pub mod steering;
pub mod strafe_jump;
pub mod stuck;
pub mod timers;
pub mod trace;
pub mod traversal;

pub use arbitration::MoveWeight;
pub use body::BodyState;
pub use config::{Capabilities, ConfigError, LocomotionConfig};
pub use events::LocomotionEvent;
pub use input::{Button, InputFrame};
pub use locomotion::{Locomotion, ManeuverError};
pub use nav::World;
pub use path::{PathFollower, PathSegment, SegmentKind};
pub use plugin::{BotInput, LocomotionNotice, LocomotionPlugin, NavWorld};
pub use sandbox::SandboxWorld;
