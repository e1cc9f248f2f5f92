use std::path::Path;

use serde::{Deserialize, Serialize};

/// Environment variable naming the JSON config file read by the runner.
pub const CONFIG_ENV_VAR: &str = "LOCOMOTION_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "locomotion.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse locomotion config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid locomotion config: {0}")]
    Invalid(String),
}

/// Tunable constants for the locomotion core.
///
/// Distances are world units (Z up), times are seconds, speeds are units per
/// second and angles are degrees. One instance is shared by every agent of a
/// given kind and never mutated after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionConfig {
    pub hull_width: f32,
    pub stand_height: f32,
    pub crouch_height: f32,
    pub step_height: f32,
    pub max_jump_height: f32,
    pub max_double_jump_height: f32,
    pub max_gap_jump_distance: f32,
    pub max_drop_height: f32,
    /// Minimum ground normal Z component considered walkable.
    pub slope_limit: f32,
    pub run_speed: f32,
    pub walk_speed_scale: f32,
    pub sprint_speed_scale: f32,
    pub gravity: f32,

    pub jump_cooldown: f32,
    /// Window during which the agent counts as jumping after takeoff.
    pub jump_duration: f32,
    pub double_jump_delay: f32,
    pub crouch_jump_hold: f32,
    pub catapult_speed: f32,
    pub catapult_timeout: f32,

    pub strafe_max_angle: f32,
    pub strafe_angle_step: f32,
    pub strafe_look_offset: f32,
    pub strafe_timeout: f32,

    /// Slowest climb speed assumed when sizing the ladder timeout.
    pub ladder_min_speed: f32,
    pub ladder_timeout_grace: f32,
    pub ladder_mount_grace: f32,

    pub elevator_timeout_extra: f32,
    pub elevator_default_speed: f32,
    pub elevator_move_range: f32,
    pub use_range: f32,
    pub shoot_range: f32,
    pub button_cooldown: f32,

    pub stuck_radius: f32,
    pub stuck_idle_time: f32,
    pub stuck_recheck_interval: f32,
    /// Stuck count that enables the teleport recovery. `None` disables it.
    pub unstuck_teleport_count: Option<u32>,
    pub unstuck_fatal_count: u32,

    pub obstacle_damage_per_second: f32,
    pub obstacle_min_break_time: f32,
    pub obstacle_attack_range: f32,
    pub obstacle_force_destroy: bool,

    pub counter_strafe_time: f32,
    pub post_jump_wait: f32,
    pub look_duration: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            hull_width: 32.0,
            stand_height: 72.0,
            crouch_height: 36.0,
            step_height: 18.0,
            max_jump_height: 57.0,
            max_double_jump_height: 116.0,
            max_gap_jump_distance: 200.0,
            max_drop_height: 450.0,
            slope_limit: 0.6,
            run_speed: 300.0,
            walk_speed_scale: 0.4,
            sprint_speed_scale: 1.3,
            gravity: 800.0,

            jump_cooldown: 0.5,
            jump_duration: 0.8,
            double_jump_delay: 0.5,
            crouch_jump_hold: 0.5,
            catapult_speed: 1000.0,
            catapult_timeout: 5.0,

            strafe_max_angle: 60.0,
            strafe_angle_step: 5.0,
            strafe_look_offset: 30.0,
            strafe_timeout: 4.0,

            ladder_min_speed: 20.0,
            ladder_timeout_grace: 2.0,
            ladder_mount_grace: 0.2,

            elevator_timeout_extra: 5.0,
            elevator_default_speed: 100.0,
            elevator_move_range: 32.0,
            use_range: 64.0,
            shoot_range: 1024.0,
            button_cooldown: 1.0,

            stuck_radius: 100.0,
            stuck_idle_time: 0.25,
            stuck_recheck_interval: 1.0,
            unstuck_teleport_count: Some(5),
            unstuck_fatal_count: 15,

            obstacle_damage_per_second: 100.0,
            obstacle_min_break_time: 1.0,
            obstacle_attack_range: 96.0,
            obstacle_force_destroy: true,

            counter_strafe_time: 0.1,
            post_jump_wait: 0.2,
            look_duration: 0.5,
        }
    }
}

impl LocomotionConfig {
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("hull_width", self.hull_width),
            ("stand_height", self.stand_height),
            ("crouch_height", self.crouch_height),
            ("step_height", self.step_height),
            ("max_jump_height", self.max_jump_height),
            ("max_drop_height", self.max_drop_height),
            ("run_speed", self.run_speed),
            ("gravity", self.gravity),
            ("ladder_min_speed", self.ladder_min_speed),
            ("elevator_default_speed", self.elevator_default_speed),
            ("stuck_radius", self.stuck_radius),
            ("obstacle_damage_per_second", self.obstacle_damage_per_second),
            ("strafe_angle_step", self.strafe_angle_step),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.crouch_height > self.stand_height {
            return Err(ConfigError::Invalid(
                "crouch_height exceeds stand_height".to_string(),
            ));
        }
        if self.step_height >= self.max_jump_height {
            return Err(ConfigError::Invalid(
                "step_height must be below max_jump_height".to_string(),
            ));
        }
        if self.max_double_jump_height < self.max_jump_height {
            return Err(ConfigError::Invalid(
                "max_double_jump_height is below max_jump_height".to_string(),
            ));
        }
        if self.strafe_max_angle < self.strafe_angle_step {
            return Err(ConfigError::Invalid(
                "strafe_max_angle is smaller than one search step".to_string(),
            ));
        }
        if let Some(teleport) = self.unstuck_teleport_count {
            if teleport >= self.unstuck_fatal_count {
                return Err(ConfigError::Invalid(format!(
                    "unstuck_teleport_count ({teleport}) must be below unstuck_fatal_count ({})",
                    self.unstuck_fatal_count
                )));
            }
        }
        Ok(())
    }

    pub fn walk_speed(&self) -> f32 {
        self.run_speed * self.walk_speed_scale
    }

    pub fn sprint_speed(&self) -> f32 {
        self.run_speed * self.sprint_speed_scale
    }

    /// Slowest speed that still counts as making progress.
    pub fn min_movement_speed(&self) -> f32 {
        self.run_speed * 0.4
    }

    /// Initial vertical speed needed to reach `max_jump_height`.
    pub fn jump_speed(&self) -> f32 {
        (2.0 * self.gravity * self.max_jump_height).sqrt()
    }

    pub fn hull_half_width(&self) -> f32 {
        self.hull_width * 0.5
    }
}

/// What a particular agent is physically able to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub can_climb: bool,
    pub can_jump_gaps: bool,
    pub can_double_jump: bool,
    pub can_blast_jump: bool,
    pub can_strafe_jump: bool,
    pub can_use_catapults: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            can_climb: true,
            can_jump_gaps: true,
            can_double_jump: false,
            can_blast_jump: false,
            can_strafe_jump: true,
            can_use_catapults: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let config = LocomotionConfig::from_json_str(r#"{ "run_speed": 250.0, "step_height": 20.0 }"#)
            .expect("config should parse");
        assert_eq!(config.run_speed, 250.0);
        assert_eq!(config.step_height, 20.0);
        assert_eq!(config.hull_width, LocomotionConfig::default().hull_width);
    }

    #[test]
    fn validation_rejects_inverted_thresholds() {
        let err = LocomotionConfig::from_json_str(
            r#"{ "unstuck_teleport_count": 20, "unstuck_fatal_count": 10 }"#,
        )
        .expect_err("teleport threshold above fatal threshold is invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = LocomotionConfig::from_json_str(r#"{ "hull_width": 0.0 }"#)
            .expect_err("zero hull width is invalid");
        assert!(err.to_string().contains("hull_width"));
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = LocomotionConfig::load("definitely/not/here/locomotion.json")
            .expect("missing file is not an error");
        assert_eq!(config, LocomotionConfig::default());
    }

    #[test]
    fn capabilities_parse_from_partial_json() {
        let caps: Capabilities =
            serde_json::from_str(r#"{ "can_double_jump": true }"#).expect("capabilities parse");
        assert!(caps.can_double_jump);
        assert!(caps.can_climb);
        assert!(!caps.can_blast_jump);
    }
}
