use std::process::ExitCode;
use std::sync::Arc;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use bot_locomotion::config::{ConfigError, LocomotionConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use bot_locomotion::simulation::{run_simulation, SimulationRequest};

#[derive(Debug, thiserror::Error)]
enum RunnerError {
    #[error("usage: bot-locomotion <scenario.json>")]
    Usage,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read scenario {path}: {source}")]
    ReadScenario {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse scenario: {0}")]
    Json(#[from] serde_json::Error),
}

fn config_path() -> String {
    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

fn run() -> Result<(), RunnerError> {
    let path = config_path();
    let config = LocomotionConfig::load(&path)?;
    info!("[Locomotion] Using config {}", path);

    let scenario_path = std::env::args().nth(1).ok_or(RunnerError::Usage)?;
    let contents =
        std::fs::read_to_string(&scenario_path).map_err(|source| RunnerError::ReadScenario {
            path: scenario_path.clone(),
            source,
        })?;
    let request: SimulationRequest = serde_json::from_str(&contents)?;

    let result = run_simulation(Arc::new(config), &request);
    info!(
        "[Locomotion] {} finished: {:?} after {} frames, {} events",
        scenario_path,
        result.outcome,
        result.frames_elapsed,
        result.events.len()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> ExitCode {
    // Building the plugin installs the global log subscriber.
    App::new().add_plugins(LogPlugin::default());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("[Locomotion] {}", err);
            ExitCode::FAILURE
        }
    }
}
