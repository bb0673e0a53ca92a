//! Locating config.toml and layering environment overrides on top.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CONNECT4_CONFIG";

/// Fallback locations, tried in order after `CONNECT4_CONFIG`.
pub const CONFIG_SEARCH_PATHS: &[&str] = &["config.toml", "../config.toml", "/app/config.toml"];

/// Load the central configuration.
///
/// The first existing file among `$CONNECT4_CONFIG` and
/// [`CONFIG_SEARCH_PATHS`] is parsed; with none found the compiled-in
/// defaults are used. `CONNECT4_*` overrides are applied in every case.
pub fn load_config() -> CentralConfig {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    if let Some(path) = explicit.as_ref().filter(|p| !p.exists()) {
        warn!(
            "{}={} does not exist, trying default locations",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let found = explicit
        .into_iter()
        .chain(CONFIG_SEARCH_PATHS.iter().map(PathBuf::from))
        .find(|p| p.exists());

    match found {
        Some(path) => {
            info!(path = %path.display(), "Using config file");
            load_from_path(&path)
        }
        None => {
            debug!("No config file found, running on built-in defaults");
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Parse the file at `path`. A file that cannot be read or parsed is
/// reported and replaced by the defaults rather than aborting startup.
pub fn load_from_path(path: &Path) -> CentralConfig {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| CentralConfig::from_toml_str(&text).map_err(|e| e.to_string()));

    let config = parsed.unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Unusable config file, using defaults");
        CentralConfig::default()
    });
    apply_env_overrides(config)
}

/// Assign `$key` to a config field when the variable is set. Values that do
/// not parse into the field's type are skipped.
macro_rules! env_override {
    ($config:ident . $section:ident . $field:ident <- $key:literal) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    ($config:ident . $section:ident . $field:ident <- $key:literal as parsed) => {
        if let Some(v) = std::env::var($key).ok().and_then(|s| s.parse().ok()) {
            $config.$section.$field = v;
        }
    };
    ($config:ident . $section:ident . $field:ident <- $key:literal as some) => {
        if let Some(v) = std::env::var($key).ok().and_then(|s| s.parse().ok()) {
            $config.$section.$field = Some(v);
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: CONNECT4_<SECTION>_<KEY>.
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    env_override!(config.common.log_level <- "CONNECT4_COMMON_LOG_LEVEL");
    env_override!(config.common.seed <- "CONNECT4_COMMON_SEED" as some);

    env_override!(config.mcts.num_simulations <- "CONNECT4_MCTS_NUM_SIMULATIONS" as parsed);
    env_override!(config.mcts.c_puct <- "CONNECT4_MCTS_C_PUCT" as parsed);
    env_override!(config.mcts.temperature <- "CONNECT4_MCTS_TEMPERATURE" as parsed);
    env_override!(config.mcts.max_search_ms <- "CONNECT4_MCTS_MAX_SEARCH_MS" as parsed);

    env_override!(config.host.bot <- "CONNECT4_HOST_BOT");
    env_override!(config.host.evaluator <- "CONNECT4_HOST_EVALUATOR");
    env_override!(config.host.model_path <- "CONNECT4_HOST_MODEL_PATH");
    env_override!(config.host.onnx_intra_threads <- "CONNECT4_HOST_ONNX_INTRA_THREADS" as parsed);
    env_override!(config.host.max_sessions <- "CONNECT4_HOST_MAX_SESSIONS" as parsed);
    env_override!(config.host.session_idle_secs <- "CONNECT4_HOST_SESSION_IDLE_SECS" as parsed);

    config
}
