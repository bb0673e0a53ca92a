//! Configuration sections as they appear in config.toml.

use serde::Deserialize;
use toml::{Table, Value};

use crate::defaults::{merge_with_defaults, DEFAULT_CONFIG};

/// Root of config.toml.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CentralConfig {
    pub common: CommonConfig,
    pub mcts: MctsConfig,
    pub host: HostConfig,
}

impl CentralConfig {
    /// Parse a (possibly partial) config file; missing keys take the
    /// built-in defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let table: Table = text.parse()?;
        Value::Table(merge_with_defaults(table)).try_into()
    }
}

impl Default for CentralConfig {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommonConfig {
    pub log_level: String,
    /// Fixed RNG seed. `None` draws a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Search parameters
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MctsConfig {
    pub num_simulations: u32,
    pub c_puct: f64,
    pub temperature: f64,
    /// Wall-clock limit per search in milliseconds (0 = none)
    pub max_search_ms: u64,
}

/// Which bot answers moves and how sessions are kept
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HostConfig {
    /// "mcts", "heuristic" or "random"
    pub bot: String,
    /// Evaluator behind the MCTS bot: "uniform", "heuristic" or "onnx"
    pub evaluator: String,
    pub model_path: String,
    pub onnx_intra_threads: usize,
    pub max_sessions: usize,
    /// Finished sessions idle this long are evicted
    pub session_idle_secs: u64,
}
