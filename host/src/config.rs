//! Command-line configuration for the `connect4` binary
//!
//! Defaults come from the central config (config.toml plus `CONNECT4_*`
//! environment overrides). Command-line flags take highest priority.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use engine_config::{load_config, CentralConfig};
use mcts::MctsConfig;
use once_cell::sync::Lazy;
use tracing::level_filters::LevelFilter;

use crate::bots::{BotFactory, BotKind};
use crate::mcts_policy::{load_evaluator, EvaluatorKind, MctsPolicy};
use crate::session::FirstPlayer;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

// Default value functions that read from central config
fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

fn default_num_simulations() -> u32 {
    CENTRAL_CONFIG.mcts.num_simulations
}

fn default_c_puct() -> f32 {
    CENTRAL_CONFIG.mcts.c_puct as f32
}

fn default_temperature() -> f32 {
    CENTRAL_CONFIG.mcts.temperature as f32
}

fn default_max_search_ms() -> u64 {
    CENTRAL_CONFIG.mcts.max_search_ms
}

fn default_bot() -> String {
    CENTRAL_CONFIG.host.bot.clone()
}

fn default_evaluator() -> String {
    CENTRAL_CONFIG.host.evaluator.clone()
}

fn default_model_path() -> String {
    CENTRAL_CONFIG.host.model_path.clone()
}

fn default_onnx_intra_threads() -> usize {
    CENTRAL_CONFIG.host.onnx_intra_threads
}

fn default_max_sessions() -> usize {
    CENTRAL_CONFIG.host.max_sessions
}

fn default_session_idle_secs() -> u64 {
    CENTRAL_CONFIG.host.session_idle_secs
}

fn default_seed() -> Option<u64> {
    CENTRAL_CONFIG.common.seed
}

#[derive(Parser, Debug, Clone)]
#[command(name = "connect4")]
#[command(about = "Connect Four engine - AlphaZero-style MCTS with pluggable evaluators")]
#[command(
    long_about = "Plays and analyzes Connect Four with Monte Carlo Tree Search.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value_t = default_log_level())]
    pub log_level: String,

    /// Number of MCTS simulations per move
    #[arg(long, global = true, default_value_t = default_num_simulations())]
    pub simulations: u32,

    /// Exploration constant in the PUCT formula
    #[arg(long, global = true, default_value_t = default_c_puct())]
    pub c_puct: f32,

    /// Root temperature (0 = always play the most visited column)
    #[arg(long, global = true, default_value_t = default_temperature())]
    pub temperature: f32,

    /// Wall-clock limit per search in milliseconds (0 = none)
    #[arg(long, global = true, default_value_t = default_max_search_ms())]
    pub max_search_ms: u64,

    /// Bot for `play` and `analyze`: mcts, heuristic or random
    #[arg(long, global = true, default_value_t = default_bot())]
    pub bot: String,

    /// Evaluator behind the MCTS bot: uniform, heuristic or onnx
    #[arg(long, global = true, default_value_t = default_evaluator())]
    pub evaluator: String,

    /// ONNX model used by the onnx evaluator
    #[arg(long, global = true, default_value_t = default_model_path())]
    pub model_path: String,

    /// Intra-op threads for ONNX inference
    #[arg(long, global = true, default_value_t = default_onnx_intra_threads())]
    pub onnx_intra_threads: usize,

    /// Fixed RNG seed for reproducible runs
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Answer a JSON move request ({"board": [[..7 cells..] x6], ...})
    Analyze {
        /// Read the request from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Play bots against each other and report the results
    Arena {
        #[arg(long, default_value = "mcts")]
        challenger: String,

        #[arg(long, default_value = "heuristic")]
        opponent: String,

        #[arg(long, default_value_t = 20)]
        games: u32,

        /// Games played at the same time
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Print Prometheus metrics after the match
        #[arg(long)]
        metrics: bool,
    },

    /// Play against the bot in the terminal
    Play {
        /// Who moves first: human or bot
        #[arg(long, default_value = "human")]
        first: String,

        #[arg(long, default_value_t = default_max_sessions())]
        max_sessions: usize,

        /// Finished games idle this long are dropped
        #[arg(long, default_value_t = default_session_idle_secs())]
        session_idle_secs: u64,
    },
}

impl EngineArgs {
    pub fn validate(&self) -> Result<()> {
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }
        self.mcts_config().validate()?;
        self.bot_kind()?;
        self.evaluator_kind()?;
        Ok(())
    }

    /// Seed from the flag, falling back to `[common] seed`.
    pub fn effective_seed(&self) -> Option<u64> {
        self.seed.or_else(default_seed)
    }

    pub fn mcts_config(&self) -> MctsConfig {
        let config = MctsConfig::for_play()
            .with_simulations(self.simulations)
            .with_c_puct(self.c_puct)
            .with_temperature(self.temperature);
        match self.max_search_ms {
            0 => config,
            ms => config.with_max_duration(Duration::from_millis(ms)),
        }
    }

    pub fn bot_kind(&self) -> Result<BotKind> {
        self.bot.parse().map_err(|e: String| anyhow!(e))
    }

    pub fn evaluator_kind(&self) -> Result<EvaluatorKind> {
        self.evaluator.parse().map_err(|e: String| anyhow!(e))
    }

    /// Factory for a bot of `kind`, loading the evaluator when it needs one.
    pub fn bot_factory(&self, kind: BotKind) -> Result<BotFactory> {
        Ok(match kind {
            BotKind::Random => BotFactory::random(),
            BotKind::Heuristic => BotFactory::heuristic(),
            BotKind::Mcts => BotFactory::mcts(
                load_evaluator(
                    self.evaluator_kind()?,
                    &self.model_path,
                    self.onnx_intra_threads,
                )
                .with_context(|| format!("loading {} evaluator", self.evaluator))?,
                self.mcts_config(),
            ),
        })
    }

    /// MCTS provider for `analyze`, which always searches.
    pub fn mcts_policy(&self) -> Result<MctsPolicy> {
        let evaluator = load_evaluator(
            self.evaluator_kind()?,
            &self.model_path,
            self.onnx_intra_threads,
        )
        .with_context(|| format!("loading {} evaluator", self.evaluator))?;
        let policy = match self.effective_seed() {
            Some(seed) => MctsPolicy::with_seed(evaluator, seed),
            None => MctsPolicy::new(evaluator),
        };
        Ok(policy.with_config(self.mcts_config()))
    }
}

pub fn parse_first_player(s: &str) -> Result<FirstPlayer> {
    s.parse().map_err(|e: String| anyhow!(e))
}
