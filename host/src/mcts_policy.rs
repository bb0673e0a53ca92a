//! MCTS-based move provider
//!
//! Wraps [`mcts::run_mcts`] behind the [`MoveProvider`] contract. The
//! evaluator is shared (`Arc`) so several games can search with the same
//! network at once, each with its own tree.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use games_connect4::Board;
use mcts::{run_mcts, Evaluator, HeuristicEvaluator, MctsConfig, SearchResult, UniformEvaluator};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::metrics;
use crate::policy::{MoveProvider, ProviderError};

/// Which evaluator sits behind the MCTS bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorKind {
    Uniform,
    Heuristic,
    Onnx,
}

impl FromStr for EvaluatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "heuristic" => Ok(Self::Heuristic),
            "onnx" => Ok(Self::Onnx),
            other => Err(format!(
                "unknown evaluator '{}' (expected uniform, heuristic or onnx)",
                other
            )),
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uniform => "uniform",
            Self::Heuristic => "heuristic",
            Self::Onnx => "onnx",
        };
        f.write_str(name)
    }
}

/// Build the shared evaluator for `kind`.
///
/// `model_path` and `intra_threads` are only read for [`EvaluatorKind::Onnx`].
pub fn load_evaluator(
    kind: EvaluatorKind,
    model_path: &str,
    intra_threads: usize,
) -> Result<Arc<dyn Evaluator>, ProviderError> {
    match kind {
        EvaluatorKind::Uniform => Ok(Arc::new(UniformEvaluator::new())),
        EvaluatorKind::Heuristic => Ok(Arc::new(HeuristicEvaluator::new())),
        EvaluatorKind::Onnx => load_onnx(model_path, intra_threads),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(model_path: &str, intra_threads: usize) -> Result<Arc<dyn Evaluator>, ProviderError> {
    info!(model_path, intra_threads, "Loading ONNX evaluator");
    let evaluator = mcts::OnnxEvaluator::load(model_path, intra_threads)
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
    Ok(Arc::new(evaluator))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(model_path: &str, _intra_threads: usize) -> Result<Arc<dyn Evaluator>, ProviderError> {
    info!(model_path, "ONNX evaluator requested but support is not compiled in");
    Err(ProviderError::Unavailable(
        "built without the `onnx` feature".to_string(),
    ))
}

/// MCTS-based provider
pub struct MctsPolicy {
    evaluator: Arc<dyn Evaluator>,
    config: MctsConfig,
    /// RNG for root action sampling
    rng: ChaCha20Rng,
}

impl fmt::Debug for MctsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MctsPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MctsPolicy {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            config: MctsConfig::for_play(),
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Create with a specific seed for determinism
    pub fn with_seed(evaluator: Arc<dyn Evaluator>, seed: u64) -> Self {
        Self {
            evaluator,
            config: MctsConfig::for_play(),
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Set the MCTS configuration
    pub fn with_config(mut self, config: MctsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Run one full search and return everything it found.
    pub fn search(&mut self, board: &Board) -> Result<SearchResult, ProviderError> {
        let timer = metrics::SEARCH_SECONDS.start_timer();
        let result = run_mcts(
            self.evaluator.as_ref(),
            self.config.clone(),
            board,
            &mut self.rng,
        )?;
        timer.observe_duration();

        metrics::SEARCHES_RUN.inc();
        metrics::SIMULATIONS_RUN.inc_by(u64::from(result.simulations));

        debug!(
            action = result.action,
            value = result.value,
            simulations = result.simulations,
            "MCTS selected action"
        );
        Ok(result)
    }
}

impl MoveProvider for MctsPolicy {
    fn name(&self) -> &str {
        "mcts"
    }

    fn select_move(&mut self, board: &Board, valid_moves: &[u8]) -> Result<u8, ProviderError> {
        if valid_moves.is_empty() {
            return Err(ProviderError::NoValidMoves);
        }
        Ok(self.search(board)?.action)
    }
}
