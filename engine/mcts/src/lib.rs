//! AlphaZero-style Monte Carlo Tree Search over Connect Four boards.
//!
//! Every simulation walks from the root along the best PUCT child until it
//! reaches an unexpanded node or a finished game. Unexpanded nodes are
//! evaluated once and get one child per legal column, priors taken from the
//! evaluator. Finished games are scored by the rules. The resulting value is
//! then backed up to the root, flipping sign at every ply.
//!
//! ```rust
//! use games_connect4::Board;
//! use mcts::{run_mcts, MctsConfig, UniformEvaluator};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//! let result = run_mcts(
//!     &UniformEvaluator::new(),
//!     MctsConfig::for_testing(),
//!     &Board::new(),
//!     &mut rng,
//! )
//! .unwrap();
//! assert!(result.action < 7);
//! assert_eq!(result.distribution.total(), result.simulations);
//! ```
//!
//! Evaluators: [`UniformEvaluator`] and [`HeuristicEvaluator`] need no
//! model; `OnnxEvaluator` (feature `onnx`) runs a policy/value network.

pub mod config;
pub mod distribution;
pub mod evaluator;
pub mod node;
pub mod search;
pub mod tree;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use config::{ConfigError, MctsConfig};
pub use distribution::ActionDistribution;
pub use evaluator::{
    normalize_policy, EvalResult, Evaluator, EvaluatorError, HeuristicEvaluator, UniformEvaluator,
};
pub use node::{MctsNode, NodeId};
pub use search::{run_mcts, MctsSearch, SearchError, SearchResult};
pub use tree::{MctsTree, TreeStats};

#[cfg(feature = "onnx")]
pub use onnx::{OnnxEvaluator, OnnxStats};
