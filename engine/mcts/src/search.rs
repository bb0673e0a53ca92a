//! One search: simulations against a fresh tree, then a move chosen from
//! the root visit counts.

use std::time::Instant;

use games_connect4::{Board, IllegalMoveError, COLS};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, MctsConfig};
use crate::distribution::ActionDistribution;
use crate::evaluator::{normalize_policy, sanitize_value, Evaluator, EvaluatorError};
use crate::node::NodeId;
use crate::tree::{MctsTree, TreeStats};

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Cannot search a finished game")]
    TerminalPosition,

    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Rules error: {0}")]
    Rules(#[from] IllegalMoveError),
}

/// Result of an MCTS search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Column to play
    pub action: u8,

    /// Root visit counts per column
    pub distribution: ActionDistribution,

    /// Distribution the action was drawn from (visit counts with temperature)
    pub policy: [f32; COLS],

    /// Value estimate at root, for the player to move
    pub value: f32,

    /// Q of the chosen column, for the player to move
    pub action_value: f32,

    /// Number of simulations performed
    pub simulations: u32,

    pub stats: TreeStats,
}

/// MCTS search state. One search owns one tree.
pub struct MctsSearch<'a, E: Evaluator + ?Sized> {
    tree: MctsTree,
    evaluator: &'a E,
    config: MctsConfig,
}

impl<'a, E: Evaluator + ?Sized> MctsSearch<'a, E> {
    /// Create a new MCTS search from the given board.
    ///
    /// Fails on an invalid config or a board with nothing left to play.
    pub fn new(evaluator: &'a E, config: MctsConfig, board: Board) -> Result<Self, SearchError> {
        config.validate()?;
        if board.is_terminal() {
            return Err(SearchError::TerminalPosition);
        }
        if board.legal_moves_mask() == 0 {
            return Err(SearchError::NoLegalMoves);
        }

        Ok(Self {
            tree: MctsTree::new(board),
            evaluator,
            config,
        })
    }

    /// Run the search and pick a column.
    pub fn run(&mut self, rng: &mut ChaCha20Rng) -> Result<SearchResult, SearchError> {
        let start = Instant::now();
        let root_id = self.tree.root();

        // The root evaluation only supplies priors; its value is not backed up.
        if !self.tree.get(root_id).is_expanded() {
            self.expand_node(root_id)?;
        }

        let mut simulations = 0;
        if self.tree.get(root_id).children.len() > 1 {
            while simulations < self.config.num_simulations {
                self.simulate()?;
                simulations += 1;

                if let Some(limit) = self.config.max_duration {
                    if start.elapsed() >= limit {
                        debug!(simulations, ?limit, "MCTS deadline reached");
                        break;
                    }
                }
            }
        }

        let result = self.finish(simulations, rng)?;
        debug!(
            action = result.action,
            simulations = result.simulations,
            value = result.value,
            nodes = result.stats.total_nodes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "MCTS search complete"
        );
        Ok(result)
    }

    /// Derive the action and summary from the root statistics.
    fn finish(&self, simulations: u32, rng: &mut ChaCha20Rng) -> Result<SearchResult, SearchError> {
        let root = self.tree.get(self.tree.root());
        let distribution = ActionDistribution::from_tree(&self.tree);
        let policy = distribution.probabilities(self.config.temperature);

        let action = match distribution.select(self.config.temperature, rng) {
            Some(action) if root.board.is_legal(action) => action,
            candidate => {
                let fallback = self.fallback_action().ok_or(SearchError::NoLegalMoves)?;
                warn!(
                    ?candidate,
                    fallback, "selected column is not legal at the root, using most visited"
                );
                fallback
            }
        };

        let action_value = self
            .tree
            .root_child(action)
            .map(|child| -child.mean_value())
            .unwrap_or(0.0);

        Ok(SearchResult {
            action,
            distribution,
            policy,
            value: root.mean_value(),
            action_value,
            simulations,
            stats: self.tree.stats(),
        })
    }

    /// Most visited legal column at the root, lowest column on ties.
    fn fallback_action(&self) -> Option<u8> {
        let root = self.tree.get(self.tree.root());
        let visits = self.tree.root_visits();
        root.board
            .legal_moves()
            .into_iter()
            .fold(None, |best: Option<u8>, col| match best {
                Some(b) if visits[col as usize] <= visits[b as usize] => best,
                _ => Some(col),
            })
    }

    /// Run a single simulation (select -> expand -> evaluate -> backpropagate).
    fn simulate(&mut self) -> Result<(), SearchError> {
        let (leaf_id, depth) = self.select();

        let value = match self.tree.get(leaf_id).terminal_value {
            Some(value) => value,
            None => self.expand_node(leaf_id)?,
        };

        self.tree.backpropagate(leaf_id, value);

        trace!(leaf = leaf_id.0, depth, value, "MCTS simulation complete");
        Ok(())
    }

    /// Follow the best PUCT child from the root down to a leaf.
    fn select(&self) -> (NodeId, u32) {
        let mut current = self.tree.root();
        let mut depth = 0;

        while !self.tree.get(current).is_leaf() {
            match self.tree.select_child(current, self.config.c_puct) {
                Some(child_id) => {
                    current = child_id;
                    depth += 1;
                }
                None => break,
            }
        }

        (current, depth)
    }

    /// Expand a node by adding a child for every legal column.
    /// Returns the evaluator's value for the node.
    fn expand_node(&mut self, node_id: NodeId) -> Result<f32, SearchError> {
        let board = self.tree.get(node_id).board;

        let eval = self.evaluator.evaluate(&board)?;
        let priors = normalize_policy(&eval.policy, board.legal_moves_mask());

        for column in board.legal_moves() {
            let child = board.apply(column)?;
            self.tree
                .add_child(node_id, column, priors[column as usize], child);
        }

        Ok(sanitize_value(eval.value))
    }

    /// Get the search tree (for inspection/debugging).
    pub fn tree(&self) -> &MctsTree {
        &self.tree
    }
}

/// Convenience function to run a single MCTS search.
pub fn run_mcts<E: Evaluator + ?Sized>(
    evaluator: &E,
    config: MctsConfig,
    board: &Board,
    rng: &mut ChaCha20Rng,
) -> Result<SearchResult, SearchError> {
    let mut search = MctsSearch::new(evaluator, config, *board)?;
    search.run(rng)
}
