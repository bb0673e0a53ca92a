//! Evaluator trait for position evaluation.
//!
//! The evaluator provides policy (column probabilities) and value estimates
//! for board positions. In AlphaZero, this is a neural network. For testing
//! and for running without a model, deterministic stand-ins are provided.

use std::sync::Arc;

use games_connect4::{Board, COLS};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// Result of evaluating a board position.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    /// Probability per column. May put mass on illegal columns; the search
    /// renormalizes over the legal ones.
    pub policy: [f32; COLS],

    /// Value estimate for the player to move.
    /// Range: -1.0 (certain loss) to +1.0 (certain win).
    pub value: f32,
}

/// Trait for position evaluators.
///
/// Implementations are shared across concurrent searches, so they must be
/// `Send + Sync`. A failure is returned to the caller of the search as-is.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError>;
}

impl<E: Evaluator + ?Sized> Evaluator for &E {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        (**self).evaluate(board)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        (**self).evaluate(board)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        (**self).evaluate(board)
    }
}

/// Restrict `policy` to the columns set in `legal_mask` and rescale to 1.
///
/// Non-finite and negative entries count as zero. If no usable mass is left
/// on a legal column the result is uniform over the legal columns. An empty
/// mask yields all zeros.
pub fn normalize_policy(policy: &[f32; COLS], legal_mask: u8) -> [f32; COLS] {
    let mut out = [0.0f32; COLS];
    let num_legal = (legal_mask & games_connect4::ALL_COLUMNS_MASK).count_ones();
    if num_legal == 0 {
        return out;
    }

    let mut sanitized = false;
    for (col, slot) in out.iter_mut().enumerate() {
        if (legal_mask >> col) & 1 == 0 {
            continue;
        }
        let p = policy[col];
        if p.is_finite() {
            *slot = p.max(0.0);
        } else {
            sanitized = true;
        }
    }
    if sanitized {
        warn!(?policy, "evaluator returned non-finite policy entries");
    }

    let total: f32 = out.iter().sum();
    if total.is_finite() && total > 0.0 {
        for p in &mut out {
            *p /= total;
        }
    } else {
        let uniform = 1.0 / num_legal as f32;
        for (col, slot) in out.iter_mut().enumerate() {
            *slot = if (legal_mask >> col) & 1 == 1 {
                uniform
            } else {
                0.0
            };
        }
    }

    out
}

/// Clamp an evaluator value into [-1, 1]; non-finite values become 0.
pub fn sanitize_value(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        warn!(value, "evaluator returned a non-finite value");
        0.0
    }
}

/// Uniform evaluator that assigns equal probability to every column.
/// Value is always 0.0 (neutral). Useful for testing MCTS without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, _board: &Board) -> Result<EvalResult, EvaluatorError> {
        Ok(EvalResult {
            policy: [1.0 / COLS as f32; COLS],
            value: 0.0,
        })
    }
}

/// Column preference of the heuristic evaluator: center first.
const CENTER_WEIGHTS: [f32; COLS] = [1.0, 2.0, 3.0, 4.0, 3.0, 2.0, 1.0];
const WIN_BOOST: f32 = 10.0;
const BLOCK_BOOST: f32 = 5.0;
const DECISIVE_VALUE: f32 = 0.9;

/// Shallow hand-written evaluator.
///
/// Policy is center-weighted, with columns that win immediately or block
/// an immediate opponent win boosted. Value is positive when the mover can
/// win right now and negative when the opponent has two or more immediate
/// wins (the mover can only block one).
#[derive(Debug, Clone, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for HeuristicEvaluator {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        let mover = board.to_move();
        let opponent = mover.opponent();

        let mut policy = [0.0f32; COLS];
        let mut can_win = false;
        let mut threats = 0;

        for column in board.legal_moves() {
            let mut weight = CENTER_WEIGHTS[column as usize];
            if board.is_winning_move(column, mover) {
                weight *= WIN_BOOST;
                can_win = true;
            }
            if board.is_winning_move(column, opponent) {
                weight *= BLOCK_BOOST;
                threats += 1;
            }
            policy[column as usize] = weight;
        }

        let total: f32 = policy.iter().sum();
        if total > 0.0 {
            for p in &mut policy {
                *p /= total;
            }
        }

        let value = if can_win {
            DECISIVE_VALUE
        } else if threats >= 2 {
            -DECISIVE_VALUE
        } else {
            0.0
        };

        Ok(EvalResult { policy, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_connect4::ALL_COLUMNS_MASK;

    #[test]
    fn test_uniform_evaluator() {
        let eval = UniformEvaluator::new();
        let result = eval.evaluate(&Board::new()).unwrap();

        let expected_prob = 1.0 / 7.0;
        for p in &result.policy {
            assert!((p - expected_prob).abs() < 1e-6);
        }
        assert!((result.value).abs() < 1e-6);
    }

    #[test]
    fn test_evaluator_through_pointers() {
        let eval = UniformEvaluator::new();
        let boxed: Box<dyn Evaluator> = Box::new(UniformEvaluator::new());
        let shared = Arc::new(UniformEvaluator::new());
        let board = Board::new();

        assert_eq!(
            (&eval).evaluate(&board).unwrap(),
            boxed.evaluate(&board).unwrap()
        );
        assert_eq!(
            shared.evaluate(&board).unwrap(),
            eval.evaluate(&board).unwrap()
        );
    }

    #[test]
    fn test_normalize_policy_masks_illegal() {
        let policy = [0.1, 0.2, 0.3, 0.4, 0.0, 0.0, 0.0];
        let mask = 0b0000101; // columns 0 and 2
        let out = normalize_policy(&policy, mask);

        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[2] - 0.75).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_normalize_policy_all_mass_illegal() {
        let policy = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let mask = 0b1110111; // column 3 full
        let out = normalize_policy(&policy, mask);

        assert_eq!(out[3], 0.0);
        for col in [0, 1, 2, 4, 5, 6] {
            assert!((out[col] - 1.0 / 6.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_policy_non_finite() {
        let policy = [f32::NAN, 1.0, f32::INFINITY, 1.0, -3.0, 0.0, 0.0];
        let out = normalize_policy(&policy, ALL_COLUMNS_MASK);

        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], 0.0);
        assert_eq!(out[4], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 0.5).abs() < 1e-6);

        let all_nan = [f32::NAN; COLS];
        let out = normalize_policy(&all_nan, 0b0000011);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_policy_empty_mask() {
        let out = normalize_policy(&[1.0; COLS], 0);
        assert_eq!(out, [0.0; COLS]);
    }

    #[test]
    fn test_sanitize_value() {
        assert_eq!(sanitize_value(0.5), 0.5);
        assert_eq!(sanitize_value(3.0), 1.0);
        assert_eq!(sanitize_value(-7.0), -1.0);
        assert_eq!(sanitize_value(f32::NAN), 0.0);
        assert_eq!(sanitize_value(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_heuristic_prefers_center() {
        let result = HeuristicEvaluator::new().evaluate(&Board::new()).unwrap();
        assert!((result.policy.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(result.policy[3] > result.policy[2]);
        assert!(result.policy[2] > result.policy[1]);
        assert!((result.policy[0] - result.policy[6]).abs() < 1e-6);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn test_heuristic_sees_immediate_win() {
        let board = Board::replay(&[0, 0, 1, 1, 2, 2]).unwrap();
        let result = HeuristicEvaluator::new().evaluate(&board).unwrap();

        let best = (0..COLS)
            .max_by(|&a, &b| result.policy[a].total_cmp(&result.policy[b]))
            .unwrap();
        assert_eq!(best, 3);
        assert!((result.value - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_heuristic_sees_double_threat() {
        // Player one has 1,2,3 on the bottom row with both ends open;
        // player two is to move and can block only one side.
        let board = Board::replay(&[1, 1, 2, 2, 3]).unwrap();
        let result = HeuristicEvaluator::new().evaluate(&board).unwrap();

        assert!((result.value + 0.9).abs() < 1e-6);
        assert!(result.policy[0] > result.policy[5]);
        assert!(result.policy[4] > result.policy[5]);
    }
}
