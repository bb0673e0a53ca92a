//! End-to-end properties of the search on real Connect Four positions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use games_connect4::{Board, COLS};
use mcts::{
    run_mcts, EvalResult, Evaluator, EvaluatorError, HeuristicEvaluator, MctsConfig, MctsSearch,
    SearchError, UniformEvaluator,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Full board without four in a row, top cell of column 0 still empty.
const ONE_HOLE_GRID: [[u8; COLS]; 6] = [
    [0, 1, 2, 1, 2, 1, 1],
    [1, 1, 2, 1, 2, 1, 2],
    [1, 2, 2, 1, 2, 1, 1],
    [2, 1, 1, 2, 1, 2, 1],
    [1, 2, 2, 2, 1, 2, 2],
    [2, 1, 1, 2, 2, 2, 1],
];

/// Player one to move; column 3 completes the bottom row.
const WIN_IN_ONE: [u8; 6] = [0, 0, 1, 1, 2, 2];

/// Counts calls and delegates to the uniform evaluator.
#[derive(Default)]
struct CountingEvaluator {
    calls: AtomicUsize,
}

impl Evaluator for CountingEvaluator {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        UniformEvaluator::new().evaluate(board)
    }
}

/// Puts all probability on one column, legal or not.
struct FixedColumnEvaluator(usize);

impl Evaluator for FixedColumnEvaluator {
    fn evaluate(&self, _board: &Board) -> Result<EvalResult, EvaluatorError> {
        let mut policy = [0.0; COLS];
        policy[self.0] = 1.0;
        Ok(EvalResult { policy, value: 0.0 })
    }
}

struct GarbageEvaluator;

impl Evaluator for GarbageEvaluator {
    fn evaluate(&self, _board: &Board) -> Result<EvalResult, EvaluatorError> {
        Ok(EvalResult {
            policy: [f32::NAN; COLS],
            value: f32::INFINITY,
        })
    }
}

/// Fails every call after the first `ok_calls`.
struct FailingEvaluator {
    ok_calls: usize,
    calls: AtomicUsize,
}

impl Evaluator for FailingEvaluator {
    fn evaluate(&self, board: &Board) -> Result<EvalResult, EvaluatorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.ok_calls {
            UniformEvaluator::new().evaluate(board)
        } else {
            Err(EvaluatorError::EvaluationFailed("model offline".to_string()))
        }
    }
}

fn random_position(rng: &mut ChaCha20Rng, plies: usize) -> Board {
    loop {
        let mut board = Board::new();
        for _ in 0..plies {
            let legal = board.legal_moves();
            board.play(*legal.choose(rng).unwrap()).unwrap();
            if board.is_terminal() {
                break;
            }
        }
        if !board.is_terminal() {
            return board;
        }
    }
}

#[test]
fn empty_board_uniform_search() {
    let evaluator = UniformEvaluator::new();
    let config = MctsConfig::default()
        .with_simulations(100)
        .with_c_puct(1.0);
    let mut rng = ChaCha20Rng::seed_from_u64(11);

    let result = run_mcts(&evaluator, config, &Board::new(), &mut rng).unwrap();

    assert!(result.action < COLS as u8);
    assert_eq!(result.simulations, 100);
    assert_eq!(result.distribution.visits().iter().sum::<u32>(), 100);
    assert!(result.policy.iter().all(|&p| p >= 0.0));
    assert!((result.policy.iter().sum::<f32>() - 1.0).abs() < 1e-5);
}

#[test]
fn root_visits_sum_to_budget() {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let evaluator = HeuristicEvaluator::new();

    for (i, budget) in [1u32, 2, 7, 33, 120].into_iter().enumerate() {
        let board = random_position(&mut rng, i * 4);
        let config = MctsConfig::for_testing().with_simulations(budget);
        let result = run_mcts(&evaluator, config, &board, &mut rng).unwrap();

        if board.legal_moves().len() > 1 {
            assert_eq!(result.simulations, budget);
            assert_eq!(result.distribution.total(), budget);
            assert_eq!(result.stats.root_visits, budget);
        }
        assert!(board.is_legal(result.action));
    }
}

#[test]
fn single_legal_move_is_returned_without_search() {
    let board = Board::from_grid(&ONE_HOLE_GRID).unwrap();
    assert_eq!(board.legal_moves(), vec![0]);

    for budget in [1, 5, 100] {
        let evaluator = CountingEvaluator::default();
        let config = MctsConfig::for_testing().with_simulations(budget);
        let mut rng = ChaCha20Rng::seed_from_u64(budget as u64);

        let result = run_mcts(&evaluator, config, &board, &mut rng).unwrap();

        assert_eq!(result.action, 0);
        assert_eq!(result.simulations, 0);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.policy[0], 1.0);
    }
}

#[test]
fn win_in_one_found_greedily() {
    let board = Board::replay(&WIN_IN_ONE).unwrap();

    for seed in 0..10 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let result = run_mcts(
            &UniformEvaluator::new(),
            MctsConfig::for_testing(),
            &board,
            &mut rng,
        )
        .unwrap();
        assert_eq!(result.action, 3);
    }
}

#[test]
fn win_in_one_found_when_sampling() {
    let board = Board::replay(&WIN_IN_ONE).unwrap();
    let config = MctsConfig::default()
        .with_simulations(400)
        .with_temperature(1.0);

    let wins = (0..50)
        .filter(|&seed| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let result = run_mcts(&UniformEvaluator::new(), config.clone(), &board, &mut rng)
                .unwrap();
            result.action == 3
        })
        .count();

    assert!(wins >= 30, "winning column chosen in only {wins}/50 searches");
}

#[test]
fn player_two_takes_its_win() {
    // Player two has three in column 1 and is to move.
    let board = Board::replay(&[0, 1, 0, 1, 6, 1, 5]).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2);

    let result = run_mcts(
        &UniformEvaluator::new(),
        MctsConfig::for_testing().with_simulations(100),
        &board,
        &mut rng,
    )
    .unwrap();

    assert_eq!(result.action, 1);
    assert!((result.action_value - 1.0).abs() < 1e-6);
}

#[test]
fn blocks_an_immediate_threat() {
    // Player two has three stacked in column 0; player one must block.
    let board = Board::replay(&[6, 0, 6, 0, 5, 0]).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(9);

    let result = run_mcts(
        &HeuristicEvaluator::new(),
        MctsConfig::for_evaluation().with_simulations(400),
        &board,
        &mut rng,
    )
    .unwrap();

    assert_eq!(result.action, 0);
}

#[test]
fn larger_budget_keeps_chosen_value() {
    let board = Board::replay(&WIN_IN_ONE).unwrap();
    let evaluator = HeuristicEvaluator::new();

    let mut previous = f32::NEG_INFINITY;
    for budget in [50, 100, 200, 400] {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let config = MctsConfig::for_evaluation().with_simulations(budget);
        let result = run_mcts(&evaluator, config, &board, &mut rng).unwrap();

        assert!(result.action_value >= previous - 1e-6);
        previous = result.action_value;
    }
    assert!((previous - 1.0).abs() < 1e-6);
}

#[test]
fn mass_on_full_column_is_renormalized() {
    // Column 3 is full; the evaluator insists on it.
    let board = Board::replay(&[3, 3, 3, 3, 3, 3]).unwrap();
    assert!(!board.is_legal(3));

    let evaluator = FixedColumnEvaluator(3);
    let mut search = MctsSearch::new(&evaluator, MctsConfig::for_testing(), board).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let result = search.run(&mut rng).unwrap();

    assert!(board.is_legal(result.action));
    assert_eq!(result.distribution.visits()[3], 0);

    let tree = search.tree();
    let root = tree.get(tree.root());
    assert_eq!(root.children.len(), 6);
    for &(_, id) in &root.children {
        assert!((tree.get(id).prior - 1.0 / 6.0).abs() < 1e-6);
    }
}

#[test]
fn garbage_evaluator_output_is_sanitized() {
    let mut rng = ChaCha20Rng::seed_from_u64(8);
    let result = run_mcts(
        &GarbageEvaluator,
        MctsConfig::for_testing(),
        &Board::new(),
        &mut rng,
    )
    .unwrap();

    assert!(result.action < COLS as u8);
    assert!(result.value.is_finite());
    assert!(result.value.abs() <= 1.0);
}

#[test]
fn evaluator_failure_is_propagated_without_retry() {
    let evaluator = FailingEvaluator {
        ok_calls: 0,
        calls: AtomicUsize::new(0),
    };
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let err = run_mcts(&evaluator, MctsConfig::for_testing(), &Board::new(), &mut rng).unwrap_err();
    assert!(matches!(err, SearchError::Evaluator(_)));
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);

    // A failure in the middle of the search surfaces the same way.
    let evaluator = FailingEvaluator {
        ok_calls: 3,
        calls: AtomicUsize::new(0),
    };
    let err = run_mcts(&evaluator, MctsConfig::for_testing(), &Board::new(), &mut rng).unwrap_err();
    assert!(matches!(err, SearchError::Evaluator(_)));
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn deadline_stops_after_one_simulation() {
    let config = MctsConfig::for_testing()
        .with_simulations(10_000)
        .with_max_duration(Duration::ZERO);
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    let result = run_mcts(&UniformEvaluator::new(), config, &Board::new(), &mut rng).unwrap();
    assert_eq!(result.simulations, 1);
    assert_eq!(result.distribution.total(), 1);
}

#[test]
fn same_seed_same_result() {
    let board = Board::replay(&[3, 3, 2]).unwrap();
    let config = MctsConfig::default().with_simulations(200);

    let run = |seed| {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        run_mcts(&HeuristicEvaluator::new(), config.clone(), &board, &mut rng).unwrap()
    };

    let a = run(17);
    let b = run(17);
    assert_eq!(a.action, b.action);
    assert_eq!(a.distribution, b.distribution);
}

#[test]
fn evaluator_can_be_shared_across_threads() {
    let evaluator = std::sync::Arc::new(HeuristicEvaluator::new());

    let handles: Vec<_> = (0..4u64)
        .map(|seed| {
            let evaluator = std::sync::Arc::clone(&evaluator);
            std::thread::spawn(move || {
                let mut rng = ChaCha20Rng::seed_from_u64(seed);
                run_mcts(&evaluator, MctsConfig::for_testing(), &Board::new(), &mut rng)
                    .map(|r| r.simulations)
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 50);
    }
}
