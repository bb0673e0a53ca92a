//! Head-to-head matches between two bots.
//!
//! Each game builds fresh providers and runs on tokio's blocking pool, so
//! searches in different games proceed in parallel while every game keeps
//! its own trees.

use std::sync::Arc;

use games_connect4::{Board, Outcome, Player};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::bots::BotFactory;
use crate::host::provider_move_or_random;
use crate::policy::{MoveProvider, ProviderError};

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("failed to build provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("game task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("arena needs at least one game and one worker")]
    Empty,
}

/// Result of one game from the challenger's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    pub index: u32,
    pub challenger_first: bool,
    pub result: GameResult,
    pub moves: Vec<u8>,
    /// Moves replaced by the random fallback, both sides
    pub fallbacks: u32,
}

/// Totals over a whole match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArenaReport {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub fallbacks: u32,
    pub total_moves: u64,
}

impl ArenaReport {
    fn record(&mut self, game: &GameRecord) {
        self.games += 1;
        match game.result {
            GameResult::Win => self.wins += 1,
            GameResult::Loss => self.losses += 1,
            GameResult::Draw => self.draws += 1,
        }
        self.fallbacks += game.fallbacks;
        self.total_moves += game.moves.len() as u64;
    }

    /// Challenger score with draws counted as half a win.
    pub fn score(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        (self.wins as f64 + 0.5 * self.draws as f64) / self.games as f64
    }
}

#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub games: u32,
    /// Games in flight at once
    pub concurrency: usize,
    /// Game `i` seeds its providers from `seed + i`
    pub seed: u64,
}

/// Play one full game. `first` moves as player one.
pub fn play_game(
    first: &mut dyn MoveProvider,
    second: &mut dyn MoveProvider,
    rng: &mut ChaCha20Rng,
) -> (Board, Vec<u8>, u32) {
    let mut board = Board::new();
    let mut moves = Vec::new();
    let mut fallbacks = 0;

    while !board.is_terminal() {
        let provider: &mut dyn MoveProvider = match board.to_move() {
            Player::One => &mut *first,
            Player::Two => &mut *second,
        };
        let Some((column, reason)) = provider_move_or_random(provider, rng, &board) else {
            break;
        };
        if reason.is_some() {
            fallbacks += 1;
        }
        // The column comes from the legal move list
        if board.play(column).is_err() {
            break;
        }
        moves.push(column);
    }

    (board, moves, fallbacks)
}

fn play_seeded_game(
    index: u32,
    challenger: &BotFactory,
    opponent: &BotFactory,
    seed: u64,
) -> Result<GameRecord, ProviderError> {
    let mut challenger_bot = challenger.build(Some(seed))?;
    let mut opponent_bot = opponent.build(Some(seed.wrapping_add(1 << 32)))?;
    let mut rng = ChaCha20Rng::seed_from_u64(seed);

    let challenger_first = index % 2 == 0;
    let (board, moves, fallbacks) = if challenger_first {
        play_game(challenger_bot.as_mut(), opponent_bot.as_mut(), &mut rng)
    } else {
        play_game(opponent_bot.as_mut(), challenger_bot.as_mut(), &mut rng)
    };

    let challenger_side = if challenger_first {
        Player::One
    } else {
        Player::Two
    };
    let result = match board.outcome() {
        Some(Outcome::Win(p)) if p == challenger_side => GameResult::Win,
        Some(Outcome::Win(_)) => GameResult::Loss,
        _ => GameResult::Draw,
    };

    debug!(index, ?result, moves = moves.len(), "Arena game finished");
    Ok(GameRecord {
        index,
        challenger_first,
        result,
        moves,
        fallbacks,
    })
}

/// Play `config.games` games, alternating who moves first.
pub async fn run_arena(
    challenger: BotFactory,
    opponent: BotFactory,
    config: ArenaConfig,
) -> Result<(ArenaReport, Vec<GameRecord>), ArenaError> {
    if config.games == 0 || config.concurrency == 0 {
        return Err(ArenaError::Empty);
    }

    info!(
        games = config.games,
        challenger = %challenger.kind(),
        opponent = %opponent.kind(),
        concurrency = config.concurrency,
        "Starting arena"
    );

    let challenger = Arc::new(challenger);
    let opponent = Arc::new(opponent);
    let permits = Arc::new(Semaphore::new(config.concurrency));
    let mut tasks = JoinSet::new();

    for index in 0..config.games {
        let challenger = Arc::clone(&challenger);
        let opponent = Arc::clone(&opponent);
        let permits = Arc::clone(&permits);
        let seed = config.seed.wrapping_add(u64::from(index));

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            tokio::task::spawn_blocking(move || {
                play_seeded_game(index, &challenger, &opponent, seed)
            })
            .await
        });
    }

    let mut report = ArenaReport::default();
    let mut records = Vec::with_capacity(config.games as usize);
    while let Some(joined) = tasks.join_next().await {
        let record = joined???;
        report.record(&record);
        records.push(record);
    }
    records.sort_by_key(|r| r.index);

    info!(
        wins = report.wins,
        losses = report.losses,
        draws = report.draws,
        score = report.score(),
        "Arena finished"
    );
    Ok((report, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RandomPolicy;
    use mcts::{HeuristicEvaluator, MctsConfig};

    #[test]
    fn test_play_game_reaches_terminal() {
        let mut a = RandomPolicy::with_seed(1);
        let mut b = RandomPolicy::with_seed(2);
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let (board, moves, fallbacks) = play_game(&mut a, &mut b, &mut rng);
        assert!(board.is_terminal());
        assert_eq!(board.moves_played(), moves.len());
        assert_eq!(fallbacks, 0);
        assert_eq!(Board::replay(&moves).unwrap(), board);
    }

    #[test]
    fn test_report_score() {
        let mut report = ArenaReport::default();
        assert_eq!(report.score(), 0.0);
        for result in [GameResult::Win, GameResult::Draw, GameResult::Loss, GameResult::Win] {
            report.record(&GameRecord {
                index: 0,
                challenger_first: true,
                result,
                moves: vec![3; 7],
                fallbacks: 0,
            });
        }
        assert_eq!(report.games, 4);
        assert_eq!(report.total_moves, 28);
        assert!((report.score() - 0.625).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_arena_alternates_and_counts() {
        let config = ArenaConfig {
            games: 6,
            concurrency: 3,
            seed: 11,
        };
        let (report, records) = run_arena(BotFactory::heuristic(), BotFactory::random(), config)
            .await
            .unwrap();

        assert_eq!(report.games, 6);
        assert_eq!(report.wins + report.losses + report.draws, 6);
        assert_eq!(records.len(), 6);
        let firsts = records.iter().filter(|r| r.challenger_first).count();
        assert_eq!(firsts, 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.index as usize, i);
        }
    }

    #[tokio::test]
    async fn test_arena_is_reproducible_with_seed() {
        let evaluator = Arc::new(HeuristicEvaluator::new());
        let mcts = BotFactory::mcts(evaluator, MctsConfig::for_testing().with_simulations(30));
        let config = ArenaConfig {
            games: 2,
            concurrency: 2,
            seed: 5,
        };

        let (_, first) = run_arena(mcts.clone(), BotFactory::random(), config.clone())
            .await
            .unwrap();
        let (_, second) = run_arena(mcts, BotFactory::random(), config).await.unwrap();

        let moves = |records: &[GameRecord]| {
            records
                .iter()
                .map(|r| r.moves.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(moves(&first), moves(&second));
    }

    #[tokio::test]
    async fn test_arena_rejects_empty_match() {
        let config = ArenaConfig {
            games: 0,
            concurrency: 1,
            seed: 0,
        };
        let result = run_arena(BotFactory::random(), BotFactory::random(), config).await;
        assert!(matches!(result, Err(ArenaError::Empty)));
    }
}
