//! Move providers: anything that can answer "which column?" for a board.
//!
//! The host only talks to providers through [`MoveProvider`]. A provider may
//! fail or hand back a column that is not in `valid_moves`; the host treats
//! both the same way (see [`crate::host::GameHost`]).

use games_connect4::Board;
use mcts::SearchError;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;

/// Centre column, preferred by the heuristic bot.
pub const CENTER_COLUMN: u8 = 3;

/// Errors a move provider can report.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no valid moves offered")]
    NoValidMoves,

    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Contract between the host and a bot.
pub trait MoveProvider: Send {
    /// Short name used in logs and arena reports.
    fn name(&self) -> &str;

    /// Pick a column for the player to move on `board`.
    ///
    /// `valid_moves` is the host's view of the legal columns, in ascending
    /// order.
    fn select_move(&mut self, board: &Board, valid_moves: &[u8]) -> Result<u8, ProviderError>;
}

impl<P: MoveProvider + ?Sized> MoveProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn select_move(&mut self, board: &Board, valid_moves: &[u8]) -> Result<u8, ProviderError> {
        (**self).select_move(board, valid_moves)
    }
}

/// Uniformly random choice among `valid_moves`.
pub fn random_move(rng: &mut ChaCha20Rng, valid_moves: &[u8]) -> Option<u8> {
    valid_moves.choose(rng).copied()
}

/// Random policy that selects columns uniformly at random.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveProvider for RandomPolicy {
    fn name(&self) -> &str {
        "random"
    }

    fn select_move(&mut self, _board: &Board, valid_moves: &[u8]) -> Result<u8, ProviderError> {
        random_move(&mut self.rng, valid_moves).ok_or(ProviderError::NoValidMoves)
    }
}

/// Rule-based bot: win now, else block the opponent's immediate win, else
/// the centre column, else a random valid column.
#[derive(Debug)]
pub struct HeuristicPolicy {
    rng: ChaCha20Rng,
}

impl HeuristicPolicy {
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveProvider for HeuristicPolicy {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn select_move(&mut self, board: &Board, valid_moves: &[u8]) -> Result<u8, ProviderError> {
        if valid_moves.is_empty() {
            return Err(ProviderError::NoValidMoves);
        }

        let me = board.to_move();
        if let Some(&col) = valid_moves
            .iter()
            .find(|&&col| board.is_winning_move(col, me))
        {
            return Ok(col);
        }

        let them = me.opponent();
        if let Some(&col) = valid_moves
            .iter()
            .find(|&&col| board.is_winning_move(col, them))
        {
            return Ok(col);
        }

        if valid_moves.contains(&CENTER_COLUMN) {
            return Ok(CENTER_COLUMN);
        }

        random_move(&mut self.rng, valid_moves).ok_or(ProviderError::NoValidMoves)
    }
}
