//! Request types for the move interface.

use serde::Deserialize;

/// Ask the engine for a move on a given position.
///
/// `board` is a 6×7 grid, top row first, with 0 = empty, 1 = player one and
/// 2 = player two. Whose turn it is follows from the piece counts.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub board: Vec<Vec<u8>>,
    /// Columns the caller allows; defaults to every legal column
    #[serde(default)]
    pub valid_moves: Option<Vec<u8>>,
    /// Side the caller expects the engine to play (1 or 2)
    #[serde(default)]
    pub player: Option<u8>,
}
