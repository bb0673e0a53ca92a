//! Wire grid conversion.
//!
//! Other processes exchange boards as a 6x7 grid of small integers with the
//! top row first (0 = empty, 1 = player one, 2 = player two). A grid is
//! validated once here; after that the rules engine only sees boards that
//! could have come from legal play.

use thiserror::Error;

use crate::{has_four_anywhere, Board, Outcome, Player, BOARD_SIZE, COLS, ROWS};

/// Reasons a wire grid does not describe a reachable position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("invalid board dimensions: expected 6 rows, got {0}")]
    RowCount(usize),

    #[error("invalid board dimensions: row {row} has {len} cells, expected 7")]
    RowLength { row: usize, len: usize },

    #[error("invalid cell value {value} at row {row}, column {col}")]
    CellValue { row: usize, col: usize, value: u8 },

    #[error("floating piece at row {row}, column {col}")]
    FloatingPiece { row: usize, col: usize },

    #[error("impossible piece counts: player one has {one}, player two has {two}")]
    PieceCount { one: usize, two: usize },

    #[error("both players have four in a row")]
    MultipleWinners,

    #[error("{winner} has four in a row but did not move last")]
    WinnerOutOfTurn { winner: Player },
}

impl Board {
    /// Build a board from a wire grid (top row first).
    ///
    /// The mover is derived from the piece counts. A four in a row anywhere
    /// makes the board terminal; a full board without one is a draw. The
    /// result has no `last_move`.
    pub fn from_grid<R: AsRef<[u8]>>(grid: &[R]) -> Result<Board, GridError> {
        if grid.len() != ROWS {
            return Err(GridError::RowCount(grid.len()));
        }

        let mut cells = [0u8; BOARD_SIZE];
        for (wire_row, row) in grid.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != COLS {
                return Err(GridError::RowLength {
                    row: wire_row,
                    len: row.len(),
                });
            }
            for (col, &value) in row.iter().enumerate() {
                if value > 2 {
                    return Err(GridError::CellValue {
                        row: wire_row,
                        col,
                        value,
                    });
                }
                cells[Board::pos(col, ROWS - 1 - wire_row)] = value;
            }
        }

        let mut heights = [0u8; COLS];
        for (col, height) in heights.iter_mut().enumerate() {
            let filled = (0..ROWS)
                .take_while(|&row| cells[Board::pos(col, row)] != 0)
                .count();
            if let Some(row) = (filled..ROWS).find(|&row| cells[Board::pos(col, row)] != 0) {
                return Err(GridError::FloatingPiece {
                    row: ROWS - 1 - row,
                    col,
                });
            }
            *height = filled as u8;
        }

        let one = cells.iter().filter(|&&c| c == 1).count();
        let two = cells.iter().filter(|&&c| c == 2).count();
        let to_move = if one == two {
            Player::One
        } else if one == two + 1 {
            Player::Two
        } else {
            return Err(GridError::PieceCount { one, two });
        };

        let one_wins = has_four_anywhere(&cells, Player::One.cell_value());
        let two_wins = has_four_anywhere(&cells, Player::Two.cell_value());
        let outcome = match (one_wins, two_wins) {
            (true, true) => return Err(GridError::MultipleWinners),
            (true, false) | (false, true) => {
                let winner = if one_wins { Player::One } else { Player::Two };
                // The player who moved last is the one not on move.
                if winner != to_move.opponent() {
                    return Err(GridError::WinnerOutOfTurn { winner });
                }
                Some(Outcome::Win(winner))
            }
            (false, false) if one + two == BOARD_SIZE => Some(Outcome::Draw),
            (false, false) => None,
        };

        Ok(Board {
            cells,
            heights,
            to_move,
            outcome,
            last_move: None,
        })
    }

    /// Wire grid for this board, top row first.
    pub fn to_grid(&self) -> Vec<Vec<u8>> {
        (0..ROWS)
            .rev()
            .map(|row| {
                (0..COLS)
                    .map(|col| self.cells[Board::pos(col, row)])
                    .collect()
            })
            .collect()
    }
}
