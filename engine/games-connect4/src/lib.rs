//! Connect Four rules: a 7 wide, 6 high board where each move drops a disc
//! into a column and four in a line wins.
//!
//! # Board Layout
//!
//! Cells are indexed `row * 7 + col` with row 0 at the bottom, so a disc
//! dropped into column 2 of an empty board lands on cell 2 and the top-right
//! cell is 41.
//!
//! The wire format exchanged with other processes is a 6x7 grid with the
//! *top* row first; see [`Board::from_grid`] and [`Board::to_grid`].
//!
//! # Usage
//!
//! ```rust
//! use games_connect4::{Board, Outcome, Player};
//!
//! let board = Board::replay(&[0, 0, 1, 1, 2, 2, 3]).unwrap();
//! assert_eq!(board.outcome(), Some(Outcome::Win(Player::One)));
//! assert!(board.legal_moves().is_empty());
//! ```

use std::fmt;

use thiserror::Error;

mod grid;

pub use grid::GridError;

/// Board dimensions
pub const COLS: usize = 7;
pub const ROWS: usize = 6;
pub const BOARD_SIZE: usize = COLS * ROWS;

/// Observation size: 42 (player one) + 42 (player two) + 7 (legal) + 2 (mover) = 93
pub const OBS_SIZE: usize = BOARD_SIZE * 2 + COLS + 2;

/// Mask with one bit set per column.
pub const ALL_COLUMNS_MASK: u8 = (1u8 << COLS) - 1;

/// Horizontal, vertical, diagonal /, diagonal \
const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// One of the two players. Player one always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// The other player.
    #[inline]
    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Cell value used on the board and on the wire (1 or 2).
    #[inline]
    pub fn cell_value(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    /// Inverse of [`Player::cell_value`].
    pub fn from_cell_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::One => write!(f, "player one"),
            Player::Two => write!(f, "player two"),
        }
    }
}

/// Result of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win(Player),
    Draw,
}

impl Outcome {
    /// Game result from `player`'s point of view: +1 win, -1 loss, 0 draw.
    pub fn value_for(self, player: Player) -> f32 {
        match self {
            Outcome::Win(winner) if winner == player => 1.0,
            Outcome::Win(_) => -1.0,
            Outcome::Draw => 0.0,
        }
    }
}

/// A move that the rules do not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IllegalMoveError {
    #[error("illegal move: column {0} is out of range (0-6)")]
    OutOfRange(u8),

    #[error("illegal move: column {0} is full")]
    ColumnFull(u8),

    #[error("illegal move: the game is already over")]
    GameOver,
}

/// Connect4 game state
///
/// The board is `Copy`; [`Board::apply`] returns a new board and never mutates
/// the receiver. Once the game is over the board accepts no further moves.
///
/// The mover is switched after every move, including the winning one, so on a
/// board won by player one `to_move()` reports player two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    /// 0=empty, 1=player one, 2=player two. Row 0 at the bottom.
    cells: [u8; BOARD_SIZE],
    /// Number of pieces in each column
    heights: [u8; COLS],
    to_move: Player,
    outcome: Option<Outcome>,
    /// (row, col) of the most recent piece
    last_move: Option<(u8, u8)>,
}

impl Board {
    /// Create the initial empty board with player one to move.
    pub fn new() -> Self {
        Self {
            cells: [0; BOARD_SIZE],
            heights: [0; COLS],
            to_move: Player::One,
            outcome: None,
            last_move: None,
        }
    }

    /// Replay a sequence of columns from the initial position.
    pub fn replay(moves: &[u8]) -> Result<Self, IllegalMoveError> {
        let mut board = Self::new();
        for &column in moves {
            board.play(column)?;
        }
        Ok(board)
    }

    /// Convert column and row to board index
    #[inline]
    pub(crate) fn pos(col: usize, row: usize) -> usize {
        row * COLS + col
    }

    /// Player whose turn it is.
    #[inline]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    /// `Some` once the game is over.
    #[inline]
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// The winner, if the game ended with four in a row.
    pub fn winner(&self) -> Option<Player> {
        match self.outcome {
            Some(Outcome::Win(player)) => Some(player),
            _ => None,
        }
    }

    /// Check if the game is over
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    /// `(terminal, winner)` pair; a draw is `(true, None)`.
    pub fn terminal_status(&self) -> (bool, Option<Player>) {
        (self.is_terminal(), self.winner())
    }

    /// (row, col) of the most recently placed piece. `None` for the initial
    /// board and for boards built from a grid.
    pub fn last_move(&self) -> Option<(usize, usize)> {
        self.last_move.map(|(r, c)| (r as usize, c as usize))
    }

    pub fn moves_played(&self) -> usize {
        self.heights.iter().map(|&h| h as usize).sum()
    }

    /// Piece counts for (player one, player two).
    pub fn piece_counts(&self) -> (usize, usize) {
        self.cells.iter().fold((0, 0), |(one, two), &cell| match cell {
            1 => (one + 1, two),
            2 => (one, two + 1),
            _ => (one, two),
        })
    }

    /// Occupant of a cell; row 0 is the bottom row.
    pub fn cell(&self, row: usize, col: usize) -> Option<Player> {
        if row >= ROWS || col >= COLS {
            return None;
        }
        Player::from_cell_value(self.cells[Self::pos(col, row)])
    }

    /// Number of pieces in a column.
    pub fn column_height(&self, col: usize) -> usize {
        self.heights.get(col).map_or(0, |&h| h as usize)
    }

    /// Whether `column` can be played right now.
    #[inline]
    pub fn is_legal(&self, column: u8) -> bool {
        self.outcome.is_none()
            && (column as usize) < COLS
            && self.heights[column as usize] < ROWS as u8
    }

    /// Get legal moves (columns that are not full), in ascending order.
    pub fn legal_moves(&self) -> Vec<u8> {
        (0..COLS as u8).filter(|&col| self.is_legal(col)).collect()
    }

    /// Bit-mask representation of legal moves.
    ///
    /// Bits 0-6 correspond to columns 0-6. Zero once the game is over.
    pub fn legal_moves_mask(&self) -> u8 {
        if self.is_terminal() {
            return 0;
        }

        self.heights
            .iter()
            .enumerate()
            .fold(0u8, |mask, (col, &height)| {
                if height < ROWS as u8 {
                    mask | (1u8 << col)
                } else {
                    mask
                }
            })
    }

    /// Drop the mover's piece into `column` and return the resulting board.
    pub fn apply(&self, column: u8) -> Result<Board, IllegalMoveError> {
        let mut next = *self;
        next.play(column)?;
        Ok(next)
    }

    /// In-place form of [`Board::apply`]. The board is unchanged on error.
    pub fn play(&mut self, column: u8) -> Result<(), IllegalMoveError> {
        if self.outcome.is_some() {
            return Err(IllegalMoveError::GameOver);
        }
        let col = column as usize;
        if col >= COLS {
            return Err(IllegalMoveError::OutOfRange(column));
        }
        let row = self.heights[col] as usize;
        if row >= ROWS {
            return Err(IllegalMoveError::ColumnFull(column));
        }

        let player = self.to_move;
        self.cells[Self::pos(col, row)] = player.cell_value();
        self.heights[col] += 1;
        self.last_move = Some((row as u8, column));

        if completes_four(&self.cells, col, row, player.cell_value()) {
            self.outcome = Some(Outcome::Win(player));
        } else if self.heights.iter().all(|&h| h as usize >= ROWS) {
            self.outcome = Some(Outcome::Draw);
        }

        self.to_move = player.opponent();
        Ok(())
    }

    /// Would dropping a piece for `player` into `column` make four in a row?
    ///
    /// Ignores whose turn it is, which makes it usable for "block the
    /// opponent" checks. Returns false for unplayable columns.
    pub fn is_winning_move(&self, column: u8, player: Player) -> bool {
        if !self.is_legal(column) {
            return false;
        }
        let col = column as usize;
        let row = self.heights[col] as usize;
        let mut cells = self.cells;
        cells[Self::pos(col, row)] = player.cell_value();
        completes_four(&cells, col, row, player.cell_value())
    }

    /// Neural network input for this position.
    pub fn observation(&self) -> Observation {
        Observation::from_board(self)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..ROWS).rev() {
            for col in 0..COLS {
                let symbol = match self.cells[Self::pos(col, row)] {
                    1 => 'X',
                    2 => 'O',
                    _ => '.',
                };
                write!(f, "{}", symbol)?;
                if col + 1 < COLS {
                    write!(f, " ")?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "0 1 2 3 4 5 6")
    }
}

/// Scan the length-4 windows that contain (col, row) in every direction.
fn completes_four(cells: &[u8; BOARD_SIZE], col: usize, row: usize, value: u8) -> bool {
    DIRECTIONS.iter().any(|&(dc, dr)| {
        (0..4).any(|offset| {
            let start_c = col as i32 - offset * dc;
            let start_r = row as i32 - offset * dr;
            (0..4).all(|k| {
                let c = start_c + k * dc;
                let r = start_r + k * dr;
                (0..COLS as i32).contains(&c)
                    && (0..ROWS as i32).contains(&r)
                    && cells[Board::pos(c as usize, r as usize)] == value
            })
        })
    })
}

/// Full-board scan for any four in a row of `value`.
pub(crate) fn has_four_anywhere(cells: &[u8; BOARD_SIZE], value: u8) -> bool {
    (0..ROWS).any(|row| {
        (0..COLS).any(|col| {
            cells[Board::pos(col, row)] == value && completes_four(cells, col, row, value)
        })
    })
}

/// Network input for one board, laid out as player one's cells, player
/// two's cells, legal columns and a one-hot side to move.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Occupancy planes, player one first
    pub board_view: [f32; BOARD_SIZE * 2],
    /// 1.0 for every open column
    pub legal_moves: [f32; COLS],
    /// Mover indicator: [is_player_one, is_player_two]
    pub current_player: [f32; 2],
}

impl Observation {
    pub fn from_board(board: &Board) -> Self {
        let mut board_view = [0.0; BOARD_SIZE * 2];
        let mut legal_moves = [0.0; COLS];
        let mut current_player = [0.0; 2];

        for (i, &cell) in board.cells.iter().enumerate() {
            if cell == 1 {
                board_view[i] = 1.0;
            } else if cell == 2 {
                board_view[i + BOARD_SIZE] = 1.0;
            }
        }

        for col in board.legal_moves() {
            legal_moves[col as usize] = 1.0;
        }

        match board.to_move {
            Player::One => current_player[0] = 1.0,
            Player::Two => current_player[1] = 1.0,
        }

        Self {
            board_view,
            legal_moves,
            current_player,
        }
    }

    /// Flatten into the 93-float network input.
    pub fn to_vec(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(OBS_SIZE);
        out.extend_from_slice(&self.board_view);
        out.extend_from_slice(&self.legal_moves);
        out.extend_from_slice(&self.current_player);
        out
    }
}
