//! Game session repository
//!
//! Every hosted game lives in a [`GameSession`] keyed by [`SessionId`]. A
//! session is `Active` while moves can be played, `Terminal` once the game
//! is won or drawn, and evicted when it is removed from the repository.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use games_connect4::{Board, IllegalMoveError, Outcome, Player};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::metrics;

/// Opaque handle for a hosted game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

/// Session lifecycle stage while the session is still held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Terminal,
}

/// Who opens the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstPlayer {
    #[default]
    Human,
    Bot,
}

impl FromStr for FirstPlayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "player" => Ok(Self::Human),
            "bot" => Ok(Self::Bot),
            other => Err(format!("unknown first player '{}' (expected human or bot)", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session limit of {0} reached")]
    CapacityReached(usize),

    #[error("no session {0}")]
    NotFound(SessionId),

    #[error("game {0} is already over")]
    GameOver(SessionId),

    #[error("it is not the human's turn in {0}")]
    NotHumanTurn(SessionId),

    #[error("no valid moves left in {0}")]
    NoValidMoves(SessionId),

    #[error(transparent)]
    IllegalMove(#[from] IllegalMoveError),
}

/// One hosted game.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: SessionId,
    board: Board,
    human: Player,
    moves: Vec<u8>,
    created_at: Instant,
    last_activity: Instant,
}

impl GameSession {
    fn new(id: SessionId, first: FirstPlayer, now: Instant) -> Self {
        let human = match first {
            FirstPlayer::Human => Player::One,
            FirstPlayer::Bot => Player::Two,
        };
        Self {
            id,
            board: Board::new(),
            human,
            moves: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn human_player(&self) -> Player {
        self.human
    }

    pub fn bot_player(&self) -> Player {
        self.human.opponent()
    }

    /// Columns played so far, in order.
    pub fn moves(&self) -> &[u8] {
        &self.moves
    }

    pub fn state(&self) -> SessionState {
        if self.board.is_terminal() {
            SessionState::Terminal
        } else {
            SessionState::Active
        }
    }

    pub fn is_human_turn(&self) -> bool {
        !self.board.is_terminal() && self.board.to_move() == self.human
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the last move (or creation) as seen from `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Apply a move for whoever is to move. The session is unchanged on error.
    pub fn play(&mut self, column: u8) -> Result<&Board, SessionError> {
        if self.board.is_terminal() {
            return Err(SessionError::GameOver(self.id));
        }
        self.board.play(column)?;
        self.moves.push(column);
        self.last_activity = Instant::now();
        metrics::MOVES_PLAYED.inc();

        if let Some(outcome) = self.board.outcome() {
            let result = match outcome {
                Outcome::Draw => "draw",
                Outcome::Win(p) if p == self.human => "human",
                Outcome::Win(_) => "bot",
            };
            metrics::GAMES_COMPLETED.with_label_values(&[result]).inc();
            info!(session = %self.id, result, moves = self.moves.len(), "Game finished");
        }
        Ok(&self.board)
    }
}

/// Sessions keyed by id, with a size limit and idle eviction.
#[derive(Debug)]
pub struct SessionRepository {
    sessions: HashMap<SessionId, GameSession>,
    next_id: u64,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionRepository {
    pub fn new(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            max_sessions,
            idle_timeout,
        }
    }

    /// Open a new session. When the repository is full, finished idle
    /// sessions are evicted first; if that frees nothing the call fails.
    pub fn create(&mut self, first: FirstPlayer) -> Result<SessionId, SessionError> {
        if self.sessions.len() >= self.max_sessions {
            self.evict_finished_and_idle(Instant::now());
            if self.sessions.len() >= self.max_sessions {
                return Err(SessionError::CapacityReached(self.max_sessions));
            }
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.sessions
            .insert(id, GameSession::new(id, first, Instant::now()));

        metrics::SESSIONS_CREATED.inc();
        metrics::SESSIONS_ACTIVE.set(self.sessions.len() as i64);
        debug!(session = %id, ?first, "Session created");
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> Result<&GameSession, SessionError> {
        self.sessions.get(&id).ok_or(SessionError::NotFound(id))
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut GameSession, SessionError> {
        self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))
    }

    /// Remove a session regardless of its state.
    pub fn evict(&mut self, id: SessionId) -> Option<GameSession> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            metrics::SESSIONS_EVICTED.inc();
            metrics::SESSIONS_ACTIVE.set(self.sessions.len() as i64);
            debug!(session = %id, "Session evicted");
        }
        removed
    }

    /// Drop every finished session that has been idle for at least the
    /// configured timeout. Returns how many were removed.
    pub fn evict_finished_and_idle(&mut self, now: Instant) -> usize {
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            session.state() == SessionState::Active || session.idle_for(now) < timeout
        });
        let evicted = before - self.sessions.len();

        if evicted > 0 {
            metrics::SESSIONS_EVICTED.inc_by(evicted as u64);
            metrics::SESSIONS_ACTIVE.set(self.sessions.len() as i64);
            info!(evicted, remaining = self.sessions.len(), "Evicted idle finished sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}
