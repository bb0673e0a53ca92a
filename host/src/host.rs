//! Game host: human moves in, bot replies out.
//!
//! The host owns the session repository and the bot's [`MoveProvider`]. A
//! provider that fails or answers with a column outside the valid moves is
//! replaced by a uniformly random valid column for that turn; the failure is
//! logged and counted but never reaches the caller.

use std::time::{Duration, Instant};

use games_connect4::{Board, Outcome};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, warn};

use crate::metrics;
use crate::policy::{random_move, MoveProvider};
use crate::session::{FirstPlayer, GameSession, SessionError, SessionId, SessionRepository};

/// Why the host overrode the provider's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The provider returned an error
    ProviderError,
    /// The provider returned a column that is not a valid move
    IllegalColumn(u8),
}

impl FallbackReason {
    fn label(self) -> &'static str {
        match self {
            Self::ProviderError => "error",
            Self::IllegalColumn(_) => "illegal",
        }
    }
}

/// What happened during one call into the host.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub session: SessionId,
    pub human_move: Option<u8>,
    pub bot_move: Option<u8>,
    /// Set when the bot's move came from the random fallback
    pub fallback: Option<FallbackReason>,
    pub board: Board,
    pub outcome: Option<Outcome>,
}

impl TurnReport {
    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Ask `provider` for a move and enforce the host contract on the answer.
///
/// Returns `None` only when `board` has no valid moves.
pub fn provider_move_or_random(
    provider: &mut dyn MoveProvider,
    rng: &mut ChaCha20Rng,
    board: &Board,
) -> Option<(u8, Option<FallbackReason>)> {
    let valid = board.legal_moves();
    if valid.is_empty() {
        return None;
    }

    let reason = match provider.select_move(board, &valid) {
        Ok(column) if valid.contains(&column) => return Some((column, None)),
        Ok(column) => {
            warn!(
                provider = provider.name(),
                column,
                ?valid,
                "Provider returned an invalid column, playing a random move"
            );
            FallbackReason::IllegalColumn(column)
        }
        Err(e) => {
            warn!(
                provider = provider.name(),
                error = %e,
                "Provider failed, playing a random move"
            );
            FallbackReason::ProviderError
        }
    };

    metrics::PROVIDER_FALLBACKS
        .with_label_values(&[reason.label()])
        .inc();
    random_move(rng, &valid).map(|column| (column, Some(reason)))
}

/// Hosts human-vs-bot games.
pub struct GameHost {
    sessions: SessionRepository,
    bot: Box<dyn MoveProvider>,
    /// RNG for fallback moves
    rng: ChaCha20Rng,
}

impl GameHost {
    pub fn new(bot: Box<dyn MoveProvider>, max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: SessionRepository::new(max_sessions, idle_timeout),
            bot,
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Fix the fallback RNG seed (used in tests and seeded runs)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
        self
    }

    pub fn bot_name(&self) -> &str {
        self.bot.name()
    }

    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    pub fn session(&self, id: SessionId) -> Result<&GameSession, SessionError> {
        self.sessions.get(id)
    }

    /// Open a game. When the bot moves first its opening move is included
    /// in the report.
    pub fn start(&mut self, first: FirstPlayer) -> Result<TurnReport, SessionError> {
        let id = self.sessions.create(first)?;
        let bot_turn = match first {
            FirstPlayer::Bot => Some(self.bot_reply(id)?),
            FirstPlayer::Human => None,
        };

        let session = self.sessions.get(id)?;
        Ok(TurnReport {
            session: id,
            human_move: None,
            bot_move: bot_turn.map(|(column, _)| column),
            fallback: bot_turn.and_then(|(_, reason)| reason),
            board: *session.board(),
            outcome: session.board().outcome(),
        })
    }

    /// Play the human's `column`, then let the bot answer unless the game
    /// ended.
    pub fn player_move(&mut self, id: SessionId, column: u8) -> Result<TurnReport, SessionError> {
        let session = self.sessions.get_mut(id)?;
        if session.board().is_terminal() {
            return Err(SessionError::GameOver(id));
        }
        if !session.is_human_turn() {
            return Err(SessionError::NotHumanTurn(id));
        }
        session.play(column)?;
        debug!(session = %id, column, "Human move");

        let bot_turn = if session.board().is_terminal() {
            None
        } else {
            Some(self.bot_reply(id)?)
        };

        let session = self.sessions.get(id)?;
        Ok(TurnReport {
            session: id,
            human_move: Some(column),
            bot_move: bot_turn.map(|(column, _)| column),
            fallback: bot_turn.and_then(|(_, reason)| reason),
            board: *session.board(),
            outcome: session.board().outcome(),
        })
    }

    /// End a game early or clean up a finished one.
    pub fn close(&mut self, id: SessionId) -> Option<GameSession> {
        self.sessions.evict(id)
    }

    /// Evict finished sessions idle past the configured timeout.
    pub fn evict_stale(&mut self) -> usize {
        self.sessions.evict_finished_and_idle(Instant::now())
    }

    fn bot_reply(&mut self, id: SessionId) -> Result<(u8, Option<FallbackReason>), SessionError> {
        let session = self.sessions.get_mut(id)?;
        let board = *session.board();
        let (column, reason) =
            provider_move_or_random(self.bot.as_mut(), &mut self.rng, &board)
                .ok_or(SessionError::NoValidMoves(id))?;
        session.play(column)?;
        debug!(session = %id, column, fallback = reason.is_some(), "Bot move");
        Ok((column, reason))
    }
}
