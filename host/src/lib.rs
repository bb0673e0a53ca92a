//! Game host for the Connect Four engine.
//!
//! Sits between callers and the search: it validates positions at the
//! boundary, asks a [`MoveProvider`] for moves, substitutes a random valid
//! column when the provider fails, and keeps per-game sessions.
//!
//! - [`policy`]: the provider contract plus the random and heuristic bots
//! - [`mcts_policy`]: the MCTS bot and evaluator loading
//! - [`session`]: the session repository
//! - [`host`]: human-vs-bot turns with the random fallback
//! - [`analyze`]: one-shot JSON move requests
//! - [`arena`]: bot-vs-bot matches on tokio's blocking pool

pub mod analyze;
pub mod arena;
pub mod bots;
pub mod config;
pub mod host;
pub mod mcts_policy;
pub mod metrics;
pub mod policy;
pub mod session;
pub mod types;

pub use analyze::analyze;
pub use arena::{run_arena, ArenaConfig, ArenaError, ArenaReport, GameRecord, GameResult};
pub use bots::{BotFactory, BotKind};
pub use host::{provider_move_or_random, FallbackReason, GameHost, TurnReport};
pub use mcts_policy::{load_evaluator, EvaluatorKind, MctsPolicy};
pub use policy::{HeuristicPolicy, MoveProvider, ProviderError, RandomPolicy};
pub use session::{
    FirstPlayer, GameSession, SessionError, SessionId, SessionRepository, SessionState,
};
pub use types::{MoveReply, MoveRequest, ReplyStatus};
