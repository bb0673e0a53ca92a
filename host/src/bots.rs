//! Building move providers from configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use mcts::{Evaluator, MctsConfig};

use crate::mcts_policy::MctsPolicy;
use crate::policy::{HeuristicPolicy, MoveProvider, ProviderError, RandomPolicy};

/// Which provider plays for the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotKind {
    Mcts,
    Heuristic,
    Random,
}

impl FromStr for BotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mcts" => Ok(Self::Mcts),
            "heuristic" => Ok(Self::Heuristic),
            "random" => Ok(Self::Random),
            other => Err(format!(
                "unknown bot '{}' (expected mcts, heuristic or random)",
                other
            )),
        }
    }
}

impl fmt::Display for BotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mcts => "mcts",
            Self::Heuristic => "heuristic",
            Self::Random => "random",
        };
        f.write_str(name)
    }
}

/// Everything needed to build a fresh provider of one kind.
///
/// Cheap to clone; MCTS providers built from the same factory share the
/// evaluator but never a tree.
#[derive(Clone)]
pub struct BotFactory {
    kind: BotKind,
    evaluator: Option<Arc<dyn Evaluator>>,
    mcts_config: MctsConfig,
}

impl fmt::Debug for BotFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotFactory")
            .field("kind", &self.kind)
            .field("has_evaluator", &self.evaluator.is_some())
            .field("mcts_config", &self.mcts_config)
            .finish()
    }
}

impl BotFactory {
    pub fn heuristic() -> Self {
        Self {
            kind: BotKind::Heuristic,
            evaluator: None,
            mcts_config: MctsConfig::for_play(),
        }
    }

    pub fn random() -> Self {
        Self {
            kind: BotKind::Random,
            evaluator: None,
            mcts_config: MctsConfig::for_play(),
        }
    }

    pub fn mcts(evaluator: Arc<dyn Evaluator>, config: MctsConfig) -> Self {
        Self {
            kind: BotKind::Mcts,
            evaluator: Some(evaluator),
            mcts_config: config,
        }
    }

    pub fn kind(&self) -> BotKind {
        self.kind
    }

    /// Build a provider. `seed` fixes its RNG; `None` draws from entropy.
    pub fn build(&self, seed: Option<u64>) -> Result<Box<dyn MoveProvider>, ProviderError> {
        let provider: Box<dyn MoveProvider> = match self.kind {
            BotKind::Random => Box::new(match seed {
                Some(seed) => RandomPolicy::with_seed(seed),
                None => RandomPolicy::new(),
            }),
            BotKind::Heuristic => Box::new(match seed {
                Some(seed) => HeuristicPolicy::with_seed(seed),
                None => HeuristicPolicy::new(),
            }),
            BotKind::Mcts => {
                let evaluator = self.evaluator.clone().ok_or_else(|| {
                    ProviderError::Unavailable("MCTS bot has no evaluator".to_string())
                })?;
                let policy = match seed {
                    Some(seed) => MctsPolicy::with_seed(evaluator, seed),
                    None => MctsPolicy::new(evaluator),
                };
                Box::new(policy.with_config(self.mcts_config.clone()))
            }
        };
        Ok(provider)
    }
}
