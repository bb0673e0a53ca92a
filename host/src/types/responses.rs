//! Response types for the move interface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    GameOver,
    Error,
}

/// Reply to a [`MoveRequest`](super::MoveRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveReply {
    pub status: ReplyStatus,
    /// Chosen column
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Root visit counts per column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<u32>>,
    /// Search value for the side to move, in [-1, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
}

impl MoveReply {
    pub fn success(column: u8, distribution: Vec<u32>, value: f32) -> Self {
        Self {
            status: ReplyStatus::Success,
            column: Some(column),
            message: None,
            distribution: Some(distribution),
            value: Some(value),
        }
    }

    pub fn game_over() -> Self {
        Self {
            status: ReplyStatus::GameOver,
            column: None,
            message: Some("Game is already over".to_string()),
            distribution: None,
            value: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            column: None,
            message: Some(message.into()),
            distribution: None,
            value: None,
        }
    }
}
