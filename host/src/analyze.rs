//! One-shot move analysis for a position supplied over the wire.

use games_connect4::{Board, Player};
use tracing::{info, warn};

use crate::mcts_policy::MctsPolicy;
use crate::types::{MoveReply, MoveRequest};

/// Validate `request`, search the position and build the reply.
///
/// Never fails: every problem becomes an `error` reply.
pub fn analyze(request: &MoveRequest, policy: &mut MctsPolicy) -> MoveReply {
    let board = match Board::from_grid(&request.board) {
        Ok(board) => board,
        Err(e) => return MoveReply::error(format!("Invalid board: {}", e)),
    };

    if board.is_terminal() {
        return MoveReply::game_over();
    }

    if let Some(requested) = request.player {
        match Player::from_cell_value(requested) {
            Some(player) if player == board.to_move() => {}
            Some(player) => {
                return MoveReply::error(format!("It's not {}'s turn", player));
            }
            None => {
                return MoveReply::error(format!("player must be 1 or 2, got {}", requested));
            }
        }
    }

    let allowed = match allowed_moves(&board, request.valid_moves.as_deref()) {
        Ok(allowed) => allowed,
        Err(message) => return MoveReply::error(message),
    };

    let result = match policy.search(&board) {
        Ok(result) => result,
        Err(e) => return MoveReply::error(format!("Search failed: {}", e)),
    };

    let visits = result.distribution.visits();
    let column = if allowed.contains(&result.action) {
        result.action
    } else {
        // Most visited allowed column; lowest index wins ties
        let best = allowed
            .iter()
            .copied()
            .fold(None, |best: Option<u8>, col| match best {
                Some(b) if visits[b as usize] >= visits[col as usize] => Some(b),
                _ => Some(col),
            });
        match best {
            Some(col) => {
                warn!(
                    searched = result.action,
                    played = col,
                    "Search chose a column outside valid_moves"
                );
                col
            }
            None => return MoveReply::error("No valid moves available"),
        }
    };

    info!(
        column,
        value = result.value,
        simulations = result.simulations,
        "Analyzed position"
    );
    MoveReply::success(column, visits.to_vec(), result.value)
}

/// Intersect the caller's column list with the board's legal moves.
fn allowed_moves(board: &Board, requested: Option<&[u8]>) -> Result<Vec<u8>, String> {
    let legal = board.legal_moves();
    let Some(requested) = requested else {
        return Ok(legal);
    };

    if let Some(bad) = requested.iter().find(|&&col| !legal.contains(&col)) {
        return Err(format!("valid_moves contains unplayable column {}", bad));
    }
    if requested.is_empty() {
        return Err("valid_moves is empty".to_string());
    }

    let mut allowed = requested.to_vec();
    allowed.sort_unstable();
    allowed.dedup();
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReplyStatus;
    use mcts::{HeuristicEvaluator, MctsConfig};
    use std::sync::Arc;

    fn policy() -> MctsPolicy {
        MctsPolicy::with_seed(Arc::new(HeuristicEvaluator::new()), 42)
            .with_config(MctsConfig::for_testing().with_simulations(200))
    }

    fn request(moves: &[u8]) -> MoveRequest {
        MoveRequest {
            board: Board::replay(moves).unwrap().to_grid(),
            valid_moves: None,
            player: None,
        }
    }

    #[test]
    fn test_analyze_finds_win() {
        let reply = analyze(&request(&[0, 0, 1, 1, 2, 2]), &mut policy());
        assert_eq!(reply.status, ReplyStatus::Success);
        assert_eq!(reply.column, Some(3));
        let distribution = reply.distribution.unwrap();
        assert_eq!(distribution.len(), 7);
        assert_eq!(distribution.iter().sum::<u32>(), 200);
    }

    #[test]
    fn test_analyze_game_over() {
        let reply = analyze(&request(&[0, 1, 0, 1, 0, 1, 0]), &mut policy());
        assert_eq!(reply.status, ReplyStatus::GameOver);
        assert_eq!(reply.column, None);
    }

    #[test]
    fn test_analyze_invalid_dimensions() {
        let req = MoveRequest {
            board: vec![vec![0; 7]; 5],
            valid_moves: None,
            player: None,
        };
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Error);
        assert!(reply.message.unwrap().starts_with("Invalid board"));
    }

    #[test]
    fn test_analyze_wrong_turn() {
        // One piece played, so player two is to move
        let mut req = request(&[3]);
        req.player = Some(1);
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Error);

        req.player = Some(2);
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Success);

        req.player = Some(5);
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Error);
    }

    #[test]
    fn test_analyze_respects_valid_moves() {
        // Column 3 wins, but the caller only allows 5 and 6
        let mut req = request(&[0, 0, 1, 1, 2, 2]);
        req.valid_moves = Some(vec![6, 5]);
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Success);
        assert!(matches!(reply.column, Some(5) | Some(6)));
    }

    #[test]
    fn test_analyze_rejects_unplayable_valid_moves() {
        let mut req = request(&[]);
        req.valid_moves = Some(vec![2, 8]);
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Error);

        req.valid_moves = Some(vec![]);
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Error);
    }

    #[test]
    fn test_reply_json_shape() {
        let reply = analyze(&request(&[0, 0, 1, 1, 2, 2]), &mut policy());
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["move"], 3);
        assert!(json.get("message").is_none());

        let over = serde_json::to_value(MoveReply::game_over()).unwrap();
        assert_eq!(over["status"], "game_over");
        assert!(over.get("move").is_none());
    }

    #[test]
    fn test_request_parses_from_json() {
        let json = r#"{"board": [[0,0,0,0,0,0,0],[0,0,0,0,0,0,0],[0,0,0,0,0,0,0],
                                 [0,0,0,0,0,0,0],[0,0,0,0,0,0,0],[0,0,0,1,0,0,0]],
                       "player": 2}"#;
        let req: MoveRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.player, Some(2));
        assert!(req.valid_moves.is_none());
        let reply = analyze(&req, &mut policy());
        assert_eq!(reply.status, ReplyStatus::Success);
    }
}
