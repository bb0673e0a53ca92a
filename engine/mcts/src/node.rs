//! Search tree nodes.
//!
//! A node stands for the board reached by dropping a piece into `action`
//! from its parent, and doubles as the edge into it: prior, visits and
//! accumulated value all live here.

use games_connect4::Board;

/// Handle of a node inside [`MctsTree`](crate::MctsTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Marks "no node", e.g. the root's parent.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        self != Self::NONE
    }
}

#[derive(Debug, Clone)]
pub struct MctsNode {
    pub parent: NodeId,
    /// Column played from the parent. Meaningless on the root.
    pub action: u8,
    pub board: Board,
    pub visit_count: u32,
    /// Sum of backed-up values, each from the perspective of the side to
    /// move at this node.
    pub value_sum: f32,
    pub prior: f32,
    /// Exact value for the side to move when the game is over here.
    pub terminal_value: Option<f32>,
    /// `(column, child)` in ascending column order; empty until expanded.
    pub children: Vec<(u8, NodeId)>,
}

impl MctsNode {
    pub fn new_root(board: Board) -> Self {
        Self::new_child(NodeId::NONE, 0, 1.0, board)
    }

    pub fn new_child(parent: NodeId, action: u8, prior: f32, board: Board) -> Self {
        let to_move = board.to_move();
        Self {
            parent,
            action,
            terminal_value: board.outcome().map(|o| o.value_for(to_move)),
            board,
            visit_count: 0,
            value_sum: 0.0,
            prior,
            children: Vec::new(),
        }
    }

    /// Average backed-up value, 0 for an unvisited node.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        match self.visit_count {
            0 => 0.0,
            n => self.value_sum / n as f32,
        }
    }

    /// Selection score seen from the parent, whose side to move is the
    /// opposite of ours: `-Q + c * P * sqrt(N_parent) / (1 + N)`.
    #[inline]
    pub fn puct_score(&self, sqrt_parent_visits: f32, c_puct: f32) -> f32 {
        let exploration =
            c_puct * self.prior * sqrt_parent_visits / (1.0 + self.visit_count as f32);
        exploration - self.mean_value()
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal_value.is_some()
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty()
    }

    /// Selection stops here: the game is over or the children are unknown.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_terminal() || !self.is_expanded()
    }
}
