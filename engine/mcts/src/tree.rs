//! Search tree for one MCTS run.
//!
//! Nodes live in a single `Vec` and point at each other through [`NodeId`]
//! handles, so the tree never needs reference counting and is freed in one
//! go when the search that owns it is dropped.

use games_connect4::{Board, COLS};

use crate::node::{MctsNode, NodeId};

#[derive(Debug)]
pub struct MctsTree {
    nodes: Vec<MctsNode>,
    /// Always `NodeId(0)`
    root: NodeId,
}

impl MctsTree {
    /// Tree holding only a root for `board`.
    pub fn new(board: Board) -> Self {
        Self {
            nodes: vec![MctsNode::new_root(board)],
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Panics on a handle from another tree.
    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Push `node` into the arena without linking it to a parent.
    pub fn allocate(&mut self, node: MctsNode) -> NodeId {
        self.nodes.push(node);
        NodeId((self.nodes.len() - 1) as u32)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// False for every constructed tree; the root is never removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in allocation order.
    #[inline]
    pub fn arena(&self) -> &[MctsNode] {
        &self.nodes
    }

    /// Child of `node_id` with the highest PUCT score. Only a strictly
    /// higher score replaces the current best, so ties keep the lowest
    /// column.
    pub fn select_child(&self, node_id: NodeId, c_puct: f32) -> Option<NodeId> {
        let parent = self.get(node_id);
        let sqrt_n = (parent.visit_count as f32).sqrt();

        parent
            .children
            .iter()
            .map(|&(_, id)| (id, self.get(id).puct_score(sqrt_n, c_puct)))
            .fold(None, |best: Option<(NodeId, f32)>, (id, score)| match best {
                Some((_, top)) if score <= top => best,
                _ => Some((id, score)),
            })
            .map(|(id, _)| id)
    }

    /// Allocate a node for `board` and link it under `parent_id`.
    pub fn add_child(&mut self, parent_id: NodeId, action: u8, prior: f32, board: Board) -> NodeId {
        let id = self.allocate(MctsNode::new_child(parent_id, action, prior, board));
        self.get_mut(parent_id).children.push((action, id));
        id
    }

    /// Credit `value` to `leaf_id` and every ancestor up to the root,
    /// flipping its sign at each step since the player to move alternates.
    pub fn backpropagate(&mut self, leaf_id: NodeId, value: f32) {
        let mut id = leaf_id;
        let mut v = value;
        while id.is_some() {
            let node = self.get_mut(id);
            node.visit_count += 1;
            node.value_sum += v;
            id = node.parent;
            v = -v;
        }
    }

    /// Visit count of each root child, indexed by column.
    pub fn root_visits(&self) -> [u32; COLS] {
        let mut visits = [0u32; COLS];
        for &(action, id) in &self.get(self.root).children {
            visits[action as usize] = self.get(id).visit_count;
        }
        visits
    }

    /// Root child reached by `action`, if it was expanded.
    pub fn root_child(&self, action: u8) -> Option<&MctsNode> {
        self.get(self.root)
            .children
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, id)| self.get(*id))
    }

    /// Most visited root column with its count, lowest column on ties.
    /// `None` before the root is expanded.
    pub fn best_action(&self) -> Option<(u8, u32)> {
        let visits = self.root_visits();
        self.get(self.root)
            .children
            .iter()
            .map(|&(action, _)| (action, visits[action as usize]))
            .fold(None, |best, (action, n)| match best {
                Some((_, top)) if n <= top => best,
                _ => Some((action, n)),
            })
    }

    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.len(),
            root_visits: root.visit_count,
            root_value: root.mean_value(),
            max_depth: self.compute_max_depth(),
        }
    }

    /// Longest root-to-leaf path, counted in moves.
    fn compute_max_depth(&self) -> u32 {
        let mut deepest = 0;
        let mut pending = vec![(self.root, 0u32)];
        while let Some((id, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(self.get(id).children.iter().map(|&(_, c)| (c, depth + 1)));
        }
        deepest
    }
}

/// Summary of a finished search tree, for logs and benchmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    /// Mean root value for the player to move
    pub root_value: f32,
    pub max_depth: u32,
}
