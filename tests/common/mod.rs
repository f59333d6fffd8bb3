/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![allow(dead_code)]

use std::{fmt, rc::Rc};

use newt::{
    Color, Evaluate, MoveClass, OracleError, PieceKind, Rules, Score, SearchError, TerminalReason,
};
use proptest::prelude::*;

/// A node of a synthetic game tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Indices of the nodes reachable in one move, in enumeration order.
    pub children: Vec<usize>,

    /// Heuristic score for the side to move at this node.
    pub value: i32,

    /// Set for nodes where the game is over.
    pub terminal: Option<TerminalReason>,

    /// Whether the move leading *into* this node is a capture.
    pub capture: bool,
}

/// A layered game DAG. Every edge goes from one layer to the next, so every node is always reached
/// after the same number of plies and with the same side to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub nodes: Vec<Node>,

    /// Number of layers, root included.
    pub layers: usize,
}

/// Raw node description as generated by proptest: `(value, child picks, kind, capture)`.
pub type RawNode = (i32, Vec<usize>, u8, bool);

impl Tree {
    /// Builds a tree from raw layers. The first layer is cut down to a single, non-terminal root.
    ///
    /// Childless nodes above the last layer always end the game, and child picks wrap around the
    /// width of the next layer.
    pub fn from_layers(mut layers: Vec<Vec<RawNode>>) -> Self {
        layers[0].truncate(1);
        layers[0][0].2 = 0;

        let offsets = layers
            .iter()
            .scan(0, |offset, layer| {
                let start = *offset;
                *offset += layer.len();
                Some(start)
            })
            .collect::<Vec<_>>();

        let num_layers = layers.len();
        let mut nodes = Vec::new();

        for (i, layer) in layers.iter().enumerate() {
            let last = i + 1 == num_layers;

            for (value, picks, kind, capture) in layer {
                let terminal = match kind {
                    1 => Some(TerminalReason::Checkmate),
                    2 => Some(TerminalReason::Stalemate),
                    _ => None,
                };

                let mut children = Vec::new();
                if !last && terminal.is_none() {
                    let width = layers[i + 1].len();
                    for pick in picks {
                        let child = offsets[i + 1] + pick % width;
                        if !children.contains(&child) {
                            children.push(child);
                        }
                    }
                }

                nodes.push(Node {
                    children,
                    value: *value,
                    terminal,
                    capture: *capture,
                });
            }
        }

        Self {
            nodes,
            layers: num_layers,
        }
    }

    /// Deepest search that never runs out of moves on a non-terminal node.
    pub fn max_depth(&self) -> u8 {
        (self.layers - 1) as u8
    }
}

/// A position in a [`Tree`].
#[derive(Debug, Clone)]
pub struct TreePosition {
    pub tree: Rc<Tree>,
    pub node: usize,
    pub side: Color,

    /// Node whose move generation fails, if any.
    pub fail_at: Option<usize>,
}

/// A move to the node with this index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge(pub usize);

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl TreePosition {
    pub fn root(tree: Tree) -> Self {
        Self {
            tree: Rc::new(tree),
            node: 0,
            side: Color::White,
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, node: usize) -> Self {
        self.fail_at = Some(node);
        self
    }

    fn current(&self) -> &Node {
        &self.tree.nodes[self.node]
    }
}

/// Message of the error raised at [`TreePosition::fail_at`].
pub const FAILURE: &str = "move generator exploded";

impl Rules for TreePosition {
    type Move = Edge;
    type Key = usize;

    fn validate(&self) -> Result<(), SearchError> {
        if self.node < self.tree.nodes.len() {
            Ok(())
        } else {
            Err(SearchError::InvalidPosition(format!("no node {}", self.node)))
        }
    }

    fn legal_moves(&self) -> Result<Vec<Edge>, OracleError> {
        if self.fail_at == Some(self.node) {
            return Err(OracleError::new(FAILURE));
        }
        Ok(self.current().children.iter().copied().map(Edge).collect())
    }

    fn apply(&self, mv: Edge) -> Result<Self, OracleError> {
        if !self.current().children.contains(&mv.0) {
            return Err(OracleError::new(format!("{mv} is not a child of n{}", self.node)));
        }

        Ok(Self {
            node: mv.0,
            side: self.side.opponent(),
            ..self.clone()
        })
    }

    fn terminal(&self) -> Result<Option<TerminalReason>, OracleError> {
        Ok(self.current().terminal)
    }

    fn side_to_move(&self) -> Color {
        self.side
    }

    fn key(&self) -> usize {
        self.node
    }

    fn classify(&self, mv: Edge) -> Result<MoveClass, OracleError> {
        let capture = self.tree.nodes[mv.0].capture;
        Ok(MoveClass {
            captured: capture.then_some(PieceKind::Knight),
            ..MoveClass::QUIET
        })
    }
}

/// Scores a tree node by its stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeEvaluator;

impl Evaluate<TreePosition> for TreeEvaluator {
    fn heuristic(&self, position: &TreePosition) -> Score {
        Score(position.current().value)
    }
}

/// Random layered trees of 2 to 5 layers, each up to 5 nodes wide.
pub fn arb_tree() -> impl Strategy<Value = Tree> {
    let node = (
        -500i32..500,
        prop::collection::vec(0usize..8, 1..4),
        0u8..6,
        any::<bool>(),
    );
    let layer = prop::collection::vec(node, 1..6);

    prop::collection::vec(layer, 2..6).prop_map(Tree::from_layers)
}
