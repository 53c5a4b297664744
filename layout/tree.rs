/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Spanning tree over the visible graph and the two layout walks.
//!
//! Procedure nodes sit on even depths. Data written by a procedure hangs one
//! depth below it; data read by a procedure but not reachable otherwise is a
//! satellite one depth above it.

use euclid::default::{Point2D, Size2D};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::LayoutConfig;
use crate::graph::{EdgeKind, Graph, NodeKey};

#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    pub(crate) key: NodeKey,
    pub(crate) depth: usize,
    pub(crate) size: Size2D<f32>,
    pub(crate) children: Vec<usize>,
    pub(crate) satellites: Vec<usize>,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Visible nodes reachable from a root, in placement order.
#[derive(Debug, Clone)]
pub(crate) struct LayoutTree {
    pub(crate) nodes: Vec<TreeNode>,
    slots: HashMap<NodeKey, usize>,
}

impl LayoutTree {
    pub(crate) fn build(graph: &Graph, root: NodeKey, config: &LayoutConfig) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            slots: HashMap::new(),
        };
        tree.place(graph, root, 0, config);

        let mut queue = VecDeque::from([0usize]);
        while let Some(slot) = queue.pop_front() {
            let key = tree.nodes[slot].key;
            let depth = tree.nodes[slot].depth;

            for data in graph.data_outputs(key) {
                if graph.is_visible(data) && !tree.slots.contains_key(&data) {
                    let child = tree.place(graph, data, depth + 1, config);
                    tree.nodes[slot].children.push(child);
                }
            }
            for next in graph.neighbors(key, Direction::Outgoing, EdgeKind::is_control) {
                let procedure = graph.kind(next).is_some_and(|kind| kind.is_procedure());
                if procedure && graph.is_visible(next) && !tree.slots.contains_key(&next) {
                    let child = tree.place(graph, next, depth + 2, config);
                    tree.nodes[slot].children.push(child);
                    queue.push_back(child);
                }
            }
        }

        // Inputs nobody else placed.
        for slot in 0..tree.nodes.len() {
            let key = tree.nodes[slot].key;
            if graph.kind(key).is_some_and(|kind| kind.is_data()) {
                continue;
            }
            let depth = tree.nodes[slot].depth;
            let satellite_depth = if depth == 0 { 1 } else { depth - 1 };
            for data in graph.data_inputs(key) {
                if graph.is_visible(data) && !tree.slots.contains_key(&data) {
                    let satellite = tree.place(graph, data, satellite_depth, config);
                    tree.nodes[slot].satellites.push(satellite);
                }
            }
        }
        tree
    }

    fn place(&mut self, graph: &Graph, key: NodeKey, depth: usize, config: &LayoutConfig) -> usize {
        let label = graph.get_node(key).map_or("", |node| node.name.as_str());
        let size = Size2D::new(config.metrics.width_for(label), config.metrics.height);
        let slot = self.nodes.len();
        self.nodes.push(TreeNode {
            key,
            depth,
            size,
            children: Vec::new(),
            satellites: Vec::new(),
        });
        self.slots.insert(key, slot);
        slot
    }

    pub(crate) fn contains(&self, key: NodeKey) -> bool {
        self.slots.contains_key(&key)
    }

    /// Slots with every child before its parent and each subtree before its right sibling.
    fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }
        let mut stack = vec![(0usize, false)];
        while let Some((slot, children_done)) = stack.pop() {
            if children_done {
                order.push(slot);
                continue;
            }
            stack.push((slot, true));
            stack.extend(self.nodes[slot].children.iter().rev().map(|child| (*child, false)));
        }
        order
    }

    /// Previous sibling at the same depth, per slot.
    fn left_neighbours(&self) -> Vec<Option<usize>> {
        let mut left = vec![None; self.nodes.len()];
        for node in &self.nodes {
            let mut previous_at: HashMap<usize, usize> = HashMap::new();
            for child in &node.children {
                let depth = self.nodes[*child].depth;
                left[*child] = previous_at.insert(depth, *child);
            }
        }
        left
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }
}

fn spacing(config: &LayoutConfig, left: &TreeNode, right: &TreeNode) -> f32 {
    let gap = if left.is_leaf() && right.is_leaf() {
        config.sibling_spacing
    } else {
        config.subtree_spacing
    };
    (left.size.width + right.size.width) / 2.0 + gap
}

/// Post-order pass: relative centers (`prelim`) and child offsets (`modifier`).
pub(crate) struct FirstWalk<'a> {
    tree: &'a LayoutTree,
    config: &'a LayoutConfig,
    pub(crate) prelim: Vec<f32>,
    pub(crate) modifier: Vec<f32>,
    pub(crate) max_height: BTreeMap<usize, f32>,
}

impl<'a> FirstWalk<'a> {
    pub(crate) fn run(tree: &'a LayoutTree, config: &'a LayoutConfig) -> Self {
        let mut walk = Self {
            tree,
            config,
            prelim: vec![0.0; tree.nodes.len()],
            modifier: vec![0.0; tree.nodes.len()],
            max_height: BTreeMap::new(),
        };
        if !tree.nodes.is_empty() {
            let left = tree.left_neighbours();
            for slot in tree.post_order() {
                walk.finish(slot, left[slot]);
            }
        }
        walk
    }

    /// Place `slot` relative to its left neighbour. Its children are done.
    fn finish(&mut self, slot: usize, left: Option<usize>) {
        let tree = self.tree;
        let node = &tree.nodes[slot];
        self.note_height(node);

        let midpoint = self.children_midpoint(node);
        match (left, midpoint) {
            (Some(left), Some(midpoint)) => {
                self.prelim[slot] = self.prelim[left] + spacing(self.config, &tree.nodes[left], node);
                self.modifier[slot] = self.prelim[slot] - midpoint;
            },
            (Some(left), None) => {
                self.prelim[slot] = self.prelim[left] + spacing(self.config, &tree.nodes[left], node);
            },
            (None, Some(midpoint)) => self.prelim[slot] = midpoint,
            (None, None) => self.prelim[slot] = 0.0,
        }

        let mut offset = 0.0;
        for satellite in &node.satellites {
            let satellite_node = &tree.nodes[*satellite];
            self.note_height(satellite_node);
            offset += spacing(self.config, node, satellite_node);
            self.prelim[*satellite] = self.prelim[slot] + offset;
        }
    }

    /// Center of the procedure children, or of all children if there are none.
    fn children_midpoint(&self, node: &TreeNode) -> Option<f32> {
        let procedures: Vec<usize> = node
            .children
            .iter()
            .copied()
            .filter(|child| self.tree.nodes[*child].depth == node.depth + 2)
            .collect();
        let span = if procedures.is_empty() { &node.children } else { &procedures };
        let first = *span.first()?;
        let last = *span.last()?;
        Some((self.prelim[first] + self.prelim[last]) / 2.0)
    }

    fn note_height(&mut self, node: &TreeNode) {
        let height = self.max_height.entry(node.depth).or_insert(0.0);
        *height = height.max(node.size.height);
    }
}

/// Pre-order pass: absolute top-left corners.
///
/// Nodes at one depth may come from unrelated parents, so each placement is
/// pushed right of everything already placed at that depth.
pub(crate) struct SecondWalk<'a> {
    tree: &'a LayoutTree,
    first: &'a FirstWalk<'a>,
    config: &'a LayoutConfig,
    rightmost_end: HashMap<usize, f32>,
    row_y: Vec<f32>,
    pub(crate) positions: Vec<Point2D<f32>>,
}

impl<'a> SecondWalk<'a> {
    pub(crate) fn run(tree: &'a LayoutTree, first: &'a FirstWalk<'a>, config: &'a LayoutConfig) -> Self {
        let mut row_y = Vec::with_capacity(tree.max_depth() + 1);
        let mut y = config.anchor_y;
        for depth in 0..=tree.max_depth() {
            row_y.push(y);
            let height = first.max_height.get(&depth).copied().unwrap_or(0.0);
            y += height + config.depth_spacing / 2.0;
        }

        let mut walk = Self {
            tree,
            first,
            config,
            rightmost_end: HashMap::new(),
            row_y,
            positions: vec![Point2D::zero(); tree.nodes.len()],
        };
        if !tree.nodes.is_empty() {
            walk.visit_all();
        }
        walk
    }

    /// Pre-order over the tree, each subtree finished before its right sibling.
    fn visit_all(&mut self) {
        let tree = self.tree;
        let mut stack = vec![(0usize, 0.0f32)];
        while let Some((slot, mod_sum)) = stack.pop() {
            let node = &tree.nodes[slot];
            let shift = self.place(slot, mod_sum);
            for satellite in &node.satellites {
                self.place(*satellite, mod_sum + shift);
            }
            let child_mod = mod_sum + shift + self.first.modifier[slot];
            stack.extend(node.children.iter().rev().map(|child| (*child, child_mod)));
        }
    }

    /// Place one node and return how far it had to slide right.
    fn place(&mut self, slot: usize, mod_sum: f32) -> f32 {
        let node = &self.tree.nodes[slot];
        let center = self.config.anchor_x + self.first.prelim[slot] + mod_sum;
        let mut left = center - node.size.width / 2.0;
        let mut shift = 0.0;
        if let Some(end) = self.rightmost_end.get(&node.depth) {
            let min_left = end + self.config.sibling_spacing;
            if left < min_left {
                shift = min_left - left;
                left = min_left;
            }
        }
        self.rightmost_end.insert(node.depth, left + node.size.width);
        self.positions[slot] = Point2D::new(left, self.row_y[node.depth]);
        shift
    }
}

/// Every visible node the tree did not reach.
pub(crate) fn unreached(graph: &Graph, tree: &LayoutTree) -> Vec<NodeKey> {
    graph
        .nodes()
        .filter(|(key, node)| node.visible && !tree.contains(*key))
        .map(|(key, _)| key)
        .collect()
}
