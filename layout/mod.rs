/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Layout engine: tidy tree positions for the visible part of the graph.
//!
//! Each run builds a spanning tree from the effective root, then runs two
//! walks over it (Reingold–Tilford without subtree apportioning; overlaps are
//! resolved by sliding right per depth in the second walk). Positions and
//! sizes are written back into the graph.

use euclid::default::{Point2D, Vector2D};
use petgraph::Direction;
use std::collections::BTreeMap;

use crate::config::LayoutConfig;
use crate::error::ViewError;
use crate::graph::{EdgeKind, Graph, NodeKey};
use crate::view::CollapseRegistry;

pub(crate) mod tree;

use tree::{FirstWalk, LayoutTree, SecondWalk};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub root: Option<NodeKey>,
    /// Top-left corner of every placed node.
    pub positions: BTreeMap<NodeKey, Point2D<f32>>,
    pub depths: BTreeMap<NodeKey, usize>,
    /// Visible nodes the walk could not reach from the root.
    pub skipped: Vec<NodeKey>,
}

impl LayoutResult {
    pub fn position(&self, key: NodeKey) -> Option<Point2D<f32>> {
        self.positions.get(&key).copied()
    }

    /// Move every placed node, keeping the graph in sync.
    pub fn translate(&mut self, graph: &mut Graph, offset: Vector2D<f32>) {
        for (key, position) in self.positions.iter_mut() {
            *position += offset;
            if let Some(node) = graph.get_node_mut(*key) {
                node.position = *position;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Node the layout starts from.
    ///
    /// The requested root if it is visible, else the innermost visible
    /// compound around it. Without either, the first visible node that can
    /// head a layout and has no visible control predecessor.
    pub fn effective_root(
        &self,
        graph: &Graph,
        registry: &CollapseRegistry,
        requested: Option<NodeKey>,
    ) -> Option<NodeKey> {
        if let Some(root) = requested {
            if graph.is_visible(root) {
                return Some(root);
            }
            if let Some(compound) = registry
                .ancestors(root)
                .into_iter()
                .find(|compound| graph.is_visible(*compound))
            {
                return Some(compound);
            }
        }
        graph
            .nodes()
            .filter(|(_, node)| node.visible && node.kind.can_be_layout_root())
            .map(|(key, _)| key)
            .find(|key| {
                graph
                    .neighbors(*key, Direction::Incoming, EdgeKind::is_control)
                    .into_iter()
                    .all(|pred| !graph.is_visible(pred))
            })
    }

    /// Lay out every visible node reachable from the effective root.
    ///
    /// Unreachable visible nodes are reported into `errors` and keep their
    /// previous position.
    pub fn run(
        &self,
        graph: &mut Graph,
        registry: &CollapseRegistry,
        requested_root: Option<NodeKey>,
        errors: &mut Vec<ViewError>,
    ) -> Result<LayoutResult, ViewError> {
        let root = self
            .effective_root(graph, registry, requested_root)
            .ok_or(ViewError::NoLayoutRoot)?;

        let tree = LayoutTree::build(graph, root, &self.config);
        let first = FirstWalk::run(&tree, &self.config);
        let second = SecondWalk::run(&tree, &first, &self.config);

        let mut result = LayoutResult {
            root: Some(root),
            ..LayoutResult::default()
        };
        for (slot, node) in tree.nodes.iter().enumerate() {
            let position = second.positions[slot];
            result.positions.insert(node.key, position);
            result.depths.insert(node.key, node.depth);
            if let Some(target) = graph.get_node_mut(node.key) {
                target.position = position;
                target.size = node.size;
            }
        }

        for key in tree::unreached(graph, &tree) {
            let id = graph.get_node(key).map(|node| node.id).unwrap_or_default();
            let error = ViewError::LayoutUnreachable { id };
            log::debug!("layout: {error}");
            errors.push(error);
            result.skipped.push(key);
        }
        log::debug!(
            "layout: placed {} nodes from {:?}, skipped {}",
            result.positions.len(),
            root,
            result.skipped.len()
        );
        Ok(result)
    }
}
