/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Visibility resolver.
//!
//! The only stored state is the set of expanded compounds. Everything else is
//! derived from it:
//! - a structural node is visible iff every enclosing compound is expanded;
//! - a compound is visible iff, in addition, it is itself collapsed;
//! - a data node is visible iff one of its producers or consumers is visible.
//!
//! A region whose anchors are all visible therefore shows exactly one of its
//! start node and its compound, and toggling a node twice restores the
//! previous view.

use petgraph::Direction;
use std::collections::BTreeSet;

use crate::graph::{EdgeKind, EdgeView, Graph, NodeKey, NodeKind};
use crate::view::registry::{CollapseRegistry, RegionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Expanded(NodeKey),
    Collapsed(NodeKey),
    /// The node does not stand for a collapsible region.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityState {
    expanded: BTreeSet<NodeKey>,
    /// Compounds that have been expanded at least once.
    opened: BTreeSet<NodeKey>,
    workflow_mode: bool,
}

impl VisibilityState {
    pub fn new(workflow_mode: bool) -> Self {
        Self {
            expanded: BTreeSet::new(),
            opened: BTreeSet::new(),
            workflow_mode,
        }
    }

    pub fn is_expanded(&self, compound: NodeKey) -> bool {
        self.expanded.contains(&compound)
    }

    pub fn expanded(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.expanded.iter().copied()
    }

    /// Compound whose state a click on `node` flips.
    ///
    /// A compound flips itself, a Start or Checkpoint flips the region it
    /// opens, and a Restore flips the checkpoint region it closes.
    pub fn toggle_target(
        &self,
        graph: &Graph,
        registry: &CollapseRegistry,
        node: NodeKey,
    ) -> Option<NodeKey> {
        if registry.is_compound(node) {
            return Some(node);
        }
        match graph.kind(node)? {
            NodeKind::Start | NodeKind::Checkpoint => registry.compound_for_anchor(node),
            NodeKind::Restore => registry.region_for_restore(node).map(|region| region.compound),
            _ => None,
        }
    }

    /// Flip the region behind `node`.
    ///
    /// The first time a compound is expanded, the checkpoint regions inside
    /// it start collapsed. Later expansions restore whatever inner state the
    /// compound had when it was collapsed.
    pub fn toggle(&mut self, graph: &Graph, registry: &CollapseRegistry, node: NodeKey) -> ToggleOutcome {
        let Some(compound) = self.toggle_target(graph, registry, node) else {
            return ToggleOutcome::Ignored;
        };
        if self.expanded.remove(&compound) {
            return ToggleOutcome::Collapsed(compound);
        }
        if !self.opened.contains(&compound) {
            let closed = self.collapse_nested_checkpoints(registry, compound);
            if closed > 0 {
                log::debug!("visibility: first expansion of {compound:?} closed {closed} checkpoint regions");
            }
        }
        self.open(compound);
        ToggleOutcome::Expanded(compound)
    }

    fn open(&mut self, compound: NodeKey) -> bool {
        self.opened.insert(compound);
        self.expanded.insert(compound)
    }

    pub fn expand(&mut self, registry: &CollapseRegistry, compound: NodeKey) -> bool {
        registry.is_compound(compound) && self.open(compound)
    }

    pub fn collapse(&mut self, compound: NodeKey) -> bool {
        self.expanded.remove(&compound)
    }

    /// Expand `compound` and every procedure region below it.
    ///
    /// Checkpoint regions inside stay (or become) collapsed.
    pub fn expand_recursively(&mut self, registry: &CollapseRegistry, compound: NodeKey) {
        if !self.expand(registry, compound) && !self.is_expanded(compound) {
            return;
        }
        for member in registry.transitive_members(compound) {
            if registry
                .region_of_compound(member)
                .is_some_and(|region| region.kind == RegionKind::Procedure)
            {
                self.open(member);
            }
        }
        self.collapse_nested_checkpoints(registry, compound);
    }

    pub fn expand_all(&mut self, registry: &CollapseRegistry) {
        let top_level: Vec<NodeKey> = registry
            .regions()
            .iter()
            .map(|region| region.compound)
            .filter(|compound| registry.enclosing(*compound).is_none())
            .collect();
        for compound in top_level {
            self.expand_recursively(registry, compound);
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Collapse every checkpoint region inside `affected`. Returns how many were open.
    pub fn collapse_nested_checkpoints(&mut self, registry: &CollapseRegistry, affected: NodeKey) -> usize {
        registry
            .contained_checkpoints(affected)
            .iter()
            .filter_map(|id| registry.region(*id))
            .filter(|region| self.expanded.remove(&region.compound))
            .count()
    }

    /// Expand every compound enclosing `node`. Returns whether anything changed.
    pub fn reveal(&mut self, registry: &CollapseRegistry, node: NodeKey) -> bool {
        let mut changed = false;
        for ancestor in registry.ancestors(node) {
            changed |= self.open(ancestor);
        }
        changed
    }

    pub fn is_structurally_visible(&self, registry: &CollapseRegistry, node: NodeKey) -> bool {
        let open = registry
            .ancestors(node)
            .iter()
            .all(|ancestor| self.expanded.contains(ancestor));
        open && !(registry.is_compound(node) && self.expanded.contains(&node))
    }

    /// Write `visible` flags for every node.
    pub fn apply(&self, graph: &mut Graph, registry: &CollapseRegistry) {
        for key in graph.node_keys() {
            let structural = graph.kind(key).is_some_and(NodeKind::is_procedure);
            if !structural {
                continue;
            }
            let visible = self.is_structurally_visible(registry, key);
            if let Some(node) = graph.get_node_mut(key) {
                node.visible = visible;
            }
        }
        self.resolve_data_visibility(graph);
    }

    /// Derive data node visibility from the procedure nodes around it.
    ///
    /// Expects structural visibility to be up to date. A data node written by
    /// one collapsed region and read by another is shown through the step
    /// edges of both compounds.
    pub fn resolve_data_visibility(&self, graph: &mut Graph) -> usize {
        let data_nodes: Vec<NodeKey> = graph
            .nodes()
            .filter(|(_, node)| node.kind.is_data())
            .map(|(key, _)| key)
            .collect();

        let view: &Graph = graph;
        let structural = |key: NodeKey| {
            view.is_visible(key)
                && view
                    .kind(key)
                    .is_some_and(|kind| kind.is_procedure() && !kind.is_compound())
        };
        let decisions: Vec<(NodeKey, bool)> = data_nodes
            .iter()
            .map(|data| {
                let Some(kind) = view.kind(*data) else {
                    return (*data, false);
                };
                if self.workflow_mode && kind.pinned_in_workflow() {
                    return (*data, true);
                }
                let builder_edge = |edge: EdgeKind| edge == EdgeKind::DataFlow;
                let touched = view
                    .neighbors(*data, Direction::Incoming, builder_edge)
                    .into_iter()
                    .chain(view.neighbors(*data, Direction::Outgoing, builder_edge))
                    .any(structural);
                if touched {
                    return (*data, true);
                }
                let step_edge = |edge: EdgeKind| edge == EdgeKind::StepDataFlow;
                let from_compound = view
                    .neighbors(*data, Direction::Incoming, step_edge)
                    .into_iter()
                    .any(|compound| view.is_visible(compound));
                let into_compound = view
                    .neighbors(*data, Direction::Outgoing, step_edge)
                    .into_iter()
                    .any(|compound| view.is_visible(compound));
                (*data, from_compound && into_compound)
            })
            .collect();

        let mut shown = 0;
        for (data, visible) in decisions {
            if let Some(node) = graph.get_node_mut(data) {
                node.visible = visible;
            }
            shown += usize::from(visible);
        }
        shown
    }
}

/// Edges whose endpoints are both visible.
pub fn visible_edges(graph: &Graph) -> Vec<EdgeView> {
    graph
        .edges()
        .filter(|edge| graph.is_visible(edge.from) && graph.is_visible(edge.to))
        .collect()
}
