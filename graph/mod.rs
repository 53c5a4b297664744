/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Graph store for data derivation graphs.
//!
//! Core structures:
//! - `Graph`: node/edge arena backed by petgraph::StableGraph
//! - `Node`: procedure or data instance plus its view geometry
//! - `EdgeKind`: control-flow or data-flow connection between nodes
//!
//! Nodes are never removed during a session, so `NodeKey` order is creation
//! order. All adjacency queries return keys in that order.

use euclid::default::{Point2D, Size2D};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ViewError;
use crate::persistence::types::{GraphSnapshot, PersistedEdge, PersistedNode};

pub mod kind;

pub use kind::{EdgeKind, NodeKind, region_label};

/// Stable node handle (petgraph NodeIndex)
pub type NodeKey = NodeIndex;

/// Stable edge handle (petgraph EdgeIndex)
pub type EdgeKey = EdgeIndex;

/// First id handed out to compound nodes. Builder ids must stay below it.
pub const SYNTHETIC_ID_BASE: u64 = 1 << 62;

/// Node identity as assigned by the graph builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn is_synthetic(self) -> bool {
        self.0 >= SYNTHETIC_ID_BASE
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the graph builder knows about a node when it announces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Elapsed time in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl NodeSpec {
    pub fn new(id: u64, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            kind,
            name: name.into(),
            value: None,
            timestamp: None,
            location: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timestamp(mut self, elapsed: f64) -> Self {
        self.timestamp = Some(elapsed);
        self
    }
}

/// A procedure or data node in the graph
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,

    pub kind: NodeKind,

    pub name: String,

    pub value: Option<String>,

    /// Elapsed time in seconds; rendered with [`format_elapsed`].
    pub timestamp: Option<f64>,

    /// Source location reported by the builder, if any.
    pub location: Option<String>,

    /// Whether the node is part of the current view. Written by the visibility resolver.
    pub visible: bool,

    /// Top-left corner in graph space. Written by the layout engine.
    pub position: Point2D<f32>,

    /// Extent in graph space. Written by the layout engine.
    pub size: Size2D<f32>,
}

impl Node {
    fn from_spec(spec: NodeSpec) -> Self {
        Self {
            id: spec.id,
            kind: spec.kind,
            name: spec.name,
            value: spec.value,
            timestamp: spec.timestamp,
            location: spec.location,
            visible: true,
            position: Point2D::zero(),
            size: Size2D::zero(),
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.timestamp.unwrap_or(0.0)
    }

    pub fn timestamp_label(&self) -> Option<String> {
        self.timestamp.map(format_elapsed)
    }
}

/// Decimal rendering used for node timestamps.
pub fn format_elapsed(seconds: f64) -> String {
    format!("{seconds:.3}")
}

/// Read-only view of an edge (built from petgraph edge references)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView {
    pub from: NodeKey,
    pub to: NodeKey,
    pub kind: EdgeKind,
}

/// Main graph structure backed by petgraph::StableGraph
#[derive(Clone)]
pub struct Graph {
    inner: StableGraph<Node, EdgeKind, Directed>,

    id_to_node: HashMap<NodeId, NodeKey>,

    next_synthetic: u64,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            inner: StableGraph::new(),
            id_to_node: HashMap::new(),
            next_synthetic: SYNTHETIC_ID_BASE,
        }
    }

    /// Add a builder-announced node. Duplicate or reserved ids leave the graph untouched.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeKey, ViewError> {
        if spec.id.is_synthetic() {
            return Err(ViewError::ReservedNodeId { id: spec.id });
        }
        if self.id_to_node.contains_key(&spec.id) {
            return Err(ViewError::DuplicateNode { id: spec.id });
        }
        let id = spec.id;
        let key = self.inner.add_node(Node::from_spec(spec));
        self.id_to_node.insert(id, key);
        Ok(key)
    }

    /// Add a node with an id from the reserved compound range.
    pub(crate) fn add_synthetic_node(
        &mut self,
        kind: NodeKind,
        name: String,
        value: Option<String>,
        timestamp: Option<f64>,
    ) -> NodeKey {
        let id = NodeId(self.next_synthetic);
        self.next_synthetic += 1;
        let key = self.inner.add_node(Node {
            id,
            kind,
            name,
            value,
            timestamp,
            location: None,
            visible: false,
            position: Point2D::zero(),
            size: Size2D::zero(),
        });
        self.id_to_node.insert(id, key);
        key
    }

    /// Add a builder-announced edge between two known node ids.
    ///
    /// Re-announcing an existing edge returns the existing key.
    pub fn add_edge(&mut self, kind: EdgeKind, from: NodeId, to: NodeId) -> Result<EdgeKey, ViewError> {
        let source = self.key_of(from).ok_or(ViewError::UnknownNode { id: from })?;
        let target = self.key_of(to).ok_or(ViewError::UnknownNode { id: to })?;
        if let Some(existing) = self.find_edge(source, target, kind) {
            log::debug!("graph: edge {from} -> {to} ({kind:?}) already present");
            return Ok(existing);
        }
        Ok(self.inner.add_edge(source, target, kind))
    }

    /// Connect two nodes unless an edge of the same kind already joins them.
    /// Returns whether an edge was added.
    pub(crate) fn connect(&mut self, from: NodeKey, to: NodeKey, kind: EdgeKind) -> bool {
        if from == to || self.has_edge(from, to, kind) {
            return false;
        }
        self.inner.add_edge(from, to, kind);
        true
    }

    fn find_edge(&self, from: NodeKey, to: NodeKey, kind: EdgeKind) -> Option<EdgeKey> {
        self.inner
            .edges_connecting(from, to)
            .find(|edge| *edge.weight() == kind)
            .map(|edge| edge.id())
    }

    pub fn has_edge(&self, from: NodeKey, to: NodeKey, kind: EdgeKind) -> bool {
        self.find_edge(from, to, kind).is_some()
    }

    pub fn key_of(&self, id: NodeId) -> Option<NodeKey> {
        self.id_to_node.get(&id).copied()
    }

    pub fn get_node(&self, key: NodeKey) -> Option<&Node> {
        self.inner.node_weight(key)
    }

    pub fn get_node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.inner.node_weight_mut(key)
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.get_node(self.key_of(id)?)
    }

    pub fn kind(&self, key: NodeKey) -> Option<NodeKind> {
        self.get_node(key).map(|node| node.kind)
    }

    pub fn is_visible(&self, key: NodeKey) -> bool {
        self.get_node(key).is_some_and(|node| node.visible)
    }

    /// Iterate over all nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.inner
            .node_indices()
            .map(move |idx| (idx, &self.inner[idx]))
    }

    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.inner.node_indices().collect()
    }

    /// Iterate over all edges, synthetic ones included
    pub fn edges(&self) -> impl Iterator<Item = EdgeView> + '_ {
        self.inner.edge_references().map(|e| EdgeView {
            from: e.source(),
            to: e.target(),
            kind: *e.weight(),
        })
    }

    /// Neighbours across edges accepted by `filter`, in creation order, without repeats.
    pub fn neighbors(
        &self,
        key: NodeKey,
        direction: Direction,
        filter: impl Fn(EdgeKind) -> bool,
    ) -> Vec<NodeKey> {
        let mut found: Vec<NodeKey> = self
            .inner
            .edges_directed(key, direction)
            .filter(|edge| filter(*edge.weight()))
            .map(|edge| match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            })
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Builder control-flow successors (synthetic edges excluded).
    pub fn control_successors(&self, key: NodeKey) -> Vec<NodeKey> {
        self.neighbors(key, Direction::Outgoing, |kind| kind == EdgeKind::ControlFlow)
    }

    /// Builder control-flow predecessors (synthetic edges excluded).
    pub fn control_predecessors(&self, key: NodeKey) -> Vec<NodeKey> {
        self.neighbors(key, Direction::Incoming, |kind| kind == EdgeKind::ControlFlow)
    }

    /// Data nodes written by `key`, through builder or step edges.
    pub fn data_outputs(&self, key: NodeKey) -> Vec<NodeKey> {
        self.data_neighbors(key, Direction::Outgoing)
    }

    /// Data nodes read by `key`, through builder or step edges.
    pub fn data_inputs(&self, key: NodeKey) -> Vec<NodeKey> {
        self.data_neighbors(key, Direction::Incoming)
    }

    fn data_neighbors(&self, key: NodeKey, direction: Direction) -> Vec<NodeKey> {
        self.neighbors(key, direction, EdgeKind::is_data)
            .into_iter()
            .filter(|other| self.kind(*other).is_some_and(NodeKind::is_data))
            .collect()
    }

    /// First node, in creation order, whose name is exactly `name`.
    pub fn find_by_name(&self, name: &str) -> Option<NodeKey> {
        self.nodes()
            .find(|(_, node)| node.name == name)
            .map(|(key, _)| key)
    }

    /// Visit every builder-announced procedure node.
    pub fn visit_procedure_nodes(&self, mut visit: impl FnMut(&Node)) {
        self.nodes()
            .map(|(_, node)| node)
            .filter(|node| node.kind.is_procedure() && !node.kind.is_compound())
            .for_each(|node| visit(node));
    }

    /// Visit every data node.
    pub fn visit_data_nodes(&self, mut visit: impl FnMut(&Node)) {
        self.nodes()
            .map(|(_, node)| node)
            .filter(|node| node.kind.is_data())
            .for_each(|node| visit(node));
    }

    /// Visit every builder-announced control-flow and data-flow edge.
    pub fn visit_edges(&self, mut visit: impl FnMut(&Node, &Node, EdgeKind)) {
        for edge in self.edges().filter(|edge| !edge.kind.is_synthetic()) {
            if let (Some(from), Some(to)) = (self.get_node(edge.from), self.get_node(edge.to)) {
                visit(from, to, edge.kind);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Serialize the full builder graph, independent of view state.
    pub fn to_snapshot(&self, root: Option<NodeId>) -> GraphSnapshot {
        let mut nodes = Vec::new();
        self.visit_procedure_nodes(|node| nodes.push(PersistedNode::from(node)));
        self.visit_data_nodes(|node| nodes.push(PersistedNode::from(node)));

        let mut edges = Vec::new();
        self.visit_edges(|from, to, kind| {
            edges.push(PersistedEdge {
                kind,
                source: from.id,
                target: to.id,
            })
        });

        GraphSnapshot { root, nodes, edges }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
