/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serializable types for graph snapshots.

use serde::{Deserialize, Serialize};

use crate::feed::GraphOp;
use crate::graph::{EdgeKind, Node, NodeId, NodeKind, NodeSpec};

/// Persisted node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PersistedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl From<&Node> for PersistedNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            kind: node.kind,
            name: node.name.clone(),
            value: node.value.clone(),
            timestamp: node.timestamp,
            location: node.location.clone(),
        }
    }
}

impl From<PersistedNode> for NodeSpec {
    fn from(node: PersistedNode) -> Self {
        NodeSpec {
            id: node.id,
            kind: node.kind,
            name: node.name,
            value: node.value,
            timestamp: node.timestamp,
            location: node.location,
        }
    }
}

/// Persisted builder edge. Step edges are never persisted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PersistedEdge {
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: NodeId,
}

/// Full graph snapshot, independent of view state.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub root: Option<NodeId>,
    pub nodes: Vec<PersistedNode>,
    pub edges: Vec<PersistedEdge>,
}

impl GraphSnapshot {
    /// Builder operations that recreate this graph: nodes, edges, root, then completion.
    pub fn replay(&self) -> Vec<GraphOp> {
        let mut ops: Vec<GraphOp> = self
            .nodes
            .iter()
            .cloned()
            .map(|node| GraphOp::AddNode(node.into()))
            .collect();
        ops.extend(self.edges.iter().map(|edge| GraphOp::AddEdge {
            kind: edge.kind,
            source: edge.source,
            target: edge.target,
        }));
        if let Some(node) = self.root {
            ops.push(GraphOp::SetRoot { node });
        }
        ops.push(GraphOp::ProcessFinished);
        ops
    }
}
