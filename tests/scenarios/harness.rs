/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::BTreeSet;

use ddg_view::{EdgeKind, GraphOp, NodeId, NodeKind, NodeSpec, ViewConfig, Visualization};

/// Builder-side script for one visualization.
pub(crate) struct TestHarness {
    ops: Vec<GraphOp>,
    last: Option<u64>,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        Self {
            ops: Vec::new(),
            last: None,
        }
    }

    pub(crate) fn node(&mut self, id: u64, kind: NodeKind, name: &str) -> &mut Self {
        self.ops.push(GraphOp::AddNode(NodeSpec::new(id, kind, name)));
        self
    }

    /// Add a procedure node and a control edge from the previous one.
    pub(crate) fn step(&mut self, id: u64, kind: NodeKind, name: &str) -> &mut Self {
        self.node(id, kind, name);
        if let Some(previous) = self.last {
            self.edge(EdgeKind::ControlFlow, previous, id);
        }
        self.last = Some(id);
        self
    }

    pub(crate) fn edge(&mut self, kind: EdgeKind, source: u64, target: u64) -> &mut Self {
        self.ops.push(GraphOp::AddEdge {
            kind,
            source: NodeId(source),
            target: NodeId(target),
        });
        self
    }

    pub(crate) fn data(&mut self, source: u64, target: u64) -> &mut Self {
        self.edge(EdgeKind::DataFlow, source, target)
    }

    pub(crate) fn ops(&self) -> Vec<GraphOp> {
        self.ops.clone()
    }

    /// Replay the script into a finished visualization rooted at the first node.
    pub(crate) fn finish(&self, config: ViewConfig) -> Visualization {
        let mut visualization = Visualization::new(config);
        for op in self.ops() {
            visualization
                .apply(op)
                .expect("scripted operations should be accepted");
        }
        if let Some(GraphOp::AddNode(first)) = self.ops.first() {
            visualization
                .set_root(first.id)
                .expect("first node should exist");
        }
        visualization.process_finished();
        visualization
    }
}

pub(crate) fn visible_ids(visualization: &Visualization) -> BTreeSet<NodeId> {
    visualization
        .visible_nodes()
        .into_iter()
        .map(|node| node.id)
        .collect()
}

pub(crate) fn ids(values: &[u64]) -> BTreeSet<NodeId> {
    values.iter().copied().map(NodeId).collect()
}
