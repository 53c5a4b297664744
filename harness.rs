/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Small graph fixtures shared by unit tests.

use crate::graph::{EdgeKind, Graph, NodeId, NodeKey, NodeKind, NodeSpec};
use crate::view::CollapseRegistry;

pub(crate) struct TestGraph {
    pub(crate) graph: Graph,
}

impl TestGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: Graph::new(),
        }
    }

    pub(crate) fn node(&mut self, id: u64, kind: NodeKind, name: &str) -> &mut Self {
        self.graph
            .add_node(NodeSpec::new(id, kind, name))
            .expect("fixture ids must be unique");
        self
    }

    pub(crate) fn timed(&mut self, id: u64, kind: NodeKind, name: &str, elapsed: f64) -> &mut Self {
        self.graph
            .add_node(NodeSpec::new(id, kind, name).with_timestamp(elapsed))
            .expect("fixture ids must be unique");
        self
    }

    /// Control-flow edges along `ids` in order.
    pub(crate) fn chain(&mut self, ids: &[u64]) -> &mut Self {
        for pair in ids.windows(2) {
            self.graph
                .add_edge(EdgeKind::ControlFlow, NodeId(pair[0]), NodeId(pair[1]))
                .expect("fixture edge endpoints must exist");
        }
        self
    }

    pub(crate) fn data(&mut self, from: u64, to: u64) -> &mut Self {
        self.graph
            .add_edge(EdgeKind::DataFlow, NodeId(from), NodeId(to))
            .expect("fixture edge endpoints must exist");
        self
    }

    pub(crate) fn key(&self, id: u64) -> NodeKey {
        self.graph.key_of(NodeId(id)).expect("fixture id must exist")
    }

    /// `Start(1) -> Leaf(2) -> Leaf(3) -> Finish(4)`, data 1001 written by 2 and 1002 by 3.
    pub(crate) fn simple_region() -> Self {
        let mut fixture = Self::new();
        fixture
            .timed(1, NodeKind::Start, "main Start", 0.5)
            .timed(2, NodeKind::Leaf, "load", 1.0)
            .timed(3, NodeKind::Leaf, "fit", 2.0)
            .timed(4, NodeKind::Finish, "main Finish", 0.25)
            .node(1001, NodeKind::Data, "d1")
            .node(1002, NodeKind::Data, "d2")
            .chain(&[1, 2, 3, 4])
            .data(2, 1001)
            .data(3, 1002);
        fixture
    }

    /// Outer region 1..9 with a nested region 3..6 and a plain step on each side.
    ///
    /// `1 Start -> 2 -> 3 Start -> 4 -> 5 -> 6 Finish -> 7 -> 9 Finish`
    pub(crate) fn nested_regions() -> Self {
        let mut fixture = Self::new();
        fixture
            .node(1, NodeKind::Start, "outer Start")
            .node(2, NodeKind::Leaf, "prepare")
            .node(3, NodeKind::Start, "inner Start")
            .node(4, NodeKind::Leaf, "step a")
            .node(5, NodeKind::Leaf, "step b")
            .node(6, NodeKind::Finish, "inner Finish")
            .node(7, NodeKind::Leaf, "report")
            .node(9, NodeKind::Finish, "outer Finish")
            .node(1001, NodeKind::Data, "prepared")
            .node(1002, NodeKind::Data, "result")
            .chain(&[1, 2, 3, 4, 5, 6, 7, 9])
            .data(2, 1001)
            .data(1001, 4)
            .data(5, 1002)
            .data(1002, 7);
        fixture
    }

    /// Discover every region the way a finished build does.
    pub(crate) fn discover(&mut self) -> CollapseRegistry {
        let mut registry = CollapseRegistry::new();
        let mut errors = Vec::new();
        registry.discover_procedure_regions(&mut self.graph, &mut errors);
        registry.discover_checkpoint_restore_regions(&mut self.graph, &mut errors);
        assert!(errors.is_empty(), "fixture should discover cleanly: {errors:?}");
        registry
    }
}
