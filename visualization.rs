/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The visualization: graph, regions, view state, and layout behind one lock.
//!
//! The graph builder and the interaction layer are the two producers of
//! mutations. Both go through `SharedVisualization`, and every operation runs
//! to completion (including the visibility and layout refresh it triggers)
//! before the lock is released.

use euclid::default::{Point2D, Vector2D};
use nucleo::pattern::{CaseMatching, Normalization, Pattern};
use nucleo::{Config, Matcher};
use parking_lot::Mutex;
use petgraph::Direction;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ViewConfig;
use crate::error::{ErrorCategory, ViewError};
use crate::feed::GraphOp;
use crate::graph::{EdgeKind, Graph, Node, NodeId, NodeKey, NodeSpec};
use crate::layout::{LayoutEngine, LayoutResult};
use crate::persistence::types::GraphSnapshot;
use crate::view::{CollapseRegistry, ToggleOutcome, VisibilityState, visible_edges};

pub type SharedVisualization = Arc<Mutex<Visualization>>;

pub struct Visualization {
    graph: Graph,
    registry: CollapseRegistry,
    visibility: VisibilityState,
    engine: LayoutEngine,
    config: ViewConfig,
    root: Option<NodeKey>,
    finished: bool,
    layout: LayoutResult,
    /// Every non-fatal error reported so far, without repeats. Layout
    /// errors only reflect the latest layout run.
    diagnostics: Vec<ViewError>,
    reported: HashSet<ViewError>,
    matcher: Matcher,
}

/// Node name offered to the fuzzy matcher.
struct NameEntry<'a> {
    key: NodeKey,
    name: &'a str,
}

impl AsRef<str> for NameEntry<'_> {
    fn as_ref(&self) -> &str {
        self.name
    }
}

impl Visualization {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            graph: Graph::new(),
            registry: CollapseRegistry::new(),
            visibility: VisibilityState::new(config.workflow_mode),
            engine: LayoutEngine::new(config.layout.clone()),
            config,
            root: None,
            finished: false,
            layout: LayoutResult::default(),
            diagnostics: Vec::new(),
            reported: HashSet::new(),
            matcher: Matcher::new(Config::DEFAULT),
        }
    }

    pub fn into_shared(self) -> SharedVisualization {
        Arc::new(Mutex::new(self))
    }

    /// Rebuild a visualization from a snapshot, as a finished builder run.
    pub fn from_snapshot(config: ViewConfig, snapshot: &GraphSnapshot) -> Self {
        let mut visualization = Self::new(config);
        for op in snapshot.replay() {
            // Rejections are already in the diagnostics.
            let _ = visualization.apply(op);
        }
        visualization
    }

    // Builder side

    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeKey, ViewError> {
        let key = self.graph.add_node(spec).map_err(|error| self.reject(error))?;
        if self.config.incremental {
            self.refresh();
        }
        Ok(key)
    }

    pub fn add_edge(&mut self, kind: EdgeKind, source: NodeId, target: NodeId) -> Result<(), ViewError> {
        self.graph
            .add_edge(kind, source, target)
            .map_err(|error| self.reject(error))?;
        if self.config.incremental {
            self.refresh();
        }
        Ok(())
    }

    pub fn set_root(&mut self, node: NodeId) -> Result<(), ViewError> {
        let key = self
            .graph
            .key_of(node)
            .ok_or_else(|| self.reject(ViewError::UnknownNode { id: node }))?;
        self.root = Some(key);
        if self.config.incremental {
            self.relayout();
        }
        Ok(())
    }

    /// The builder is done: pair checkpoints, report open regions, refresh.
    pub fn process_finished(&mut self) {
        self.finished = true;
        self.refresh();
        log::info!(
            "visualization: {} nodes, {} regions, {} diagnostics",
            self.graph.node_count(),
            self.registry.regions().len(),
            self.diagnostics.len()
        );
    }

    pub fn apply(&mut self, op: GraphOp) -> Result<(), ViewError> {
        match op {
            GraphOp::AddNode(spec) => self.add_node(spec).map(|_| ()),
            GraphOp::AddEdge {
                kind,
                source,
                target,
            } => self.add_edge(kind, source, target),
            GraphOp::SetRoot { node } => self.set_root(node),
            GraphOp::ProcessFinished => {
                self.process_finished();
                Ok(())
            },
        }
    }

    /// Discover regions, then re-derive visibility and layout.
    ///
    /// Checkpoint pairing and unpaired-region reports wait for the builder
    /// to finish, since a later Restore or Finish may still arrive.
    pub fn refresh(&mut self) {
        let mut errors = Vec::new();
        self.registry
            .discover_procedure_regions(&mut self.graph, &mut errors);
        if self.finished {
            self.registry
                .discover_checkpoint_restore_regions(&mut self.graph, &mut errors);
            self.registry.report_unpaired(&self.graph, &mut errors);
        }
        self.registry.rewire_all(&mut self.graph);
        self.record(errors);
        self.refresh_view();
    }

    fn refresh_view(&mut self) {
        self.visibility.apply(&mut self.graph, &self.registry);
        self.relayout();
    }

    fn relayout(&mut self) {
        let mut errors = Vec::new();
        self.layout = match self
            .engine
            .run(&mut self.graph, &self.registry, self.root, &mut errors)
        {
            Ok(layout) => layout,
            Err(error) => {
                errors.push(error);
                LayoutResult::default()
            },
        };
        let stale = |error: &ViewError| error.category() == ErrorCategory::LayoutInvariant;
        self.diagnostics.retain(|error| !stale(error));
        self.reported.retain(|error| !stale(error));
        self.record(errors);
    }

    fn reject(&mut self, error: ViewError) -> ViewError {
        log::warn!("visualization: rejected builder operation: {error}");
        self.record([error.clone()]);
        error
    }

    fn record(&mut self, errors: impl IntoIterator<Item = ViewError>) {
        for error in errors {
            if self.reported.insert(error.clone()) {
                self.diagnostics.push(error);
            }
        }
    }

    // Interaction side

    /// Expand or collapse the region behind a clicked node.
    ///
    /// Checkpoint regions inside a compound start collapsed the first time it
    /// opens.
    pub fn handle_click(&mut self, node: NodeId) -> ToggleOutcome {
        let Some(key) = self.graph.key_of(node) else {
            log::debug!("visualization: click on unknown node {node}");
            return ToggleOutcome::Ignored;
        };
        let outcome = self.visibility.toggle(&self.graph, &self.registry, key);
        if outcome != ToggleOutcome::Ignored {
            self.refresh_view();
        }
        outcome
    }

    /// Expand the region behind `node` and every procedure region inside it.
    pub fn expand_recursively(&mut self, node: NodeId) -> bool {
        let Some(compound) = self
            .graph
            .key_of(node)
            .and_then(|key| self.visibility.toggle_target(&self.graph, &self.registry, key))
        else {
            return false;
        };
        self.visibility.expand_recursively(&self.registry, compound);
        self.refresh_view();
        true
    }

    pub fn expand_all(&mut self) {
        self.visibility.expand_all(&self.registry);
        self.refresh_view();
    }

    pub fn collapse_all(&mut self) {
        self.visibility.collapse_all();
        self.refresh_view();
    }

    /// Visible nodes in creation order.
    pub fn visible_nodes(&self) -> Vec<&Node> {
        self.graph
            .nodes()
            .filter(|(_, node)| node.visible)
            .map(|(_, node)| node)
            .collect()
    }

    pub fn visible_edges(&self) -> Vec<(NodeId, NodeId, EdgeKind)> {
        visible_edges(&self.graph)
            .into_iter()
            .filter_map(|edge| {
                let from = self.graph.get_node(edge.from)?;
                let to = self.graph.get_node(edge.to)?;
                Some((from.id, to.id, edge.kind))
            })
            .collect()
    }

    /// Top-left corner from the latest layout, for placed nodes only.
    pub fn position(&self, node: NodeId) -> Option<Point2D<f32>> {
        self.layout.position(self.graph.key_of(node)?)
    }

    /// Direct members of a compound.
    pub fn members(&self, compound: NodeId) -> Vec<NodeId> {
        let Some(key) = self.graph.key_of(compound) else {
            return Vec::new();
        };
        self.registry
            .members(key)
            .iter()
            .filter_map(|member| self.graph.get_node(*member))
            .map(|member| member.id)
            .collect()
    }

    /// Compound standing in for the region a Start, Checkpoint, or Restore anchors.
    pub fn compound_for(&self, anchor: NodeId) -> Option<NodeId> {
        let key = self.graph.key_of(anchor)?;
        let compound = self
            .registry
            .compound_for_anchor(key)
            .or_else(|| self.registry.region_for_restore(key).map(|region| region.compound))?;
        self.graph.get_node(compound).map(|node| node.id)
    }

    /// Bring the node called `name` into view and center the drawing on it.
    ///
    /// An exact name match wins; otherwise the best fuzzy match is used.
    /// Returns the focused node.
    pub fn focus_on(&mut self, name: &str) -> Option<NodeId> {
        let key = self
            .graph
            .find_by_name(name)
            .or_else(|| self.fuzzy_find(name))?;
        let node = self.graph.get_node(key)?;
        let id = node.id;

        // Data has no enclosing region of its own: open its producer's.
        let anchor = if node.kind.is_data() {
            self.graph
                .neighbors(key, Direction::Incoming, |kind| kind == EdgeKind::DataFlow)
                .into_iter()
                .chain(self.graph.neighbors(key, Direction::Outgoing, |kind| kind == EdgeKind::DataFlow))
                .next()
                .unwrap_or(key)
        } else {
            key
        };
        if self.visibility.reveal(&self.registry, anchor) {
            log::debug!("visualization: expanded the path to {id}");
        }
        self.refresh_view();

        let position = self.layout.position(key)?;
        let size = self.graph.get_node(key)?.size;
        let center = position + Vector2D::new(size.width / 2.0, size.height / 2.0);
        let viewport = &self.config.viewport;
        let target = Point2D::new(viewport.width / 2.0, viewport.height / 2.0);
        self.layout.translate(&mut self.graph, target - center);
        Some(id)
    }

    fn fuzzy_find(&mut self, query: &str) -> Option<NodeKey> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let entries: Vec<NameEntry<'_>> = self
            .graph
            .nodes()
            .map(|(key, node)| NameEntry {
                key,
                name: node.name.as_str(),
            })
            .collect();
        let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);
        pattern
            .match_list(entries, &mut self.matcher)
            .into_iter()
            .next()
            .map(|(entry, _score)| entry.key)
    }

    // Accessors

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn registry(&self) -> &CollapseRegistry {
        &self.registry
    }

    pub fn visibility(&self) -> &VisibilityState {
        &self.visibility
    }

    pub fn layout(&self) -> &LayoutResult {
        &self.layout
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn diagnostics(&self) -> &[ViewError] {
        &self.diagnostics
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
            .and_then(|key| self.graph.get_node(key))
            .map(|node| node.id)
    }

    /// The full builder graph, for persistence.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.to_snapshot(self.root())
    }
}
