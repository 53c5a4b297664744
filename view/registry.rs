/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Collapse registry: discovered regions and the compound nodes standing in for them.
//!
//! Regions form a containment forest. Every member of a region points at the
//! region's compound through `parent`, and a compound points at the compound of
//! the region that encloses it. Discovery walks control flow "at a level": a
//! node is lifted to its ancestor whose parent is the walk's level, so a region
//! discovered earlier is stepped over as a single member and the walk resumes
//! after its anchor finish.
//!
//! Compounds are created once per anchor pair and never removed. Errors are
//! collected into the caller's list; the region in question simply stays
//! uncollapsible.

use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ViewError;
use crate::graph::{EdgeKind, Graph, NodeId, NodeKey, NodeKind, region_label};

pub type RegionId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Start/Finish pair around one procedure call.
    Procedure,
    /// Checkpoint/Restore pair around a saved and restored span.
    Checkpoint,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub kind: RegionKind,
    pub compound: NodeKey,
    pub anchor_start: NodeKey,
    pub anchor_finish: NodeKey,
    /// Direct members in discovery order; nested regions appear as their compound.
    pub members: Vec<NodeKey>,
    /// Sum of member elapsed times.
    pub elapsed: f64,
}

/// Result of walking forward from a Start node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionWalk {
    /// Finish that ended the walk. `None` when the execution was aborted.
    pub finish: Option<NodeKey>,
    pub members: Vec<NodeKey>,
    pub elapsed: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CollapseRegistry {
    regions: Vec<Region>,

    by_anchor: HashMap<(NodeKey, NodeKey), RegionId>,

    by_start: HashMap<NodeKey, RegionId>,

    by_compound: HashMap<NodeKey, RegionId>,

    by_restore: HashMap<NodeKey, RegionId>,

    /// Node → immediately enclosing compound.
    parent: HashMap<NodeKey, NodeKey>,

    restore_to_checkpoint: HashMap<NodeKey, NodeKey>,

    /// Compound → checkpoint regions somewhere inside it, in creation order.
    contained_checkpoints: HashMap<NodeKey, Vec<RegionId>>,

    /// Start → the wrongly named Finish that closed its walk.
    mismatched: HashMap<NodeKey, NodeKey>,

    /// Nodes whose pairing problem has already been reported.
    reported: HashSet<NodeKey>,

    /// Starts whose walk is in progress, innermost last.
    discovering: Vec<NodeKey>,
}

impl CollapseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn region_of_compound(&self, compound: NodeKey) -> Option<&Region> {
        self.by_compound.get(&compound).map(|id| &self.regions[*id])
    }

    pub fn is_compound(&self, key: NodeKey) -> bool {
        self.by_compound.contains_key(&key)
    }

    /// Compound of the region opened by `start` (a Start or Checkpoint node).
    pub fn compound_for_anchor(&self, start: NodeKey) -> Option<NodeKey> {
        self.by_start.get(&start).map(|id| self.regions[*id].compound)
    }

    pub fn region_for_restore(&self, restore: NodeKey) -> Option<&Region> {
        self.by_restore.get(&restore).map(|id| &self.regions[*id])
    }

    pub fn paired_checkpoint(&self, restore: NodeKey) -> Option<NodeKey> {
        self.restore_to_checkpoint.get(&restore).copied()
    }

    /// Immediately enclosing compound, if any.
    pub fn enclosing(&self, key: NodeKey) -> Option<NodeKey> {
        self.parent.get(&key).copied()
    }

    /// Enclosing compounds, innermost first.
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut chain = Vec::new();
        let mut current = key;
        while let Some(up) = self.enclosing(current) {
            chain.push(up);
            current = up;
        }
        chain
    }

    pub fn is_within(&self, key: NodeKey, compound: NodeKey) -> bool {
        self.ancestors(key).contains(&compound)
    }

    /// Direct members of a compound; empty for anything else.
    pub fn members(&self, compound: NodeKey) -> &[NodeKey] {
        self.region_of_compound(compound)
            .map(|region| region.members.as_slice())
            .unwrap_or(&[])
    }

    /// All members at every depth below `compound`, in pre-order.
    pub fn transitive_members(&self, compound: NodeKey) -> Vec<NodeKey> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeKey> = self.members(compound).iter().rev().copied().collect();
        while let Some(member) = stack.pop() {
            found.push(member);
            stack.extend(self.members(member).iter().rev().copied());
        }
        found
    }

    pub fn contained_checkpoints(&self, compound: NodeKey) -> &[RegionId] {
        self.contained_checkpoints
            .get(&compound)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Discover every Start/Finish region not discovered yet. Returns how many were created.
    pub fn discover_procedure_regions(
        &mut self,
        graph: &mut Graph,
        errors: &mut Vec<ViewError>,
    ) -> usize {
        let before = self.regions.len();
        let starts: Vec<NodeKey> = graph
            .nodes()
            .filter(|(_, node)| node.kind == NodeKind::Start)
            .map(|(key, _)| key)
            .collect();
        for start in starts {
            if !self.by_start.contains_key(&start) && !self.mismatched.contains_key(&start) {
                self.discover_region(graph, start, errors);
            }
        }
        self.regions.len() - before
    }

    /// Walk forward from `start` to its Finish, creating the compound when the names agree.
    ///
    /// Nested Start nodes are discovered first and join this region as their
    /// compound. A Finish with a different region label still ends the walk and
    /// is returned, but it is reported and no compound is created.
    pub fn discover_region(
        &mut self,
        graph: &mut Graph,
        start: NodeKey,
        errors: &mut Vec<ViewError>,
    ) -> RegionWalk {
        if let Some(region) = self.by_start.get(&start).map(|id| &self.regions[*id]) {
            return RegionWalk {
                finish: Some(region.anchor_finish),
                members: region.members.clone(),
                elapsed: region.elapsed,
            };
        }

        self.discovering.push(start);
        let walk = self.walk_region(graph, start, errors);
        self.discovering.pop();

        let Some(finish) = walk.finish else {
            log::debug!("registry: no finish yet for {:?}", start);
            return walk;
        };
        if labels_match(graph, start, finish) {
            self.create_compound_node(
                graph,
                RegionKind::Procedure,
                start,
                finish,
                walk.members.clone(),
                walk.elapsed,
            );
        } else if self.mismatched.insert(start, finish).is_none() {
            let error = pairing_error(graph, start, finish);
            log::warn!("{error}");
            errors.push(error);
        }
        walk
    }

    fn walk_region(
        &mut self,
        graph: &mut Graph,
        start: NodeKey,
        errors: &mut Vec<ViewError>,
    ) -> RegionWalk {
        let level = self.enclosing(start);
        let mut walk = RegionWalk {
            finish: None,
            members: vec![start],
            elapsed: self.elapsed_of(graph, start),
        };
        let mut visited: HashSet<NodeKey> = HashSet::from([start]);
        let mut queue: VecDeque<NodeKey> = self.level_successors(graph, start, level).into();

        while let Some(queued) = queue.pop_front() {
            let Some(mut next) = self.level_representative(queued, level) else {
                continue;
            };
            if visited.contains(&next) {
                continue;
            }

            match graph.kind(next) {
                Some(NodeKind::Start)
                    if !self.by_start.contains_key(&next)
                        && !self.mismatched.contains_key(&next)
                        && !self.discovering.contains(&next) =>
                {
                    self.discover_region(graph, next, errors);
                    if let Some(compound) = self.compound_for_anchor(next) {
                        next = compound;
                    }
                },
                Some(NodeKind::Finish) if !labels_match(graph, start, next) => {
                    // An enclosing region owns this Finish: the nested call never returned.
                    let closes_enclosing = self
                        .discovering
                        .iter()
                        .any(|open| *open != start && labels_match(graph, *open, next))
                        || self
                            .ancestors(start)
                            .iter()
                            .filter_map(|outer| self.region_of_compound(*outer))
                            .any(|outer| outer.anchor_finish == next);
                    if closes_enclosing {
                        return RegionWalk {
                            finish: None,
                            ..walk
                        };
                    }
                },
                _ => {},
            }

            visited.insert(next);
            walk.members.push(next);
            walk.elapsed += self.elapsed_of(graph, next);
            if graph.kind(next) == Some(NodeKind::Finish) {
                walk.finish = Some(next);
                break;
            }
            queue.extend(self.level_successors(graph, next, level));
        }
        walk
    }

    /// Pair every Restore with a Checkpoint and create the regions not created yet.
    ///
    /// A Restore reading a data node produced by a Checkpoint pairs with that
    /// Checkpoint; otherwise it pairs with the most recent preceding Checkpoint
    /// still unmatched. Regions are created most-recent-Restore first.
    pub fn discover_checkpoint_restore_regions(
        &mut self,
        graph: &mut Graph,
        errors: &mut Vec<ViewError>,
    ) -> usize {
        let before = self.regions.len();
        let pairs = self.pair_checkpoints(graph, errors);
        for (checkpoint, restore) in pairs.into_iter().rev() {
            if self.by_anchor.contains_key(&(checkpoint, restore)) || self.reported.contains(&restore) {
                continue;
            }
            if let Err(reason) = self.materialize_checkpoint_region(graph, checkpoint, restore) {
                self.reported.insert(restore);
                let error = ViewError::CheckpointPairing {
                    checkpoint: graph.get_node(checkpoint).map(|node| node.id),
                    restore: node_id(graph, restore),
                    reason,
                };
                log::warn!("{error}");
                errors.push(error);
            }
        }
        self.regions.len() - before
    }

    fn pair_checkpoints(
        &mut self,
        graph: &Graph,
        errors: &mut Vec<ViewError>,
    ) -> Vec<(NodeKey, NodeKey)> {
        let mut open: Vec<NodeKey> = Vec::new();
        let mut pairs = Vec::new();
        for key in graph.node_keys() {
            match graph.kind(key) {
                Some(NodeKind::Checkpoint) => open.push(key),
                Some(NodeKind::Restore) => {
                    let checkpoint = match linked_checkpoint(graph, key) {
                        Some(linked) => {
                            open.retain(|candidate| *candidate != linked);
                            Some(linked)
                        },
                        None => open.pop(),
                    };
                    match checkpoint {
                        Some(checkpoint) => pairs.push((checkpoint, key)),
                        None if self.reported.insert(key) => {
                            let error = ViewError::CheckpointPairing {
                                checkpoint: None,
                                restore: node_id(graph, key),
                                reason: "no unmatched checkpoint precedes the restore",
                            };
                            log::warn!("{error}");
                            errors.push(error);
                        },
                        None => {},
                    }
                },
                _ => {},
            }
        }
        pairs
    }

    fn materialize_checkpoint_region(
        &mut self,
        graph: &mut Graph,
        checkpoint: NodeKey,
        restore: NodeKey,
    ) -> Result<NodeKey, &'static str> {
        let level = self.enclosing(checkpoint);
        if self.level_representative(restore, level) != Some(restore) {
            return Err("restore is not at the checkpoint's nesting level");
        }
        let forward = self.reach(graph, checkpoint, restore, level, Direction::Outgoing);
        if !forward.contains(&restore) {
            return Err("restore is not reachable from the checkpoint");
        }
        let backward = self.reach(graph, restore, checkpoint, level, Direction::Incoming);
        let mut members: Vec<NodeKey> = forward.intersection(&backward).copied().collect();
        members.sort();
        let elapsed = members
            .iter()
            .map(|member| self.elapsed_of(graph, *member))
            .sum();
        Ok(self.create_compound_node(
            graph,
            RegionKind::Checkpoint,
            checkpoint,
            restore,
            members,
            elapsed,
        ))
    }

    /// Nodes reachable from `from` at `level`, without walking past `stop`.
    fn reach(
        &self,
        graph: &Graph,
        from: NodeKey,
        stop: NodeKey,
        level: Option<NodeKey>,
        direction: Direction,
    ) -> HashSet<NodeKey> {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == stop {
                continue;
            }
            let next = match direction {
                Direction::Outgoing => self.level_successors(graph, current, level),
                Direction::Incoming => self.level_predecessors(graph, current, level),
            };
            for node in next {
                if seen.insert(node) {
                    queue.push_back(node);
                }
            }
        }
        seen
    }

    /// Create the compound for an anchor pair, or return the existing one.
    ///
    /// `members` become children of the compound; if the anchors sit inside
    /// another region, the compound takes their place among its members.
    pub fn create_compound_node(
        &mut self,
        graph: &mut Graph,
        kind: RegionKind,
        anchor_start: NodeKey,
        anchor_finish: NodeKey,
        members: Vec<NodeKey>,
        elapsed: f64,
    ) -> NodeKey {
        if let Some(id) = self.by_anchor.get(&(anchor_start, anchor_finish)) {
            return self.regions[*id].compound;
        }

        let name = graph
            .get_node(anchor_start)
            .map(|node| region_label(&node.name).to_string())
            .unwrap_or_default();
        let finish_node = graph.get_node(anchor_finish);
        let value = finish_node.and_then(|node| node.value.clone());
        let timestamp = match kind {
            RegionKind::Procedure => Some(elapsed),
            RegionKind::Checkpoint => finish_node.and_then(|node| node.timestamp),
        };
        let compound = graph.add_synthetic_node(NodeKind::Step, name, value, timestamp);

        let level = self.enclosing(anchor_start);
        let member_set: HashSet<NodeKey> = members.iter().copied().collect();
        for member in &members {
            self.parent.insert(*member, compound);
        }
        if let Some(outer) = level {
            self.parent.insert(compound, outer);
            if let Some(outer_id) = self.by_compound.get(&outer).copied() {
                let outer_members = &mut self.regions[outer_id].members;
                let slot = outer_members
                    .iter()
                    .position(|member| member_set.contains(member))
                    .unwrap_or(outer_members.len());
                outer_members.retain(|member| !member_set.contains(member));
                outer_members.insert(slot.min(outer_members.len()), compound);
            }
        }

        let id = self.regions.len();
        self.regions.push(Region {
            kind,
            compound,
            anchor_start,
            anchor_finish,
            members,
            elapsed,
        });
        self.by_anchor.insert((anchor_start, anchor_finish), id);
        self.by_start.insert(anchor_start, id);
        self.by_compound.insert(compound, id);

        let nested: Vec<RegionId> = self
            .transitive_members(compound)
            .iter()
            .filter_map(|member| self.by_compound.get(member).copied())
            .filter(|nested| self.regions[*nested].kind == RegionKind::Checkpoint)
            .collect();
        if !nested.is_empty() {
            self.contained_checkpoints.insert(compound, nested);
        }
        if kind == RegionKind::Checkpoint {
            self.by_restore.insert(anchor_finish, id);
            self.restore_to_checkpoint.insert(anchor_finish, anchor_start);
            for outer in self.ancestors(compound) {
                let list = self.contained_checkpoints.entry(outer).or_default();
                list.push(id);
                list.sort_unstable();
                list.dedup();
            }
        }

        let rewired = self.rewire_edges(graph, compound, anchor_start, anchor_finish);
        log::debug!(
            "registry: compound {:?} for {:?}..{:?} ({} members, {} step edges)",
            compound,
            anchor_start,
            anchor_finish,
            self.regions[id].members.len(),
            rewired
        );
        compound
    }

    /// Re-run edge rewiring for every region, picking up edges announced after
    /// the region was created. Returns the number of step edges added.
    pub fn rewire_all(&self, graph: &mut Graph) -> usize {
        self.regions
            .iter()
            .map(|region| {
                self.rewire_edges(graph, region.compound, region.anchor_start, region.anchor_finish)
            })
            .sum()
    }

    /// Redirect edges crossing the region boundary onto the compound.
    fn rewire_edges(
        &self,
        graph: &mut Graph,
        compound: NodeKey,
        anchor_start: NodeKey,
        anchor_finish: NodeKey,
    ) -> usize {
        let mut inside: Vec<NodeKey> = self.transitive_members(compound);
        inside.sort();
        let inside_set: HashSet<NodeKey> = inside.iter().copied().chain([compound]).collect();
        let outside = |key: &NodeKey| !inside_set.contains(key);
        let mut added = 0;

        for source in graph.neighbors(anchor_start, Direction::Incoming, EdgeKind::is_control) {
            if outside(&source) && graph.connect(source, compound, EdgeKind::StepControlFlow) {
                added += 1;
            }
        }
        for target in graph.neighbors(anchor_finish, Direction::Outgoing, EdgeKind::is_control) {
            if outside(&target) && graph.connect(compound, target, EdgeKind::StepControlFlow) {
                added += 1;
            }
        }

        for member in inside {
            for data in graph.data_outputs(member) {
                let consumed_outside = graph
                    .neighbors(data, Direction::Outgoing, EdgeKind::is_data)
                    .iter()
                    .any(outside);
                if consumed_outside && graph.connect(compound, data, EdgeKind::StepDataFlow) {
                    added += 1;
                }
            }
            for data in graph.data_inputs(member) {
                let producers = graph.neighbors(data, Direction::Incoming, EdgeKind::is_data);
                let produced_outside = producers.is_empty() || producers.iter().any(outside);
                if produced_outside && graph.connect(data, compound, EdgeKind::StepDataFlow) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Report Starts that never found a Finish and Finishes no Start claimed.
    /// Each node is reported once.
    pub fn report_unpaired(&mut self, graph: &Graph, errors: &mut Vec<ViewError>) {
        let claimed: HashSet<NodeKey> = self
            .regions
            .iter()
            .map(|region| region.anchor_finish)
            .chain(self.mismatched.values().copied())
            .collect();
        for (key, node) in graph.nodes() {
            let error = match node.kind {
                NodeKind::Start
                    if !self.by_start.contains_key(&key) && !self.mismatched.contains_key(&key) =>
                {
                    ViewError::MissingFinish {
                        start: node.id,
                        name: node.name.clone(),
                    }
                },
                NodeKind::Finish if !claimed.contains(&key) => ViewError::UnmatchedFinish {
                    finish: node.id,
                    name: node.name.clone(),
                },
                _ => continue,
            };
            if self.reported.insert(key) {
                log::warn!("{error}");
                errors.push(error);
            }
        }
    }

    /// The ancestor of `key` (or `key` itself) whose parent is `level`.
    fn level_representative(&self, key: NodeKey, level: Option<NodeKey>) -> Option<NodeKey> {
        let mut current = key;
        loop {
            let up = self.enclosing(current);
            if up == level {
                return Some(current);
            }
            current = up?;
        }
    }

    fn level_successors(&self, graph: &Graph, key: NodeKey, level: Option<NodeKey>) -> Vec<NodeKey> {
        let exit = self
            .region_of_compound(key)
            .map_or(key, |region| region.anchor_finish);
        self.lift_all(graph.control_successors(exit), key, level)
    }

    fn level_predecessors(&self, graph: &Graph, key: NodeKey, level: Option<NodeKey>) -> Vec<NodeKey> {
        let entry = self
            .region_of_compound(key)
            .map_or(key, |region| region.anchor_start);
        self.lift_all(graph.control_predecessors(entry), key, level)
    }

    fn lift_all(&self, keys: Vec<NodeKey>, from: NodeKey, level: Option<NodeKey>) -> Vec<NodeKey> {
        let mut lifted: Vec<NodeKey> = keys
            .into_iter()
            .filter_map(|key| self.level_representative(key, level))
            .filter(|key| *key != from)
            .collect();
        lifted.sort();
        lifted.dedup();
        lifted
    }

    fn elapsed_of(&self, graph: &Graph, key: NodeKey) -> f64 {
        match self.region_of_compound(key) {
            Some(region) => region.elapsed,
            None => graph.get_node(key).map_or(0.0, |node| node.elapsed()),
        }
    }
}

fn labels_match(graph: &Graph, start: NodeKey, finish: NodeKey) -> bool {
    match (graph.get_node(start), graph.get_node(finish)) {
        (Some(start), Some(finish)) => region_label(&start.name) == region_label(&finish.name),
        _ => false,
    }
}

fn pairing_error(graph: &Graph, start: NodeKey, finish: NodeKey) -> ViewError {
    let describe = |key: NodeKey| {
        graph
            .get_node(key)
            .map(|node| (node.id, node.name.clone()))
            .unwrap_or_default()
    };
    let (start, start_name) = describe(start);
    let (finish, finish_name) = describe(finish);
    ViewError::RegionPairing {
        start,
        start_name,
        finish,
        finish_name,
    }
}

fn node_id(graph: &Graph, key: NodeKey) -> NodeId {
    graph.get_node(key).map(|node| node.id).unwrap_or_default()
}

/// Checkpoint that produced a data node this Restore reads, if any.
fn linked_checkpoint(graph: &Graph, restore: NodeKey) -> Option<NodeKey> {
    graph
        .neighbors(restore, Direction::Incoming, |kind| kind == EdgeKind::DataFlow)
        .into_iter()
        .filter(|data| graph.kind(*data).is_some_and(NodeKind::is_data))
        .flat_map(|data| graph.neighbors(data, Direction::Incoming, |kind| kind == EdgeKind::DataFlow))
        .find(|producer| graph.kind(*producer) == Some(NodeKind::Checkpoint))
}
