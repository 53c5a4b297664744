/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Properties over generated call trees with nested procedure and checkpoint
//! regions and data flowing between steps.

use std::collections::{BTreeMap, BTreeSet};

use ddg_view::graph::NodeKey;
use ddg_view::{EdgeKind, NodeId, NodeKind, ViewConfig, Visualization};
use petgraph::Direction;
use proptest::prelude::*;
use proptest::sample::Index;

use super::harness::{TestHarness, visible_ids};

#[derive(Clone, Debug)]
enum Block {
    Step,
    Write,
    /// Read the n-th value written so far (modulo the count).
    Read(usize),
    File,
    Call(Vec<Block>),
    Saved(Vec<Block>),
}

fn block_strategy() -> impl Strategy<Value = Block> {
    let leaf = prop_oneof![
        3 => Just(Block::Step),
        2 => Just(Block::Write),
        2 => (0_usize..8).prop_map(Block::Read),
        1 => Just(Block::File),
    ];
    leaf.prop_recursive(4, 40, 5, |inner| {
        prop_oneof![
            3 => prop::collection::vec(inner.clone(), 0..5).prop_map(Block::Call),
            1 => prop::collection::vec(inner, 0..4).prop_map(Block::Saved),
        ]
    })
}

fn program_strategy() -> impl Strategy<Value = Vec<Block>> {
    prop::collection::vec(block_strategy(), 1..6)
}

struct Emitter {
    harness: TestHarness,
    next_procedure: u64,
    next_data: u64,
    written: Vec<u64>,
    last: u64,
}

impl Emitter {
    fn step(&mut self, kind: NodeKind, name: String) -> u64 {
        let id = self.next_procedure;
        self.next_procedure += 1;
        self.harness.step(id, kind, &name);
        self.last = id;
        id
    }

    fn data(&mut self, kind: NodeKind) -> u64 {
        let id = self.next_data;
        self.next_data += 1;
        self.harness.node(id, kind, &format!("value{id}"));
        id
    }

    fn emit(&mut self, block: &Block) {
        match block {
            Block::Step => {
                self.step(NodeKind::Leaf, format!("op{}", self.next_procedure));
            },
            Block::Write => {
                let producer = self.last;
                let value = self.data(NodeKind::Data);
                self.harness.data(producer, value);
                self.written.push(value);
            },
            Block::Read(n) => {
                let consumer = self.step(NodeKind::Leaf, format!("use{}", self.next_procedure));
                if !self.written.is_empty() {
                    let value = self.written[n % self.written.len()];
                    self.harness.data(value, consumer);
                }
            },
            Block::File => {
                let consumer = self.step(NodeKind::Leaf, format!("open{}", self.next_procedure));
                let file = self.data(NodeKind::File);
                self.harness.data(file, consumer);
            },
            Block::Call(body) => {
                let label = format!("f{}", self.next_procedure);
                self.step(NodeKind::Start, format!("{label} Start"));
                for inner in body {
                    self.emit(inner);
                }
                self.step(NodeKind::Finish, format!("{label} Finish"));
            },
            Block::Saved(body) => {
                let label = format!("c{}", self.next_procedure);
                self.step(NodeKind::Checkpoint, format!("{label} Checkpoint"));
                for inner in body {
                    self.emit(inner);
                }
                self.step(NodeKind::Restore, format!("{label} Restore"));
            },
        }
    }
}

fn script(program: &[Block]) -> TestHarness {
    let mut emitter = Emitter {
        harness: TestHarness::new(),
        next_procedure: 1,
        next_data: 100_000,
        written: Vec::new(),
        last: 1,
    };
    emitter.step(NodeKind::Leaf, "main".to_string());
    for block in program {
        emitter.emit(block);
    }
    emitter.harness
}

fn all_ids(visualization: &Visualization) -> Vec<NodeId> {
    visualization.graph().nodes().map(|(_, node)| node.id).collect()
}

fn click_all(visualization: &mut Visualization, clicks: &[Index]) {
    let ids = all_ids(visualization);
    for click in clicks {
        visualization.handle_click(*click.get(&ids));
    }
}

fn positions(visualization: &Visualization) -> BTreeMap<NodeId, (f32, f32)> {
    visualization
        .visible_nodes()
        .into_iter()
        .map(|node| (node.id, (node.position.x, node.position.y)))
        .collect()
}

proptest! {
    #[test]
    fn proptest_toggle_twice_restores_visible_set(
        program in program_strategy(),
        clicks in prop::collection::vec(any::<Index>(), 0..8),
        pick in any::<Index>(),
    ) {
        let mut visualization = script(&program).finish(ViewConfig::default());
        click_all(&mut visualization, &clicks);

        let before = visible_ids(&visualization);
        let ids = all_ids(&visualization);
        let node = *pick.get(&ids);
        visualization.handle_click(node);
        visualization.handle_click(node);
        prop_assert_eq!(visible_ids(&visualization), before);
    }

    #[test]
    fn proptest_open_region_shows_exactly_one_of_start_and_compound(
        program in program_strategy(),
        clicks in prop::collection::vec(any::<Index>(), 0..8),
    ) {
        let mut visualization = script(&program).finish(ViewConfig::default());
        click_all(&mut visualization, &clicks);

        let graph = visualization.graph();
        let registry = visualization.registry();
        let state = visualization.visibility();
        for region in registry.regions() {
            let open = registry
                .ancestors(region.compound)
                .iter()
                .all(|outer| state.is_expanded(*outer));
            let start = graph.is_visible(region.anchor_start);
            let compound = graph.is_visible(region.compound);
            if open {
                prop_assert!(start != compound, "region {:?}", region.compound);
            } else {
                prop_assert!(!start && !compound);
            }
        }
    }

    #[test]
    fn proptest_data_visibility_follows_neighbours(
        program in program_strategy(),
        clicks in prop::collection::vec(any::<Index>(), 0..8),
        workflow_mode in any::<bool>(),
    ) {
        let config = ViewConfig { workflow_mode, ..ViewConfig::default() };
        let mut visualization = script(&program).finish(config);
        click_all(&mut visualization, &clicks);

        let graph = visualization.graph();
        for (key, node) in graph.nodes().filter(|(_, node)| node.kind.is_data()) {
            let structural = |neighbor: NodeKey| {
                graph.is_visible(neighbor) && !graph.kind(neighbor).is_some_and(|kind| kind.is_compound())
            };
            let builder = |kind: EdgeKind| kind == EdgeKind::DataFlow;
            let step = |kind: EdgeKind| kind == EdgeKind::StepDataFlow;
            let touched = graph
                .neighbors(key, Direction::Incoming, builder)
                .into_iter()
                .chain(graph.neighbors(key, Direction::Outgoing, builder))
                .any(structural);
            let bridged = graph
                .neighbors(key, Direction::Incoming, step)
                .into_iter()
                .any(|compound| graph.is_visible(compound))
                && graph
                    .neighbors(key, Direction::Outgoing, step)
                    .into_iter()
                    .any(|compound| graph.is_visible(compound));
            let pinned = workflow_mode && node.kind.pinned_in_workflow();
            prop_assert_eq!(node.visible, pinned || touched || bridged, "{}", node.name);
        }
    }

    #[test]
    fn proptest_same_depth_nodes_never_overlap(
        program in program_strategy(),
        clicks in prop::collection::vec(any::<Index>(), 0..8),
        expand_all in any::<bool>(),
    ) {
        let mut visualization = script(&program).finish(ViewConfig::default());
        if expand_all {
            visualization.expand_all();
        }
        click_all(&mut visualization, &clicks);

        let spacing = visualization.config().layout.sibling_spacing;
        let layout = visualization.layout();
        let mut rows: BTreeMap<usize, Vec<(f32, f32)>> = BTreeMap::new();
        for (key, depth) in &layout.depths {
            let node = visualization.graph().get_node(*key).unwrap();
            rows.entry(*depth)
                .or_default()
                .push((node.position.x, node.position.x + node.size.width));
        }
        for row in rows.values_mut() {
            row.sort_by(|a, b| a.0.total_cmp(&b.0));
            for pair in row.windows(2) {
                prop_assert!(pair[1].0 >= pair[0].1 + spacing - 1e-3, "{:?}", pair);
            }
        }
    }

    #[test]
    fn proptest_layout_is_deterministic(
        program in program_strategy(),
        clicks in prop::collection::vec(any::<Index>(), 0..8),
    ) {
        let harness = script(&program);
        let mut first = harness.finish(ViewConfig::default());
        let mut second = harness.finish(ViewConfig::default());
        click_all(&mut first, &clicks);
        click_all(&mut second, &clicks);
        prop_assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn proptest_generated_programs_pair_every_region(program in program_strategy()) {
        let visualization = script(&program).finish(ViewConfig::default());
        prop_assert!(visualization.diagnostics().is_empty(), "{:?}", visualization.diagnostics());

        let starts: BTreeSet<NodeKey> = visualization
            .graph()
            .nodes()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Start | NodeKind::Checkpoint))
            .map(|(key, _)| key)
            .collect();
        let anchored: BTreeSet<NodeKey> = visualization
            .registry()
            .regions()
            .iter()
            .map(|region| region.anchor_start)
            .collect();
        prop_assert_eq!(starts, anchored);
    }
}
