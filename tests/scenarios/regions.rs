/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use ddg_view::error::ErrorCategory;
use ddg_view::view::{CollapseRegistry, RegionKind, ToggleOutcome};
use ddg_view::{Graph, NodeId, NodeKind, NodeSpec, ViewConfig};

use super::harness::{TestHarness, ids, visible_ids};

fn four_step_region() -> TestHarness {
    let mut harness = TestHarness::new();
    harness
        .step(1, NodeKind::Start, "p Start")
        .step(2, NodeKind::Leaf, "p2")
        .step(3, NodeKind::Leaf, "p3")
        .step(4, NodeKind::Finish, "p Finish")
        .node(1001, NodeKind::Data, "d1")
        .node(1002, NodeKind::Data, "d2")
        .data(2, 1001)
        .data(3, 1002);
    harness
}

#[test]
fn start_finish_chain_collapses_into_one_compound() {
    let mut visualization = four_step_region().finish(ViewConfig::default());
    let compound = visualization
        .compound_for(NodeId(1))
        .expect("region should be discovered");

    assert_eq!(
        visualization.members(compound),
        vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
    );
    assert_eq!(visible_ids(&visualization), [compound].into_iter().collect());

    assert_eq!(
        visualization.handle_click(compound),
        ToggleOutcome::Expanded(visualization.graph().key_of(compound).unwrap())
    );
    assert_eq!(visible_ids(&visualization), ids(&[1, 2, 3, 4, 1001, 1002]));
    assert!(visualization.diagnostics().is_empty());
}

#[test]
fn restore_reading_checkpoint_data_pairs_with_that_checkpoint() {
    let mut harness = TestHarness::new();
    harness
        .step(1, NodeKind::Leaf, "setup")
        .step(2, NodeKind::Checkpoint, "ckpt Checkpoint")
        .step(3, NodeKind::Checkpoint, "scratch Checkpoint")
        .step(4, NodeKind::Leaf, "train")
        .step(5, NodeKind::Leaf, "evaluate")
        .step(6, NodeKind::Restore, "rst Restore")
        .step(7, NodeKind::Leaf, "report")
        .node(1001, NodeKind::Snapshot, "saved state")
        .data(2, 1001)
        .data(1001, 6);
    let mut visualization = harness.finish(ViewConfig::default());

    let rst = visualization.graph().key_of(NodeId(6)).unwrap();
    let ckpt = visualization.graph().key_of(NodeId(2)).unwrap();
    assert_eq!(visualization.registry().paired_checkpoint(rst), Some(ckpt));

    let compound = visualization.compound_for(NodeId(6)).unwrap();
    let region = visualization
        .registry()
        .region_for_restore(rst)
        .expect("restore should close a region");
    assert_eq!(region.kind, RegionKind::Checkpoint);

    // Open the region, then close it again from the restore side.
    visualization.handle_click(compound);
    assert!(visible_ids(&visualization).is_superset(&ids(&[2, 3, 4, 5, 6])));
    assert!(matches!(
        visualization.handle_click(NodeId(6)),
        ToggleOutcome::Collapsed(_)
    ));
    let visible = visible_ids(&visualization);
    assert!(visible.contains(&compound));
    assert!(visible.is_disjoint(&ids(&[2, 3, 4, 5, 6])));
    assert!(visible.is_superset(&ids(&[1, 7])));
    // An unpaired checkpoint is not an error.
    assert_eq!(visualization.diagnostics().len(), 0);
}

#[test]
fn mismatched_finish_is_reported_and_still_returned() {
    let mut graph = Graph::new();
    let start = graph
        .add_node(NodeSpec::new(1, NodeKind::Start, "3-foo Start"))
        .unwrap();
    graph
        .add_node(NodeSpec::new(2, NodeKind::Leaf, "work"))
        .unwrap();
    let finish = graph
        .add_node(NodeSpec::new(3, NodeKind::Finish, "3-bar Finish"))
        .unwrap();
    graph
        .add_edge(ddg_view::EdgeKind::ControlFlow, NodeId(1), NodeId(2))
        .unwrap();
    graph
        .add_edge(ddg_view::EdgeKind::ControlFlow, NodeId(2), NodeId(3))
        .unwrap();

    let mut registry = CollapseRegistry::new();
    let mut errors = Vec::new();
    let walk = registry.discover_region(&mut graph, start, &mut errors);

    assert_eq!(walk.finish, Some(finish));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category(), ErrorCategory::RegionPairing);
    assert!(registry.compound_for_anchor(start).is_none());
}

#[test]
fn mismatched_region_stays_expanded_in_the_view() {
    let mut harness = TestHarness::new();
    harness
        .step(1, NodeKind::Start, "3-foo Start")
        .step(2, NodeKind::Leaf, "work")
        .step(3, NodeKind::Finish, "3-bar Finish");
    let mut visualization = harness.finish(ViewConfig::default());

    assert_eq!(visible_ids(&visualization), ids(&[1, 2, 3]));
    assert_eq!(visualization.handle_click(NodeId(1)), ToggleOutcome::Ignored);
    let categories: Vec<ErrorCategory> = visualization
        .diagnostics()
        .iter()
        .map(|error| error.category())
        .collect();
    assert_eq!(categories, vec![ErrorCategory::RegionPairing]);
}

#[test]
fn nested_regions_open_one_level_at_a_time() {
    let mut harness = TestHarness::new();
    harness
        .step(1, NodeKind::Start, "outer Start")
        .step(2, NodeKind::Start, "inner Start")
        .step(3, NodeKind::Leaf, "work")
        .step(4, NodeKind::Finish, "inner Finish")
        .step(5, NodeKind::Finish, "outer Finish");
    let mut visualization = harness.finish(ViewConfig::default());
    let outer = visualization.compound_for(NodeId(1)).unwrap();
    let inner = visualization.compound_for(NodeId(2)).unwrap();

    assert_eq!(visible_ids(&visualization), [outer].into_iter().collect());
    visualization.handle_click(outer);
    assert_eq!(
        visible_ids(&visualization),
        [NodeId(1), inner, NodeId(5)].into_iter().collect()
    );
    assert!(visualization.expand_recursively(NodeId(1)));
    assert_eq!(visible_ids(&visualization), ids(&[1, 2, 3, 4, 5]));
}
