/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

/// Kind of a node in a data derivation graph.
///
/// Procedure kinds (`Start` .. `Step`) describe executions; data kinds
/// (`Data` .. `Exception`) describe values consumed or produced by them.
/// `Step` is never created by a graph builder: it marks a compound node
/// synthesized for a collapsed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Start,
    Finish,
    Interm,
    Leaf,
    Checkpoint,
    Restore,
    Step,
    Data,
    File,
    Snapshot,
    Url,
    Exception,
}

impl NodeKind {
    pub fn is_data(self) -> bool {
        matches!(
            self,
            NodeKind::Data | NodeKind::File | NodeKind::Snapshot | NodeKind::Url | NodeKind::Exception
        )
    }

    pub fn is_procedure(self) -> bool {
        !self.is_data()
    }

    pub fn is_compound(self) -> bool {
        self == NodeKind::Step
    }

    /// Data kinds shown regardless of their neighbours in workflow mode.
    pub fn pinned_in_workflow(self) -> bool {
        matches!(self, NodeKind::File | NodeKind::Url)
    }

    pub fn can_be_layout_root(self) -> bool {
        matches!(
            self,
            NodeKind::Start | NodeKind::Interm | NodeKind::Leaf | NodeKind::Checkpoint | NodeKind::Step
        )
    }

    /// Name suffix the graph builder gives region anchors of this kind.
    pub fn region_suffix(self) -> Option<&'static str> {
        match self {
            NodeKind::Start => Some(" Start"),
            NodeKind::Finish => Some(" Finish"),
            NodeKind::Checkpoint => Some(" Checkpoint"),
            NodeKind::Restore => Some(" Restore"),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Finish => "Finish",
            NodeKind::Interm => "Interm",
            NodeKind::Leaf => "Leaf",
            NodeKind::Checkpoint => "Checkpoint",
            NodeKind::Restore => "Restore",
            NodeKind::Step => "Step",
            NodeKind::Data => "Data",
            NodeKind::File => "File",
            NodeKind::Snapshot => "Snapshot",
            NodeKind::Url => "URL",
            NodeKind::Exception => "Exception",
        }
    }
}

/// Type of edge connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Execution order between two procedure nodes.
    ControlFlow,
    /// Producer → data or data → consumer.
    DataFlow,
    /// Control flow redirected onto a compound node.
    StepControlFlow,
    /// Data flow redirected onto a compound node.
    StepDataFlow,
}

impl EdgeKind {
    pub fn is_control(self) -> bool {
        matches!(self, EdgeKind::ControlFlow | EdgeKind::StepControlFlow)
    }

    pub fn is_data(self) -> bool {
        matches!(self, EdgeKind::DataFlow | EdgeKind::StepDataFlow)
    }

    /// Edges created by the collapse registry rather than the graph builder.
    pub fn is_synthetic(self) -> bool {
        matches!(self, EdgeKind::StepControlFlow | EdgeKind::StepDataFlow)
    }
}

const REGION_ANCHORS: [NodeKind; 4] = [
    NodeKind::Start,
    NodeKind::Finish,
    NodeKind::Checkpoint,
    NodeKind::Restore,
];

/// Region identifier of a node name: the text before its region-type suffix.
///
/// `"3-foo Start"` and `"3-foo Finish"` both yield `"3-foo"`; names without a
/// suffix are returned unchanged.
pub fn region_label(name: &str) -> &str {
    let trimmed = name.trim_end();
    REGION_ANCHORS
        .iter()
        .filter_map(|kind| kind.region_suffix())
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .map(str::trim_end)
        .unwrap_or(trimmed)
}
