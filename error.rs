/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Recoverable errors reported by the view engine.
//!
//! Nothing here is fatal: the operation that hit the error becomes a no-op (or
//! leaves a region uncollapsible, or leaves a layout gap) and the graph,
//! registry, and view state stay usable.

use crate::graph::NodeId;

/// Broad class of a [`ViewError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A Start/Finish or Checkpoint/Restore pair could not be matched.
    RegionPairing,
    /// A Start whose Finish never arrived (aborted execution).
    MissingFinish,
    /// An operation referenced an unknown node or reused an existing id.
    ReferentialIntegrity,
    /// A visible node could not be placed by the layout engine.
    LayoutInvariant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewError {
    RegionPairing {
        start: NodeId,
        start_name: String,
        finish: NodeId,
        finish_name: String,
    },
    UnmatchedFinish {
        finish: NodeId,
        name: String,
    },
    CheckpointPairing {
        checkpoint: Option<NodeId>,
        restore: NodeId,
        reason: &'static str,
    },
    MissingFinish {
        start: NodeId,
        name: String,
    },
    UnknownNode {
        id: NodeId,
    },
    DuplicateNode {
        id: NodeId,
    },
    ReservedNodeId {
        id: NodeId,
    },
    LayoutUnreachable {
        id: NodeId,
    },
    NoLayoutRoot,
}

impl ViewError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ViewError::RegionPairing { .. }
            | ViewError::UnmatchedFinish { .. }
            | ViewError::CheckpointPairing { .. } => ErrorCategory::RegionPairing,
            ViewError::MissingFinish { .. } => ErrorCategory::MissingFinish,
            ViewError::UnknownNode { .. }
            | ViewError::DuplicateNode { .. }
            | ViewError::ReservedNodeId { .. } => ErrorCategory::ReferentialIntegrity,
            ViewError::LayoutUnreachable { .. } | ViewError::NoLayoutRoot => {
                ErrorCategory::LayoutInvariant
            },
        }
    }
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewError::RegionPairing {
                start,
                start_name,
                finish,
                finish_name,
            } => write!(
                f,
                "Region pairing error: '{start_name}' ({start}) closed by '{finish_name}' ({finish})"
            ),
            ViewError::UnmatchedFinish { finish, name } => {
                write!(f, "Region pairing error: '{name}' ({finish}) has no matching start")
            },
            ViewError::CheckpointPairing {
                checkpoint: Some(checkpoint),
                restore,
                reason,
            } => write!(
                f,
                "Checkpoint pairing error: restore {restore} with checkpoint {checkpoint}: {reason}"
            ),
            ViewError::CheckpointPairing {
                checkpoint: None,
                restore,
                reason,
            } => write!(f, "Checkpoint pairing error: restore {restore}: {reason}"),
            ViewError::MissingFinish { start, name } => {
                write!(f, "Missing finish for '{name}' ({start}); region stays expanded")
            },
            ViewError::UnknownNode { id } => write!(f, "Unknown node id {id}"),
            ViewError::DuplicateNode { id } => write!(f, "Duplicate node id {id}"),
            ViewError::ReservedNodeId { id } => {
                write!(f, "Node id {id} lies in the range reserved for compound nodes")
            },
            ViewError::LayoutUnreachable { id } => {
                write!(f, "Layout error: node {id} is not reachable from the layout root")
            },
            ViewError::NoLayoutRoot => write!(f, "Layout error: no visible node can act as root"),
        }
    }
}

impl std::error::Error for ViewError {}
