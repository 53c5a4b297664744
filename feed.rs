/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Builder operations and the incremental feed.
//!
//! In incremental mode the graph builder hands operations one at a time to
//! an applier thread and waits for each to be applied (and the view
//! refreshed) before producing the next.

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};

use crate::error::ViewError;
use crate::graph::{EdgeKind, NodeId, NodeSpec};
use crate::visualization::SharedVisualization;

/// One call from the graph builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphOp {
    AddNode(NodeSpec),
    AddEdge {
        kind: EdgeKind,
        source: NodeId,
        target: NodeId,
    },
    SetRoot {
        node: NodeId,
    },
    /// The builder is done; pairs that are still open stay unpaired.
    ProcessFinished,
}

/// Sending half of an incremental feed. Dropping it stops the applier.
pub struct GraphFeed {
    ops: Sender<GraphOp>,
    acks: Receiver<Result<(), ViewError>>,
}

impl GraphFeed {
    /// Hand over one operation and block until it has been applied.
    pub fn send(&self, op: GraphOp) -> Result<(), FeedError> {
        self.ops.send(op).map_err(|_| FeedError::Disconnected)?;
        match self.acks.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(FeedError::Rejected(error)),
            Err(_) => Err(FeedError::Disconnected),
        }
    }

    /// Send every operation in order. Rejected operations are skipped; the
    /// feed stops at the first disconnect.
    pub fn send_all(&self, ops: impl IntoIterator<Item = GraphOp>) -> Result<Vec<ViewError>, FeedError> {
        let mut rejected = Vec::new();
        for op in ops {
            match self.send(op) {
                Ok(()) => {},
                Err(FeedError::Rejected(error)) => rejected.push(error),
                Err(FeedError::Disconnected) => return Err(FeedError::Disconnected),
            }
        }
        Ok(rejected)
    }
}

/// Start an applier thread for `shared`. The handle yields the number of
/// operations applied once the feed is dropped.
pub fn spawn_incremental(shared: SharedVisualization) -> (GraphFeed, JoinHandle<usize>) {
    let (op_tx, op_rx) = crossbeam_channel::bounded::<GraphOp>(0);
    let (ack_tx, ack_rx) = crossbeam_channel::bounded(0);
    let handle = thread::spawn(move || {
        let mut applied = 0;
        for op in op_rx.iter() {
            let result = shared.lock().apply(op);
            applied += 1;
            if ack_tx.send(result).is_err() {
                break;
            }
        }
        log::debug!("feed: applier stopped after {applied} operations");
        applied
    });
    (
        GraphFeed {
            ops: op_tx,
            acks: ack_rx,
        },
        handle,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedError {
    /// The applier thread is gone.
    Disconnected,
    Rejected(ViewError),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Disconnected => write!(f, "incremental feed disconnected"),
            FeedError::Rejected(error) => write!(f, "operation rejected: {error}"),
        }
    }
}

impl std::error::Error for FeedError {}
