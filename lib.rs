/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Collapsible view engine for data derivation graphs.
//!
//! A graph builder streams procedure and data nodes into [`graph::Graph`].
//! [`view::registry::CollapseRegistry`] discovers Start/Finish and
//! Checkpoint/Restore regions and synthesizes compound nodes for them,
//! [`view::visibility::VisibilityState`] decides which nodes are shown, and
//! [`layout::LayoutEngine`] places exactly the visible nodes.
//! [`visualization::Visualization`] ties the pieces together behind one lock.

pub mod config;
pub mod error;
pub mod feed;
pub mod graph;
pub mod layout;
pub mod persistence;
pub mod view;
pub mod visualization;

#[cfg(test)]
pub(crate) mod harness;

pub use config::ViewConfig;
pub use error::ViewError;
pub use feed::GraphOp;
pub use graph::{EdgeKind, Graph, NodeId, NodeKind, NodeSpec};
pub use visualization::{SharedVisualization, Visualization};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
