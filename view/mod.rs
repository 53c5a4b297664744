/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! View state over the graph: which regions exist, and which nodes are shown.

pub mod registry;
pub mod visibility;

pub use registry::{CollapseRegistry, Region, RegionId, RegionKind, RegionWalk};
pub use visibility::{ToggleOutcome, VisibilityState, visible_edges};
