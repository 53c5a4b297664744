/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Graph snapshots on disk.
//!
//! A snapshot is the full builder graph serialized as JSON. View state
//! (collapsed regions, positions) is never persisted.

pub mod types;

use std::path::Path;
use types::GraphSnapshot;

/// Read a snapshot from a JSON file.
pub fn read_snapshot(path: &Path) -> Result<GraphSnapshot, SnapshotError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SnapshotError::Io(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| SnapshotError::Json(format!("{e}")))
}

/// Write a snapshot as pretty-printed JSON, replacing any existing file.
pub fn write_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<(), SnapshotError> {
    let text =
        serde_json::to_string_pretty(snapshot).map_err(|e| SnapshotError::Json(format!("{e}")))?;
    std::fs::write(path, text)
        .map_err(|e| SnapshotError::Io(format!("Failed to write {}: {e}", path.display())))
}

/// Errors from snapshot files
#[derive(Debug)]
pub enum SnapshotError {
    Io(String),
    Json(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "IO error: {e}"),
            SnapshotError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}
