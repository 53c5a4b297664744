/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! View configuration, loaded from TOML.
//!
//! Every field has a default, so a config file only needs the keys it changes:
//!
//! ```toml
//! workflow_mode = true
//!
//! [layout]
//! sibling_spacing = 20.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Show File and URL nodes whether or not their neighbours are visible.
    pub workflow_mode: bool,
    /// Re-run discovery, visibility, and layout after every builder operation.
    pub incremental: bool,
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            workflow_mode: false,
            incremental: false,
            layout: LayoutConfig::default(),
            viewport: ViewportConfig::default(),
        }
    }
}

impl ViewConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// Spacing constants and node metrics for the tidy layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal gap between neighbouring nodes at one depth.
    pub sibling_spacing: f32,
    /// Horizontal gap between neighbouring subtrees.
    pub subtree_spacing: f32,
    /// Vertical gap between procedure levels; data satellites sit halfway.
    pub depth_spacing: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub metrics: NodeMetrics,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            sibling_spacing: 15.0,
            subtree_spacing: 30.0,
            depth_spacing: 50.0,
            anchor_x: 0.0,
            anchor_y: 0.0,
            metrics: NodeMetrics::default(),
        }
    }
}

/// Label-based size estimate for nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetrics {
    pub char_width: f32,
    pub padding: f32,
    pub min_width: f32,
    pub height: f32,
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            padding: 6.0,
            min_width: 40.0,
            height: 20.0,
        }
    }
}

impl NodeMetrics {
    pub fn width_for(&self, label: &str) -> f32 {
        let text = label.chars().count() as f32 * self.char_width + 2.0 * self.padding;
        text.max(self.min_width)
    }
}

/// Area the drawing is centered in by focus requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
        }
    }
}

/// Errors from loading a config file
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
