/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Load a graph snapshot, apply view actions, and print the visible graph as JSON.

use bpaf::Bpaf;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ddg_view::persistence::read_snapshot;
use ddg_view::persistence::types::GraphSnapshot;
use ddg_view::{NodeId, ViewConfig, Visualization, feed};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
struct Options {
    /// View configuration (TOML)
    #[bpaf(long, argument("PATH"))]
    config: Option<PathBuf>,
    /// Replay the snapshot one operation at a time, refreshing after each
    incremental: bool,
    /// Expand every procedure region
    expand_all: bool,
    /// Click the node with this id; may be repeated
    #[bpaf(long("click"), argument("ID"))]
    clicks: Vec<u64>,
    /// Bring the named node into view and center on it
    #[bpaf(long, argument("NAME"))]
    focus: Option<String>,
    /// Graph snapshot (JSON)
    #[bpaf(positional("SNAPSHOT"))]
    snapshot: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let opts = options().run();
    init_tracing();

    let mut config = match &opts.config {
        Some(path) => match ViewConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{e}");
                return ExitCode::FAILURE;
            },
        },
        None => ViewConfig::default(),
    };
    config.incremental |= opts.incremental;

    let snapshot = match read_snapshot(&opts.snapshot) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        },
    };

    let Some(mut visualization) = build(config, &snapshot) else {
        return ExitCode::FAILURE;
    };

    if opts.expand_all {
        visualization.expand_all();
    }
    for id in &opts.clicks {
        let outcome = visualization.handle_click(NodeId(*id));
        log::info!("click {}: {outcome:?}", NodeId(*id));
    }
    if let Some(name) = &opts.focus
        && visualization.focus_on(name).is_none()
    {
        log::warn!("no node matches {name:?}");
    }

    match serde_json::to_string_pretty(&render(&visualization)) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        },
    }
}

fn build(config: ViewConfig, snapshot: &GraphSnapshot) -> Option<Visualization> {
    if !config.incremental {
        return Some(Visualization::from_snapshot(config, snapshot));
    }

    let shared = Visualization::new(config).into_shared();
    let (feed, applier) = feed::spawn_incremental(shared.clone());
    match feed.send_all(snapshot.replay()) {
        Ok(rejected) if !rejected.is_empty() => {
            log::warn!("{} operations rejected", rejected.len())
        },
        Ok(_) => {},
        Err(e) => log::error!("{e}"),
    }
    drop(feed);
    if applier.join().is_err() {
        log::error!("incremental applier panicked");
        return None;
    }
    match Arc::try_unwrap(shared) {
        Ok(mutex) => Some(mutex.into_inner()),
        Err(_) => {
            log::error!("visualization still shared after the feed closed");
            None
        },
    }
}

fn render(visualization: &Visualization) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = visualization
        .visible_nodes()
        .into_iter()
        .map(|node| {
            serde_json::json!({
                "id": node.id,
                "kind": node.kind.label(),
                "name": node.name,
                "value": node.value,
                "time": node.timestamp_label(),
                "x": node.position.x,
                "y": node.position.y,
                "width": node.size.width,
                "height": node.size.height,
            })
        })
        .collect();
    let edges: Vec<serde_json::Value> = visualization
        .visible_edges()
        .into_iter()
        .map(|(source, target, kind)| serde_json::json!({ "source": source, "target": target, "kind": kind }))
        .collect();
    let diagnostics: Vec<String> = visualization
        .diagnostics()
        .iter()
        .map(ToString::to_string)
        .collect();
    serde_json::json!({
        "nodes": nodes,
        "edges": edges,
        "diagnostics": diagnostics,
    })
}
