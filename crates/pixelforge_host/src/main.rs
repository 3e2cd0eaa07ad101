// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render a serialized graph to a PNG file.
//!
//! ```text
//! pixelforge_host <graph.json> [output.png] [config.ron]
//! ```

use pixelforge_graph::{Engine, EngineConfig, Raster};
use pixelforge_host::{logging, HostError, SyncOutcome, SyncSession};
use std::path::PathBuf;
use std::sync::Arc;

const USAGE: &str = "usage: pixelforge_host <graph.json> [output.png] [config.ron]";

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("{e}");
    }

    tracing::info!("Starting PixelForge host v{}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let Some(graph_path) = args.next().map(PathBuf::from) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let output_path = args.next().map_or_else(|| PathBuf::from("output.png"), PathBuf::from);
    let config_path = args.next().map(PathBuf::from);

    if let Err(e) = run(graph_path, output_path, config_path).await {
        tracing::error!("Render failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    graph_path: PathBuf,
    output_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<(), HostError> {
    let config = match config_path {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    let (width, height) = (config.width, config.height);

    let session = SyncSession::new(Arc::new(Engine::new(config)));
    let info = session.init_renderer().await?;
    tracing::debug!("{info}");

    let graph_json = std::fs::read_to_string(&graph_path)?;
    let bytes = match session.sync_graph(graph_json).await? {
        SyncOutcome::Frame { bytes, .. } => bytes,
        SyncOutcome::Superseded { seq } => {
            tracing::warn!(seq, "render superseded; nothing written");
            return Ok(());
        }
    };

    let png = Raster::from_bytes(width, height, bytes)?.to_png()?;
    std::fs::write(&output_path, png)?;
    tracing::info!("Wrote {}x{} frame to {}", width, height, output_path.display());
    Ok(())
}
