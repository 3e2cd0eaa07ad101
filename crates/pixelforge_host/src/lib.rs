// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host side of the `PixelForge` editor boundary.
//!
//! The editor sends whole graph snapshots; the host evaluates them off the
//! async runtime and hands back raw RGBA frames. Results of requests that
//! were overtaken by a newer one are reported as superseded so the caller
//! never displays a stale frame.

pub mod logging;
pub mod session;

pub use session::{PendingSync, SyncOutcome, SyncSession};

use pixelforge_graph::{ConfigError, EngineError, RasterError};

/// Host-level failure
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Engine rejected the request
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Blocking evaluation task panicked or was cancelled
    #[error("evaluation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Frame could not be encoded
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// File could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be set up
    #[error("logging: {0}")]
    Logging(String),
}
