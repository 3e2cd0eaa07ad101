// SPDX-License-Identifier: MIT OR Apache-2.0
//! Async command surface for the editor.
//!
//! Every sync request carries a sequence number taken when it is issued.
//! Evaluation runs on the blocking pool; when it finishes, a request that
//! is no longer the newest reports [`SyncOutcome::Superseded`] instead of
//! its frame.

use crate::HostError;
use pixelforge_graph::Engine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Result of a sync request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Request is the newest; raw RGBA bytes of the frame
    Frame {
        /// Sequence number of the request
        seq: u64,
        /// Row-major RGBA8 pixels
        bytes: Vec<u8>,
    },
    /// A newer request was issued while this one was evaluating
    Superseded {
        /// Sequence number of the request
        seq: u64,
    },
}

impl SyncOutcome {
    /// Sequence number of the request
    pub fn seq(&self) -> u64 {
        match self {
            Self::Frame { seq, .. } | Self::Superseded { seq } => *seq,
        }
    }

    /// Frame bytes, if the request was not superseded
    pub fn into_frame(self) -> Option<Vec<u8>> {
        match self {
            Self::Frame { bytes, .. } => Some(bytes),
            Self::Superseded { .. } => None,
        }
    }
}

/// Editor connection to an engine
#[derive(Debug, Clone)]
pub struct SyncSession {
    engine: Arc<Engine>,
    latest: Arc<AtomicU64>,
}

impl SyncSession {
    /// Create a session on `engine`
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The engine behind this session
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Sequence number of the newest request issued so far
    pub fn latest_seq(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Initialize the rendering backend
    pub async fn init_renderer(&self) -> Result<String, HostError> {
        let engine = Arc::clone(&self.engine);
        let info = tokio::task::spawn_blocking(move || engine.initialize()).await??;
        Ok(info)
    }

    /// Issue a sync request without waiting for it.
    ///
    /// The sequence number is taken here, so requests are ordered by when
    /// this is called rather than by when they are awaited.
    pub fn request(&self, graph_json: impl Into<String>) -> PendingSync {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let graph_json = graph_json.into();
        let engine = Arc::clone(&self.engine);
        tracing::debug!(seq, bytes = graph_json.len(), "sync requested");

        let task = tokio::task::spawn_blocking(move || {
            let _span = tracing::debug_span!("sync", seq).entered();
            engine.evaluate_json(&graph_json)
        });
        PendingSync {
            seq,
            latest: Arc::clone(&self.latest),
            task,
        }
    }

    /// Evaluate a graph snapshot and wait for the outcome
    pub async fn sync_graph(&self, graph_json: impl Into<String>) -> Result<SyncOutcome, HostError> {
        self.request(graph_json).outcome().await
    }
}

/// An in-flight sync request
#[derive(Debug)]
pub struct PendingSync {
    seq: u64,
    latest: Arc<AtomicU64>,
    task: JoinHandle<Result<Vec<u8>, pixelforge_graph::EngineError>>,
}

impl PendingSync {
    /// Sequence number of this request
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wait for evaluation to finish.
    ///
    /// A superseded request reports [`SyncOutcome::Superseded`] even if its
    /// evaluation failed.
    pub async fn outcome(self) -> Result<SyncOutcome, HostError> {
        let result = self.task.await?;
        let latest = self.latest.load(Ordering::SeqCst);
        if latest != self.seq {
            tracing::debug!(seq = self.seq, latest, "discarding stale result");
            return Ok(SyncOutcome::Superseded { seq: self.seq });
        }
        match result {
            Ok(bytes) => Ok(SyncOutcome::Frame {
                seq: self.seq,
                bytes,
            }),
            Err(err) => {
                tracing::warn!(seq = self.seq, "sync failed: {err}");
                Err(err.into())
            }
        }
    }
}
