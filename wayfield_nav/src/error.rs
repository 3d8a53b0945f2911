// Error types for mesh building, persistence and search.
//
// Two layers:
// - `SearchError`: small `Copy` failure codes for a single path request.
//   These cross the worker channel back to the requesting agent, so they
//   carry no heap data.
// - `NavError`: everything else (configuration, I/O, decoding), wrapping
//   `SearchError` for call sites that mix both.
//
// Build-time errors abort only the build that raised them. Search errors end
// only the request that raised them.

use thiserror::Error;

/// Why a single path request produced no path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The open set ran dry without reaching the goal.
    #[error("no path found")]
    NoPathFound,

    /// The soft deadline passed before the goal was reached.
    #[error("search timed out")]
    SearchTimedOut,

    /// Position resolution against a mesh with no nodes.
    #[error("no node found (mesh is empty)")]
    NotFound,

    /// A newer request for the same agent superseded this one.
    #[error("search cancelled")]
    Cancelled,

    /// The mesh has no adjacency yet (it was never built, or was modified
    /// after building).
    #[error("configuration error: mesh adjacency has not been built")]
    MeshNotBuilt,
}

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum NavError {
    /// Invalid build parameters, missing volume, or a malformed/inconsistent
    /// persisted file.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    /// Every path worker thread has exited, so requests can't be queued.
    #[error("path worker has shut down")]
    WorkerStopped,
}

impl NavError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Result type used throughout the crate.
pub type NavResult<T> = Result<T, NavError>;
