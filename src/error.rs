//! Error types for the update engine.
//!
//! Batch-level errors ([`ScanError`], [`BatchError`]) end the whole invocation.
//! Everything else is an [`UpdateError`], which belongs to exactly one codelab
//! and never stops its siblings.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by collaborators (fetcher, client factory, asset retriever, writer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A scan root could not be traversed.
#[derive(Debug, Error)]
#[error("{}: {source}", .root.display())]
pub struct ScanError {
    pub root: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors that terminate a whole batch before any codelab is updated.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("no codelabs found in {roots}")]
    NoCodelabs { roots: String },
}

/// Missing or malformed metadata record.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding metadata: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure of a single codelab update. Isolated to that codelab.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error("fetching {reference}: {source}")]
    Fetch {
        reference: String,
        #[source]
        source: BoxError,
    },

    #[error("codelab id {0:?} cannot be used as a directory name")]
    InvalidId(String),

    #[error("{} has no parent directory", .0.display())]
    NoParent(PathBuf),

    #[error("creating authenticated client: {0}")]
    Client(#[source] BoxError),

    #[error("retrieving assets into {}: {source}", .dir.display())]
    Assets {
        dir: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("writing codelab to {}: {source}", .dir.display())]
    Write {
        dir: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("cleaning up {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("update task failed: {0}")]
    Task(String),
}
