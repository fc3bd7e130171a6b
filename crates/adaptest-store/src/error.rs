//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the storage backends themselves.
///
/// Engine-level conditions (version conflicts, unknown sessions) are
/// reported as `adaptest_core::error::CatError` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the state file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not a valid snapshot.
    #[error("corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A session with this id already exists.
    #[error("session already exists: {0}")]
    DuplicateSession(Uuid),
}
