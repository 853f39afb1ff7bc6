//! # Store Error Types
//!
//! Error types for snapshot persistence.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error / serde_json::Error                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds the file path                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DigestError::Store                                                    │
//! │       │                                                                 │
//! │       ├── on load: NotFound/Parse → start from an empty snapshot        │
//! │       └── on save: logged, the in-memory snapshot stays authoritative   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Snapshot persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No cache file exists yet.
    ///
    /// ## When This Occurs
    /// - First run on this machine
    /// - The cache path was changed in the config
    #[error("Snapshot not found at {}", path.display())]
    NotFound { path: PathBuf },

    /// The cache file exists but is not a valid snapshot.
    ///
    /// ## When This Occurs
    /// - The file was truncated by a crash before atomic writes were used
    /// - The file was edited by hand
    #[error("Snapshot at {} is unreadable: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded.
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if starting from an empty snapshot is the right recovery.
    pub fn is_recoverable_on_load(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::Parse { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
