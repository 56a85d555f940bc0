//! Error types for index persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading, writing, or rebuilding the index sidecar.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Filesystem error on the index file or a scanned file.
    #[error("index IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The index file exists but is not a valid index.
    #[error("index file {path} is corrupt: {source}")]
    Corrupt {
        /// The index file path.
        path: PathBuf,
        /// The JSON decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory index could not be encoded.
    #[error("failed to encode index: {source}")]
    Encode {
        /// The JSON encoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl IndexError {
    /// Creates an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corrupt-file error.
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }
}
