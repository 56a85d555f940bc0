//! Resolved runtime configuration for a fetch run.
//!
//! The CLI merges command-line flags, the optional config file, and these
//! defaults into a single [`FetchConfig`] that is built once per run.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::ImageType;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "Fetched_Images";

/// Default maximum accepted body size (10 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default politeness delay between consecutive URLs in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 600;

/// Everything a fetch run needs to know, after all sources are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Directory that receives downloaded files and `index.json`.
    pub output_dir: PathBuf,
    /// Ceiling on accepted body size, checked on headers and while streaming.
    pub max_bytes: u64,
    /// Content types accepted for download.
    pub allowed_types: Vec<ImageType>,
    /// Per-request network timeout.
    pub timeout: Duration,
    /// Pause between consecutive URLs.
    pub delay: Duration,
    /// Whether `index.json` is read at startup and written at shutdown.
    pub use_index: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_bytes: DEFAULT_MAX_BYTES,
            allowed_types: ImageType::ALL.to_vec(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            use_index: true,
        }
    }
}
