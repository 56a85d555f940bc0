//! HTTP fetching, header validation, and streaming storage for images.
//!
//! # Features
//!
//! - Streaming downloads hashed chunk by chunk (no full-body buffering)
//! - Allow-listed image content types and a size ceiling checked twice:
//!   on `Content-Length` and again while streaming
//! - Content-hash duplicate detection through [`crate::index::DuplicateIndex`]
//! - Safe file names from `Content-Disposition` or the URL, never overwriting
//!
//! # Example
//!
//! ```no_run
//! use image_fetcher_core::{DuplicateIndex, FetchConfig, FetchContext, FetchOutcome, Fetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::default();
//! let fetcher = Fetcher::from_config(&config)?;
//! let ctx = FetchContext::new(&config.output_dir, DuplicateIndex::new());
//! match fetcher.fetch(&ctx, "https://example.com/cat.png").await? {
//!     FetchOutcome::Saved { path, .. } => println!("saved {}", path.display()),
//!     other => println!("{}", other.label()),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod fetcher;
mod filename;
mod validator;

pub use client::HttpClient;
pub use error::{DownloadError, StorageError};
pub use fetcher::{FetchContext, FetchOutcome, Fetcher, ensure_output_dir};
pub use validator::{
    ContentValidator, ImageType, RejectKind, RejectReason, ResponseMetadata, Validation,
};

pub(crate) use filename::is_temp_or_hidden;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` / `Result<T, StorageError>` explicitly.
