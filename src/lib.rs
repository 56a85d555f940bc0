//! Image Fetcher Core Library
//!
//! This library provides the core functionality for the image fetcher tool,
//! which downloads images from user-supplied URLs into a local folder while
//! rejecting non-image responses and skipping content it has already stored.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Resolved runtime configuration and its defaults
//! - [`download`] - HTTP client, header validation, and the fetch pipeline
//! - [`index`] - Content-hash duplicate index and its `index.json` sidecar
//! - [`input`] - URL list parsing from arguments, files, and prompts

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod index;
pub mod input;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use config::{DEFAULT_MAX_BYTES, DEFAULT_OUTPUT_DIR, FetchConfig};
pub use download::{
    ContentValidator, DownloadError, FetchContext, FetchOutcome, Fetcher, HttpClient, ImageType,
    RejectKind, RejectReason, ResponseMetadata, StorageError, Validation,
};
pub use index::{
    ContentHash, ContentRecord, DuplicateIndex, INDEX_FILENAME, IndexError, IndexStore,
    InsertOutcome,
};
pub use input::{UrlList, parse_url_list};
