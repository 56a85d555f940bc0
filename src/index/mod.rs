//! Content-hash duplicate index.
//!
//! [`DuplicateIndex`] maps the SHA-256 of downloaded bytes to the record of the
//! file that holds them. Keys are content digests, not URLs: different URLs can
//! serve identical bytes and one URL can serve different bytes over time.
//!
//! The map is a [`DashMap`], so every method takes `&self` and `insert` is
//! atomic per key. Callers stay unchanged if fetching ever becomes concurrent.
//!
//! [`IndexStore`] persists the index as `index.json` in the output directory.

mod error;
mod store;

use std::fmt;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

pub use error::IndexError;
pub use store::{INDEX_FILENAME, IndexStore, hash_file, rebuild_from_dir};

/// Lowercase hex SHA-256 digest of a file's full byte content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hex length of a SHA-256 digest.
    pub const HEX_LEN: usize = 64;

    /// Wraps a finalized SHA-256 digest.
    #[must_use]
    pub fn from_digest(digest: impl AsRef<[u8]>) -> Self {
        Self(hex::encode(digest))
    }

    /// Hashes an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(bytes))
    }

    /// Parses a 64-character hex digest (any case).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        (value.len() == Self::HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| Self(value.to_ascii_lowercase()))
    }

    /// The full hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, used for generated file names.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a SHA-256 hex digest: {value}"))
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// A stored download. Created once per unique content, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// Digest of the stored bytes.
    pub hash: ContentHash,
    /// File name inside the output directory.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// URL the content was first fetched from, when known.
    pub url: Option<String>,
    /// Content type the server declared, when known.
    pub content_type: Option<String>,
    /// Unix timestamp (seconds) when the record was created.
    pub saved_at: u64,
}

impl ContentRecord {
    /// Creates a record stamped with the current time and no provenance.
    #[must_use]
    pub fn new(hash: ContentHash, filename: impl Into<String>, size: u64) -> Self {
        Self {
            hash,
            filename: filename.into(),
            size,
            url: None,
            content_type: None,
            saved_at: unix_now(),
        }
    }

    /// Attaches the source URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attaches the declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Result of [`DuplicateIndex::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The hash was new; the given record is now stored.
    Inserted(ContentRecord),
    /// The hash was already present; the stored record is returned unchanged.
    AlreadyExists(ContentRecord),
}

impl InsertOutcome {
    /// The record now associated with the hash.
    #[must_use]
    pub fn record(&self) -> &ContentRecord {
        match self {
            Self::Inserted(record) | Self::AlreadyExists(record) => record,
        }
    }

    /// True when this call stored a new record.
    #[must_use]
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Hash → record map with idempotent insert.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    records: DashMap<ContentHash, ContentRecord>,
}

impl DuplicateIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record stored for `hash`, if any.
    #[must_use]
    pub fn lookup(&self, hash: &ContentHash) -> Option<ContentRecord> {
        self.records.get(hash).map(|entry| entry.value().clone())
    }

    /// Stores `record` under `hash` unless the hash is already present.
    ///
    /// Existing records are never replaced; the second insert of a hash reports
    /// [`InsertOutcome::AlreadyExists`] with the first record.
    pub fn insert(&self, hash: ContentHash, record: ContentRecord) -> InsertOutcome {
        debug_assert_eq!(hash, record.hash, "record hash must match its key");
        match self.records.entry(hash) {
            Entry::Occupied(existing) => {
                debug!(hash = %existing.key(), filename = %existing.get().filename, "hash already indexed");
                InsertOutcome::AlreadyExists(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                InsertOutcome::Inserted(record)
            }
        }
    }

    /// Drops a record this process inserted but could not back with a file.
    pub(crate) fn discard(&self, hash: &ContentHash) {
        self.records.remove(hash);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of all records, ordered by hash.
    #[must_use]
    pub fn records(&self) -> Vec<ContentRecord> {
        let mut records: Vec<ContentRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.hash.cmp(&b.hash));
        records
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
