//! `index.json` persistence and directory re-hashing.
//!
//! The sidecar is a JSON object keyed by hex digest:
//!
//! ```json
//! {
//!   "e3b0c4...": {
//!     "filename": "cat.png",
//!     "url": "https://example.com/cat.png",
//!     "content_type": "image/png",
//!     "size": 1024,
//!     "timestamp": 1760000000
//!   }
//! }
//! ```
//!
//! Writes go to a temp file that is renamed over the old index.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::error::IndexError;
use super::{ContentHash, ContentRecord, DuplicateIndex};
use crate::download::is_temp_or_hidden;

/// File name of the index sidecar inside the output directory.
pub const INDEX_FILENAME: &str = "index.json";

const HASH_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    filename: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    size: u64,
    #[serde(default)]
    timestamp: u64,
}

impl IndexEntry {
    fn into_record(self, hash: ContentHash) -> ContentRecord {
        ContentRecord {
            hash,
            filename: self.filename,
            size: self.size,
            url: self.url,
            content_type: self.content_type,
            saved_at: self.timestamp,
        }
    }
}

impl From<&ContentRecord> for IndexEntry {
    fn from(record: &ContentRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            url: record.url.clone(),
            content_type: record.content_type.clone(),
            size: record.size,
            timestamp: record.saved_at,
        }
    }
}

/// Reads and writes the index sidecar for one output directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
    path: PathBuf,
}

impl IndexStore {
    /// Store for `<dir>/index.json`.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(INDEX_FILENAME);
        Self { dir, path }
    }

    /// Path of the sidecar file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the sidecar. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the file cannot be read and
    /// [`IndexError::Corrupt`] if it is not a valid index.
    pub fn load(&self) -> Result<Option<DuplicateIndex>, IndexError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::io(&self.path, e)),
        };

        let entries: BTreeMap<ContentHash, IndexEntry> =
            serde_json::from_slice(&raw).map_err(|e| IndexError::corrupt(&self.path, e))?;

        let index = DuplicateIndex::new();
        for (hash, entry) in entries {
            index.insert(hash.clone(), entry.into_record(hash));
        }
        debug!(path = %self.path.display(), records = index.len(), "index loaded");
        Ok(Some(index))
    }

    /// Loads the sidecar, or re-hashes the directory when it is missing or corrupt.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] when the sidecar or directory cannot be read.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load_or_rebuild(&self) -> Result<DuplicateIndex, IndexError> {
        match self.load() {
            Ok(Some(index)) => Ok(index),
            Ok(None) => {
                debug!("no index file, re-hashing output directory");
                rebuild_from_dir(&self.dir)
            }
            Err(IndexError::Corrupt { path, source }) => {
                warn!(path = %path.display(), error = %source, "index file is corrupt, re-hashing output directory");
                rebuild_from_dir(&self.dir)
            }
            Err(other) => Err(other),
        }
    }

    /// Writes the index atomically (temp file, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the file cannot be written or renamed.
    pub fn save(&self, index: &DuplicateIndex) -> Result<(), IndexError> {
        let entries: BTreeMap<String, IndexEntry> = index
            .records()
            .iter()
            .map(|record| (record.hash.to_string(), IndexEntry::from(record)))
            .collect();
        let encoded =
            serde_json::to_vec_pretty(&entries).map_err(|source| IndexError::Encode { source })?;

        let tmp_path = self.dir.join(format!(".{INDEX_FILENAME}.tmp"));
        fs::write(&tmp_path, encoded).map_err(|e| IndexError::io(&tmp_path, e))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(IndexError::io(&self.path, e));
        }

        info!(path = %self.path.display(), records = index.len(), "index saved");
        Ok(())
    }
}

/// Builds an index by hashing every regular file in `dir`.
///
/// Hidden files, `.part` temp files, and the sidecar itself are skipped. When
/// two files hold the same bytes, the first one in name order is kept.
///
/// # Errors
///
/// Returns [`IndexError::Io`] if the directory or a file cannot be read. A
/// missing directory yields an empty index.
pub fn rebuild_from_dir(dir: &Path) -> Result<DuplicateIndex, IndexError> {
    let index = DuplicateIndex::new();

    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(index),
        Err(e) => return Err(IndexError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| IndexError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| IndexError::io(entry.path(), e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !file_type.is_file() || name == INDEX_FILENAME || is_temp_or_hidden(&name) {
            continue;
        }
        files.push(name);
    }
    files.sort();

    for name in files {
        let path = dir.join(&name);
        let (hash, size) = hash_file(&path)?;
        let record = ContentRecord::new(hash.clone(), name, size);
        index.insert(hash, record);
    }

    info!(dir = %dir.display(), records = index.len(), "index rebuilt from directory");
    Ok(index)
}

/// SHA-256 and size of a file, read in fixed-size chunks.
///
/// # Errors
///
/// Returns [`IndexError::Io`] if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<(ContentHash, u64), IndexError> {
    let file = File::open(path).map_err(|e| IndexError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    let mut size: u64 = 0;
    loop {
        let n = reader.read(&mut buf).map_err(|e| IndexError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((ContentHash::from_digest(hasher.finalize()), size))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(body: &[u8], name: &str) -> ContentRecord {
        ContentRecord::new(ContentHash::of_bytes(body), name, body.len() as u64)
            .with_url(format!("https://example.com/{name}"))
            .with_content_type("image/png")
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::in_dir(temp_dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_preserves_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::in_dir(temp_dir.path());
        let index = DuplicateIndex::new();
        let rec = record(b"cat bytes", "cat.png");
        index.insert(rec.hash.clone(), rec.clone());

        store.save(&index).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.lookup(&rec.hash), Some(rec));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::in_dir(temp_dir.path());
        store.save(&DuplicateIndex::new()).unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![INDEX_FILENAME.to_string()]);
    }

    #[test]
    fn test_load_accepts_entries_without_optional_fields() {
        let temp_dir = TempDir::new().unwrap();
        let hash = ContentHash::of_bytes(b"legacy");
        let raw = format!(r#"{{"{hash}": {{"filename": "old.jpg", "size": 6}}}}"#);
        fs::write(temp_dir.path().join(INDEX_FILENAME), raw).unwrap();

        let loaded = IndexStore::in_dir(temp_dir.path()).load().unwrap().unwrap();
        let rec = loaded.lookup(&hash).unwrap();
        assert_eq!(rec.filename, "old.jpg");
        assert!(rec.url.is_none());
    }

    #[test]
    fn test_load_rejects_invalid_hash_key() {
        let temp_dir = TempDir::new().unwrap();
        let raw = r#"{"not-a-hash": {"filename": "x.png", "size": 1}}"#;
        fs::write(temp_dir.path().join(INDEX_FILENAME), raw).unwrap();

        let result = IndexStore::in_dir(temp_dir.path()).load();
        assert!(matches!(result, Err(IndexError::Corrupt { .. })));
    }

    #[test]
    fn test_load_or_rebuild_rehashes_when_index_missing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.png"), b"alpha").unwrap();
        fs::write(temp_dir.path().join("b.png"), b"beta").unwrap();

        let index = IndexStore::in_dir(temp_dir.path()).load_or_rebuild().unwrap();

        assert_eq!(index.len(), 2);
        let rec = index.lookup(&ContentHash::of_bytes(b"alpha")).unwrap();
        assert_eq!(rec.filename, "a.png");
        assert_eq!(rec.size, 5);
    }

    #[test]
    fn test_load_or_rebuild_recovers_from_corrupt_index() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(INDEX_FILENAME), b"{ not json").unwrap();
        fs::write(temp_dir.path().join("a.png"), b"alpha").unwrap();

        let index = IndexStore::in_dir(temp_dir.path()).load_or_rebuild().unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rebuild_skips_hidden_and_partial_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".hidden.png"), b"h").unwrap();
        fs::write(temp_dir.path().join("half.png.part"), b"p").unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("kept.png"), b"k").unwrap();

        let index = rebuild_from_dir(temp_dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].filename, "kept.png");
    }

    #[test]
    fn test_rebuild_keeps_first_name_for_identical_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.png"), b"same").unwrap();
        fs::write(temp_dir.path().join("a.png"), b"same").unwrap();

        let index = rebuild_from_dir(temp_dir.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].filename, "a.png");
    }

    #[test]
    fn test_rebuild_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let index = rebuild_from_dir(&temp_dir.path().join("absent")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_hash_file_matches_in_memory_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob.bin");
        let body = vec![7u8; 200_000];
        fs::write(&path, &body).unwrap();

        let (hash, size) = hash_file(&path).unwrap();
        assert_eq!(hash, ContentHash::of_bytes(&body));
        assert_eq!(size, 200_000);
    }
}
