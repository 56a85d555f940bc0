//! One-URL fetch pipeline: request, validate, stream-and-hash, dedup, store.
//!
//! [`Fetcher::fetch`] never fails for a bad URL. Transport problems, rejected
//! headers, oversize bodies, and duplicates all come back as a
//! [`FetchOutcome`]. Only [`StorageError`] escapes, because a failure to write
//! inside the output directory would repeat for every later URL.

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, parse_fetch_url};
use super::constants::WRITE_BUFFER_BYTES;
use super::error::{DownloadError, StorageError};
use super::filename::{choose_filename, resolve_unique_path, temp_path_for};
use super::validator::{ContentValidator, RejectReason, ResponseMetadata, Validation};
use crate::config::FetchConfig;
use crate::index::{ContentHash, ContentRecord, DuplicateIndex, InsertOutcome};

/// What happened to one URL.
#[derive(Debug)]
pub enum FetchOutcome {
    /// New content written to `path`.
    Saved {
        /// Final location inside the output directory.
        path: PathBuf,
        /// Bytes written.
        size: u64,
        /// Digest of the written bytes.
        hash: ContentHash,
    },
    /// Content already stored; carries the existing record.
    Duplicate(ContentRecord),
    /// Headers or body failed validation; nothing was kept.
    Rejected(RejectReason),
    /// Request could not be completed.
    NetworkError(String),
}

impl FetchOutcome {
    /// Short label for summaries.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Saved { .. } => "saved",
            Self::Duplicate(_) => "duplicate",
            Self::Rejected(_) => "rejected",
            Self::NetworkError(_) => "network error",
        }
    }
}

/// Per-run state shared by every fetch: where files go and what is stored.
#[derive(Debug)]
pub struct FetchContext {
    output_dir: PathBuf,
    index: DuplicateIndex,
}

impl FetchContext {
    /// Creates a context over an existing output directory and loaded index.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, index: DuplicateIndex) -> Self {
        Self {
            output_dir: output_dir.into(),
            index,
        }
    }

    /// Directory receiving downloads.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The duplicate index.
    #[must_use]
    pub fn index(&self) -> &DuplicateIndex {
        &self.index
    }

    /// Consumes the context, returning the index for persistence.
    #[must_use]
    pub fn into_index(self) -> DuplicateIndex {
        self.index
    }
}

/// Creates the output directory (and parents) if missing.
///
/// # Errors
///
/// Returns [`StorageError`] if the directory cannot be created.
pub async fn ensure_output_dir(dir: &Path) -> Result<(), StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))
}

/// Fetches URLs one at a time into a [`FetchContext`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: HttpClient,
    validator: ContentValidator,
}

impl Fetcher {
    /// Creates a fetcher from a client and validator.
    #[must_use]
    pub fn new(client: HttpClient, validator: ContentValidator) -> Self {
        Self { client, validator }
    }

    /// Builds the client and validator described by `config`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be created.
    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = HttpClient::with_timeout(config.timeout)?;
        let validator = ContentValidator::new(config.allowed_types.clone(), config.max_bytes);
        Ok(Self::new(client, validator))
    }

    /// Downloads one URL into the context's output directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] only when the output directory cannot be
    /// written. Every per-URL problem is reported through [`FetchOutcome`].
    #[instrument(skip(self, ctx), fields(url = %url))]
    pub async fn fetch(&self, ctx: &FetchContext, url: &str) -> Result<FetchOutcome, StorageError> {
        let parsed_url = match parse_fetch_url(url) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(FetchOutcome::NetworkError(e.to_string())),
        };

        let response = match self.client.get_url(parsed_url.clone()).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "request failed");
                return Ok(FetchOutcome::NetworkError(e.to_string()));
            }
        };

        let metadata = ResponseMetadata::from_response(&response);
        let kind = match self.validator.validate(&metadata) {
            Validation::Accept(kind) => kind,
            Validation::Reject(reason) => {
                debug!(reason = %reason, "response rejected on headers");
                return Ok(FetchOutcome::Rejected(reason));
            }
        };

        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let temp_path = temp_path_for(ctx.output_dir(), &parsed_url);
        let streamed = stream_to_temp(
            response.bytes_stream(),
            &temp_path,
            self.validator.max_bytes(),
            url,
        )
        .await;

        let streamed = match streamed {
            Ok(streamed) => streamed,
            Err(failure) => return self.settle_stream_failure(failure, &temp_path).await,
        };

        let filename = choose_filename(
            content_disposition.as_deref(),
            &parsed_url,
            &streamed.hash,
            kind,
        );
        let final_path = resolve_unique_path(ctx.output_dir(), &filename);
        let final_name = final_path
            .file_name()
            .map_or_else(|| filename.clone(), |n| n.to_string_lossy().into_owned());

        let candidate = ContentRecord::new(streamed.hash.clone(), final_name, streamed.size)
            .with_url(url)
            .with_content_type(kind.mime());

        match ctx.index().insert(streamed.hash.clone(), candidate) {
            InsertOutcome::AlreadyExists(existing) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                info!(existing = %existing.filename, "duplicate content, not saved");
                Ok(FetchOutcome::Duplicate(existing))
            }
            InsertOutcome::Inserted(record) => {
                if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
                    warn!(path = %final_path.display(), error = %e, "failed to move download into place");
                    ctx.index().discard(&record.hash);
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(StorageError::io(final_path, e));
                }
                info!(path = %final_path.display(), bytes = record.size, "image saved");
                Ok(FetchOutcome::Saved {
                    path: final_path,
                    size: record.size,
                    hash: record.hash,
                })
            }
        }
    }
}

impl Fetcher {
    /// Removes the partial temp file and maps the failure to an outcome.
    pub(crate) async fn settle_stream_failure(
        &self,
        failure: StreamFailure,
        temp_path: &Path,
    ) -> Result<FetchOutcome, StorageError> {
        debug!(path = %temp_path.display(), "removing partial file after failed stream");
        let _ = tokio::fs::remove_file(temp_path).await;
        match failure {
            StreamFailure::TooLarge { observed } => Ok(FetchOutcome::Rejected(RejectReason::TooLarge {
                limit: self.validator.max_bytes(),
                observed,
            })),
            StreamFailure::Network(e) => Ok(FetchOutcome::NetworkError(e.to_string())),
            StreamFailure::Storage(e) => Err(e),
        }
    }
}

/// Body written to a temp file, with its digest.
#[derive(Debug)]
pub(crate) struct Streamed {
    pub(crate) hash: ContentHash,
    pub(crate) size: u64,
}

/// Why streaming stopped early.
#[derive(Debug)]
pub(crate) enum StreamFailure {
    TooLarge { observed: u64 },
    Network(DownloadError),
    Storage(StorageError),
}

/// Streams a body into `temp_path`, hashing and counting every chunk.
///
/// Stops before writing the chunk that would take the total past `max_bytes`.
/// The caller removes `temp_path` on failure.
pub(crate) async fn stream_to_temp<S, B>(
    stream: S,
    temp_path: &Path,
    max_bytes: u64,
    url: &str,
) -> Result<Streamed, StreamFailure>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    let file = File::create(temp_path)
        .await
        .map_err(|e| StreamFailure::Storage(StorageError::io(temp_path, e)))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    let mut stream = std::pin::pin!(stream);
    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| StreamFailure::Network(DownloadError::network(url, e)))?;
        let bytes = chunk.as_ref();

        let observed = size + bytes.len() as u64;
        if observed > max_bytes {
            return Err(StreamFailure::TooLarge { observed });
        }

        writer
            .write_all(bytes)
            .await
            .map_err(|e| StreamFailure::Storage(StorageError::io(temp_path, e)))?;
        hasher.update(bytes);
        size = observed;
    }

    writer
        .flush()
        .await
        .map_err(|e| StreamFailure::Storage(StorageError::io(temp_path, e)))?;

    Ok(Streamed {
        hash: ContentHash::from_digest(hasher.finalize()),
        size,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::ImageType;
    use futures_util::stream;
    use tempfile::TempDir;

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, reqwest::Error>> {
        stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_stream_hashes_all_chunks_incrementally() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join(".x.part");

        let streamed = stream_to_temp(
            chunks(vec![b"hello ".to_vec(), b"image ".to_vec(), b"bytes".to_vec()]),
            &temp_path,
            1024,
            "https://example.com/x.png",
        )
        .await
        .unwrap();

        assert_eq!(streamed.size, 17);
        assert_eq!(streamed.hash, ContentHash::of_bytes(b"hello image bytes"));
        assert_eq!(std::fs::read(&temp_path).unwrap(), b"hello image bytes");
    }

    #[tokio::test]
    async fn test_stream_aborts_when_crossing_ceiling() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join(".x.part");

        let result = stream_to_temp(
            chunks(vec![vec![0u8; 6], vec![0u8; 6]]),
            &temp_path,
            10,
            "https://example.com/x.png",
        )
        .await;

        match result {
            Err(StreamFailure::TooLarge { observed }) => assert_eq!(observed, 12),
            other => panic!("expected TooLarge, got {other:?}"),
        }
        let written = std::fs::metadata(&temp_path).map(|m| m.len()).unwrap_or(0);
        assert!(written <= 10, "never writes past the ceiling, wrote {written}");
    }

    #[tokio::test]
    async fn test_stream_exactly_at_ceiling_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join(".x.part");

        let streamed = stream_to_temp(chunks(vec![vec![1u8; 5], vec![2u8; 5]]), &temp_path, 10, "u")
            .await
            .unwrap();
        assert_eq!(streamed.size, 10);
    }

    #[tokio::test]
    async fn test_stream_empty_body_hashes_to_empty_digest() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join(".x.part");

        let streamed = stream_to_temp(chunks(Vec::new()), &temp_path, 10, "u").await.unwrap();
        assert_eq!(streamed.size, 0);
        assert_eq!(streamed.hash, ContentHash::of_bytes(b""));
    }

    #[tokio::test]
    async fn test_stream_into_missing_directory_is_storage_failure() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join("absent").join(".x.part");

        let result = stream_to_temp(chunks(vec![b"x".to_vec()]), &temp_path, 10, "u").await;
        assert!(matches!(result, Err(StreamFailure::Storage(_))));
    }

    async fn transport_error() -> reqwest::Error {
        reqwest::Client::new()
            .get("http://127.0.0.1:1/closed.png")
            .send()
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_stream_error_after_first_chunk_is_network_failure() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join(".x.part");
        let items: Vec<Result<Vec<u8>, reqwest::Error>> =
            vec![Ok(b"partial".to_vec()), Err(transport_error().await)];

        let result = stream_to_temp(stream::iter(items), &temp_path, 1024, "u").await;
        let Err(failure) = result else {
            panic!("expected a stream failure");
        };
        assert!(matches!(failure, StreamFailure::Network(_)), "got {failure:?}");
        assert!(temp_path.exists(), "temp file is left for the caller to remove");

        let fetcher = Fetcher::new(HttpClient::new(), ContentValidator::default());
        let outcome = fetcher.settle_stream_failure(failure, &temp_path).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::NetworkError(_)), "got {outcome:?}");
        assert!(!temp_path.exists(), "partial file must be removed");
    }

    #[tokio::test]
    async fn test_settle_too_large_reports_limit_and_removes_temp() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join(".x.part");
        std::fs::write(&temp_path, b"0123456789").unwrap();

        let fetcher = Fetcher::new(HttpClient::new(), ContentValidator::new(ImageType::ALL, 10));
        let outcome = fetcher
            .settle_stream_failure(StreamFailure::TooLarge { observed: 12 }, &temp_path)
            .await
            .unwrap();
        match outcome {
            FetchOutcome::Rejected(RejectReason::TooLarge { limit, observed }) => {
                assert_eq!((limit, observed), (10, 12));
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_network_error_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = FetchContext::new(temp_dir.path(), DuplicateIndex::new());
        let fetcher = Fetcher::new(HttpClient::new(), ContentValidator::default());

        let outcome = fetcher.fetch(&ctx, "not a url").await.unwrap();
        assert!(matches!(outcome, FetchOutcome::NetworkError(_)));
        assert_eq!(outcome.label(), "network error");
    }

    #[tokio::test]
    async fn test_ensure_output_dir_creates_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        ensure_output_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
