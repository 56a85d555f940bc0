//! Filename derivation, sanitization, and collision handling for saved images.
//!
//! Name precedence: `Content-Disposition`, then the last URL path segment, then
//! a name built from the content digest. Names are reduced to
//! `[A-Za-z0-9._-]`, given an extension from the image type when missing, and
//! suffixed `_1`, `_2`, ... when the name is already taken on disk.

use std::path::{Path, PathBuf};

use url::Url;

use super::constants::{MAX_FILENAME_CHARS, TEMP_SUFFIX};
use super::validator::ImageType;
use crate::index::{ContentHash, INDEX_FILENAME};

/// Picks the preferred name for a download before collision handling.
///
/// `content_disposition` is the raw header value, if any.
#[must_use]
pub(crate) fn choose_filename(
    content_disposition: Option<&str>,
    url: &Url,
    hash: &ContentHash,
    kind: ImageType,
) -> String {
    let name = content_disposition
        .and_then(parse_content_disposition)
        .map(|raw| sanitize_filename(&raw))
        .filter(|name| !name.is_empty())
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| format!("image_{}", hash.short()));

    with_extension(name, kind)
}

/// Last non-empty URL path segment, percent-decoded and sanitized.
pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_filename(&decoded);
    (!sanitized.is_empty()).then_some(sanitized)
}

/// Appends the image type's extension when `name` has none.
fn with_extension(name: String, kind: ImageType) -> String {
    if has_extension(&name) {
        name
    } else {
        format!("{name}{}", kind.extension())
    }
}

fn has_extension(name: &str) -> bool {
    name.rfind('.')
        .is_some_and(|pos| pos > 0 && pos + 1 < name.len())
}

/// Parses Content-Disposition header to extract filename.
///
/// Handles both:
/// - `attachment; filename="example.png"`
/// - `attachment; filename=example.png`
/// - `attachment; filename*=UTF-8''example.png` (RFC 5987)
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    // Try filename*= first (RFC 5987 encoded)
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded_name) {
                return Some(decoded.into_owned());
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();

        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                return Some(stripped[..end].to_string());
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let filename = value[..end].trim();
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
    }

    None
}

/// Reduces a candidate name to a safe basename.
///
/// Keeps only the part after the last `/` or `\`, maps anything outside
/// `[A-Za-z0-9._-]` to `_`, collapses `_` runs, and caps the length. Returns an
/// empty string for names made only of dots and underscores.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let mut out = String::with_capacity(base.len());
    let mut prev_underscore = false;
    for ch in base.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-') {
            ch
        } else {
            '_'
        };
        if mapped == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(mapped);
            prev_underscore = false;
        }
    }

    // A leading dot would hide the file from the index scanner.
    let trimmed = out.trim_start_matches('.');
    if trimmed.chars().all(|c| matches!(c, '.' | '_')) {
        return String::new();
    }

    trimmed.chars().take(MAX_FILENAME_CHARS).collect()
}

/// Resolves a unique file path, adding numeric suffix if file exists.
///
/// Example: `cat.png`, then `cat_1.png`, `cat_2.png`, ...
///
/// The index sidecar name is always treated as taken, even before the
/// sidecar is first written.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let base_path = dir.join(filename);
    if !is_reserved(filename) && !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };

    for i in 1..10_000 {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    // Fallback (extremely unlikely)
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

fn is_reserved(filename: &str) -> bool {
    filename.eq_ignore_ascii_case(INDEX_FILENAME)
}

/// Hidden temp path used while a body is streaming.
pub(crate) fn temp_path_for(dir: &Path, url: &Url) -> PathBuf {
    let stem = filename_from_url(url).unwrap_or_else(|| "incoming".to_string());
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    dir.join(format!(".{stem}.{}-{nonce}{TEMP_SUFFIX}", std::process::id()))
}

/// Returns true for names the index scanner and collision logic must ignore.
pub(crate) fn is_temp_or_hidden(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(TEMP_SUFFIX)
}
