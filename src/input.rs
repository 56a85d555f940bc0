//! URL list parsing for arguments, URL files, piped stdin, and prompts.
//!
//! All sources share one format: URLs separated by commas or whitespace, one
//! or more per line, with blank lines and `#` comment lines ignored. Repeated
//! URLs are dropped, keeping the first occurrence so input order is preserved.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

/// Separators between URLs on one line.
#[allow(clippy::expect_used)]
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("separator regex is valid")); // Static pattern, safe to panic

/// Ordered, de-duplicated URLs gathered from input text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UrlList {
    urls: Vec<String>,
    duplicates: usize,
}

impl UrlList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `url` unless it is already present. Returns true if added.
    pub fn push(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.urls.contains(&url) {
            self.duplicates += 1;
            return false;
        }
        self.urls.push(url);
        true
    }

    /// Appends every URL from `other`, keeping de-duplication.
    pub fn extend(&mut self, other: UrlList) {
        self.duplicates += other.duplicates;
        for url in other.urls {
            self.push(url);
        }
    }

    /// URLs in input order.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Number of repeated URLs that were dropped.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Returns count of URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns true if no URLs were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl fmt::Display for UrlList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} URL(s) ({} repeated)",
            self.urls.len(),
            self.duplicates
        )
    }
}

impl IntoIterator for UrlList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.into_iter()
    }
}

/// Parses URL text into an ordered, de-duplicated list.
#[instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn parse_url_list(input: &str) -> UrlList {
    let mut list = UrlList::new();
    let mut seen = HashSet::new();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in SEPARATOR.split(line).filter(|t| !t.is_empty()) {
            if seen.insert(token.to_string()) {
                list.urls.push(token.to_string());
            } else {
                list.duplicates += 1;
            }
        }
    }

    debug!(urls = list.len(), duplicates = list.duplicates, "parsed URL list");
    list
}
