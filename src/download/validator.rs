//! Header-level acceptance checks run before any body bytes are written.
//!
//! [`ContentValidator`] looks only at [`ResponseMetadata`] (status, content type,
//! declared length) and returns a tagged [`Validation`]. The same size ceiling is
//! enforced again while streaming, since `Content-Length` may be absent.

use std::fmt;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

/// Image content types accepted for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
    Webp,
    Svg,
    Bmp,
    Tiff,
}

impl ImageType {
    /// Every recognized variant, in a stable order.
    pub const ALL: [ImageType; 7] = [
        Self::Jpeg,
        Self::Png,
        Self::Gif,
        Self::Webp,
        Self::Svg,
        Self::Bmp,
        Self::Tiff,
    ];

    /// Canonical MIME string for this type.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }

    /// File extension (with leading dot) used when a name has none.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
            Self::Webp => ".webp",
            Self::Svg => ".svg",
            Self::Bmp => ".bmp",
            Self::Tiff => ".tiff",
        }
    }

    /// Parses a `Content-Type` value, ignoring parameters and case.
    ///
    /// Returns `None` for anything that is not one of the recognized variants.
    #[must_use]
    pub fn from_content_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.mime().eq_ignore_ascii_case(essence))
    }

    /// Parses a user-facing name: a full MIME string or a short form such as
    /// `png`, `jpg`, or `svg`.
    #[must_use]
    pub fn from_name(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(kind) = Self::from_content_type(value) {
            return Some(kind);
        }
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "svg" | "svg+xml" => Some(Self::Svg),
            "bmp" => Some(Self::Bmp),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Response metadata the validator decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// HTTP status code.
    pub status_code: u16,
    /// Raw `Content-Type` header value, if present and valid UTF-8.
    pub content_type: Option<String>,
    /// Parsed `Content-Length`; malformed values are treated as absent.
    pub content_length: Option<u64>,
}

impl ResponseMetadata {
    /// Extracts metadata from a response without consuming its body.
    #[must_use]
    pub fn from_response(response: &reqwest::Response) -> Self {
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            status_code: response.status().as_u16(),
            content_type,
            content_length,
        }
    }
}

/// Category of a rejection, stable for display and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    HttpError,
    NotAnImage,
    TooLarge,
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpError => write!(f, "HTTP_ERROR"),
            Self::NotAnImage => write!(f, "NOT_AN_IMAGE"),
            Self::TooLarge => write!(f, "TOO_LARGE"),
        }
    }
}

/// Why a response was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Status code other than 200.
    HttpError {
        /// The status the server returned.
        status: u16,
    },
    /// Missing or non-allow-listed content type.
    NotAnImage {
        /// The content type the server declared, if any.
        content_type: Option<String>,
    },
    /// Declared or streamed size crossed the ceiling.
    TooLarge {
        /// Configured ceiling in bytes.
        limit: u64,
        /// Declared length, or bytes received when the stream was cut.
        observed: u64,
    },
}

impl RejectReason {
    /// Category of this rejection.
    #[must_use]
    pub fn kind(&self) -> RejectKind {
        match self {
            Self::HttpError { .. } => RejectKind::HttpError,
            Self::NotAnImage { .. } => RejectKind::NotAnImage,
            Self::TooLarge { .. } => RejectKind::TooLarge,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpError { status } => write!(f, "[{}] server returned HTTP {status}", self.kind()),
            Self::NotAnImage {
                content_type: Some(content_type),
            } => write!(
                f,
                "[{}] content type '{content_type}' is not an allowed image type",
                self.kind()
            ),
            Self::NotAnImage { content_type: None } => {
                write!(f, "[{}] response has no content type", self.kind())
            }
            Self::TooLarge { limit, observed } => write!(
                f,
                "[{}] {observed} bytes exceeds the {limit} byte limit",
                self.kind()
            ),
        }
    }
}

/// Outcome of validating response metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Download may proceed; carries the recognized image type.
    Accept(ImageType),
    /// Download must not proceed.
    Reject(RejectReason),
}

/// Pure accept/reject decision over response metadata.
#[derive(Debug, Clone)]
pub struct ContentValidator {
    allowed: Vec<ImageType>,
    max_bytes: u64,
}

impl ContentValidator {
    /// Creates a validator for the given allow-list and size ceiling.
    #[must_use]
    pub fn new(allowed: impl Into<Vec<ImageType>>, max_bytes: u64) -> Self {
        Self {
            allowed: allowed.into(),
            max_bytes,
        }
    }

    /// Size ceiling in bytes.
    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Returns true when `kind` is on the allow-list.
    #[must_use]
    pub fn allows(&self, kind: ImageType) -> bool {
        self.allowed.contains(&kind)
    }

    /// Decides whether a response may be downloaded.
    ///
    /// Checks run in order: status, content type, declared length.
    #[must_use]
    pub fn validate(&self, metadata: &ResponseMetadata) -> Validation {
        if metadata.status_code != 200 {
            return Validation::Reject(RejectReason::HttpError {
                status: metadata.status_code,
            });
        }

        let Some(kind) = metadata
            .content_type
            .as_deref()
            .and_then(ImageType::from_content_type)
            .filter(|kind| self.allows(*kind))
        else {
            return Validation::Reject(RejectReason::NotAnImage {
                content_type: metadata.content_type.clone(),
            });
        };

        if let Some(declared) = metadata.content_length
            && declared > self.max_bytes
        {
            return Validation::Reject(RejectReason::TooLarge {
                limit: self.max_bytes,
                observed: declared,
            });
        }

        Validation::Accept(kind)
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(ImageType::ALL, crate::config::DEFAULT_MAX_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(status: u16, content_type: Option<&str>, length: Option<u64>) -> ResponseMetadata {
        ResponseMetadata {
            status_code: status,
            content_type: content_type.map(str::to_string),
            content_length: length,
        }
    }

    #[test]
    fn test_image_type_from_name_accepts_mime_and_short_forms() {
        assert_eq!(ImageType::from_name("image/png"), Some(ImageType::Png));
        assert_eq!(ImageType::from_name("JPG"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_name(" svg "), Some(ImageType::Svg));
        assert_eq!(ImageType::from_name("tif"), Some(ImageType::Tiff));
        assert_eq!(ImageType::from_name("text/html"), None);
        assert_eq!(ImageType::from_name("avif"), None);
    }

    fn rejected_kind(result: &Validation) -> Option<RejectKind> {
        match result {
            Validation::Reject(reason) => Some(reason.kind()),
            Validation::Accept(_) => None,
        }
    }

    #[test]
    fn test_accepts_png_within_limit() {
        let validator = ContentValidator::default();
        let result = validator.validate(&meta(200, Some("image/png"), Some(1024)));
        assert_eq!(result, Validation::Accept(ImageType::Png));
    }

    #[test]
    fn test_non_200_rejected_regardless_of_content_type() {
        let validator = ContentValidator::default();
        for status in [201, 204, 301, 404, 500, 503] {
            for content_type in [Some("image/png"), Some("text/html"), None] {
                let result = validator.validate(&meta(status, content_type, Some(10)));
                assert_eq!(
                    result,
                    Validation::Reject(RejectReason::HttpError { status }),
                    "status {status} with {content_type:?}"
                );
            }
        }
    }

    #[test]
    fn test_html_rejected_as_not_an_image() {
        let validator = ContentValidator::default();
        let result = validator.validate(&meta(200, Some("text/html; charset=utf-8"), None));
        assert_eq!(rejected_kind(&result), Some(RejectKind::NotAnImage));
    }

    #[test]
    fn test_missing_content_type_rejected_as_not_an_image() {
        let validator = ContentValidator::default();
        let result = validator.validate(&meta(200, None, Some(5)));
        assert_eq!(
            result,
            Validation::Reject(RejectReason::NotAnImage { content_type: None })
        );
    }

    #[test]
    fn test_unlisted_image_subtype_rejected() {
        let validator = ContentValidator::default();
        let result = validator.validate(&meta(200, Some("image/x-icon"), None));
        assert_eq!(rejected_kind(&result), Some(RejectKind::NotAnImage));
    }

    #[test]
    fn test_type_outside_configured_allow_list_rejected() {
        let validator = ContentValidator::new(vec![ImageType::Png], 1024);
        let result = validator.validate(&meta(200, Some("image/jpeg"), None));
        assert_eq!(rejected_kind(&result), Some(RejectKind::NotAnImage));
    }

    #[test]
    fn test_content_type_match_ignores_case_and_parameters() {
        let validator = ContentValidator::default();
        let result = validator.validate(&meta(200, Some("Image/JPEG; q=0.9"), None));
        assert_eq!(result, Validation::Accept(ImageType::Jpeg));
    }

    #[test]
    fn test_declared_length_over_ceiling_rejected() {
        let validator = ContentValidator::default();
        let fifty_mib = 50 * 1024 * 1024;
        let result = validator.validate(&meta(200, Some("image/jpeg"), Some(fifty_mib)));
        assert_eq!(
            result,
            Validation::Reject(RejectReason::TooLarge {
                limit: 10 * 1024 * 1024,
                observed: fifty_mib,
            })
        );
    }

    #[test]
    fn test_declared_length_at_ceiling_accepted() {
        let validator = ContentValidator::new(ImageType::ALL, 100);
        let result = validator.validate(&meta(200, Some("image/gif"), Some(100)));
        assert_eq!(result, Validation::Accept(ImageType::Gif));
    }

    #[test]
    fn test_absent_length_passes_header_stage() {
        let validator = ContentValidator::new(ImageType::ALL, 1);
        let result = validator.validate(&meta(200, Some("image/webp"), None));
        assert_eq!(result, Validation::Accept(ImageType::Webp));
    }

    #[test]
    fn test_status_checked_before_length() {
        let validator = ContentValidator::new(ImageType::ALL, 1);
        let result = validator.validate(&meta(404, Some("image/png"), Some(1_000_000)));
        assert_eq!(rejected_kind(&result), Some(RejectKind::HttpError));
    }

    #[test]
    fn test_reject_reason_display_names_kind() {
        let reason = RejectReason::TooLarge {
            limit: 10,
            observed: 11,
        };
        let msg = reason.to_string();
        assert!(msg.starts_with("[TOO_LARGE]"), "got: {msg}");
        assert!(msg.contains("11"), "got: {msg}");
    }

    #[test]
    fn test_image_type_round_trips_through_mime() {
        for kind in ImageType::ALL {
            assert_eq!(ImageType::from_content_type(kind.mime()), Some(kind));
        }
    }
}
