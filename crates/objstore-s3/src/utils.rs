//! Shared utilities for the storage engine.
//!
//! Provides ID generation, timestamp formatting, and range-header parsing.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::{S3ServiceError, S3ServiceResult};

/// `strftime` pattern of an RFC 1123 HTTP date.
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// `strftime` pattern of the ISO 8601 form used in listings.
const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

// ---------------------------------------------------------------------------
// ID generation
// ---------------------------------------------------------------------------

/// Generate a random version ID for versioned objects and delete markers.
///
/// # Examples
///
/// ```
/// use objstore_s3::utils::generate_version_id;
///
/// let id = generate_version_id();
/// assert_eq!(id.len(), 22);
/// assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
/// ```
#[must_use]
pub fn generate_version_id() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

/// Generate a random upload ID for multipart uploads.
///
/// # Examples
///
/// ```
/// use objstore_s3::utils::generate_upload_id;
///
/// let id = generate_upload_id();
/// assert_eq!(id.len(), 32);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[must_use]
pub fn generate_upload_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Format a timestamp as an RFC 1123 HTTP date, e.g.
/// `Tue, 15 Nov 1994 08:12:31 GMT`.
#[must_use]
pub fn rfc1123(ts: DateTime<Utc>) -> String {
    ts.format(RFC1123_FORMAT).to_string()
}

/// Parse an RFC 1123 HTTP date, as sent in an `Expires` header.
#[must_use]
pub fn parse_rfc1123(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), RFC1123_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as ISO 8601 with the millisecond field zeroed.
#[must_use]
pub fn iso8601_without_millis(ts: DateTime<Utc>) -> String {
    ts.format(ISO8601_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Range header parsing
// ---------------------------------------------------------------------------

/// A satisfiable byte range within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedRange {
    /// First byte offset (inclusive).
    pub begin: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
    /// Number of bytes in the range.
    pub content_length: u64,
}

impl ParsedRange {
    /// `Content-Range` header value for a response carrying this range.
    #[must_use]
    pub fn content_range(&self, object_size: u64) -> String {
        format!("bytes {}-{}/{object_size}", self.begin, self.end)
    }

    fn new(begin: u64, end: u64) -> Self {
        Self {
            begin,
            end,
            content_length: end - begin + 1,
        }
    }
}

/// Parse an HTTP `Range` header value against an object of `object_size` bytes.
///
/// Supported formats:
/// - `bytes=0-499` -- first 500 bytes (the end is clamped to the object)
/// - `bytes=-500` -- last 500 bytes (clamped to the whole object)
/// - `bytes=500-` -- from byte 500 to the end
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidRange`] if the header is malformed or
/// the range starts past the end of the object.
///
/// # Examples
///
/// ```
/// use objstore_s3::utils::parse_range_header;
///
/// let range = parse_range_header("bytes=0-499", 1000).unwrap();
/// assert_eq!((range.begin, range.end, range.content_length), (0, 499, 500));
/// ```
pub fn parse_range_header(range: &str, object_size: u64) -> S3ServiceResult<ParsedRange> {
    let range = range
        .trim()
        .strip_prefix("bytes=")
        .ok_or(S3ServiceError::InvalidRange)?;
    let (first, last) = range.split_once('-').ok_or(S3ServiceError::InvalidRange)?;
    let parse = |s: &str| s.trim().parse::<u64>().map_err(|_| S3ServiceError::InvalidRange);

    if object_size == 0 {
        return Err(S3ServiceError::InvalidRange);
    }

    match (first.trim().is_empty(), last.trim().is_empty()) {
        // bytes=-N  (last N bytes)
        (true, false) => {
            let n = parse(last)?;
            if n == 0 {
                return Err(S3ServiceError::InvalidRange);
            }
            Ok(ParsedRange::new(object_size.saturating_sub(n), object_size - 1))
        }
        // bytes=N-  (from N to end)
        (false, true) => {
            let begin = parse(first)?;
            if begin >= object_size {
                return Err(S3ServiceError::InvalidRange);
            }
            Ok(ParsedRange::new(begin, object_size - 1))
        }
        // bytes=N-M
        (false, false) => {
            let begin = parse(first)?;
            let end = parse(last)?;
            if begin > end || begin >= object_size {
                return Err(S3ServiceError::InvalidRange);
            }
            Ok(ParsedRange::new(begin, end.min(object_size - 1)))
        }
        (true, true) => Err(S3ServiceError::InvalidRange),
    }
}

/// Strip surrounding double quotes from an ETag.
#[must_use]
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}
