//! Checksum computation for object bodies.
//!
//! MD5 is always computed for the ETag. On top of it a body may carry one
//! additional integrity checksum from the `x-amz-checksum-*` family, which is
//! computed incrementally with a [`ChecksumHasher`] while the body streams in.
//! Integrity checksums are exposed base64-encoded; ETags are lowercase hex.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use digest::Digest;
use serde::{Deserialize, Serialize};

use crate::error::S3ServiceError;

// ---------------------------------------------------------------------------
// ChecksumAlgorithm
// ---------------------------------------------------------------------------

/// Supported integrity checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChecksumAlgorithm {
    /// CRC-32 (IEEE 802.3).
    Crc32,
    /// CRC-32C (Castagnoli).
    Crc32c,
    /// SHA-1.
    Sha1,
    /// SHA-256.
    Sha256,
}

impl ChecksumAlgorithm {
    /// Return the canonical string representation used in S3 headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Crc32c => "CRC32C",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Name of the header (or chunked trailer) carrying this checksum.
    #[must_use]
    pub fn header_name(&self) -> String {
        format!("x-amz-checksum-{}", self.as_str().to_ascii_lowercase())
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = S3ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRC32" => Ok(Self::Crc32),
            "CRC32C" => Ok(Self::Crc32c),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            _ => Err(S3ServiceError::UnsupportedChecksum {
                algorithm: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ChecksumHasher
// ---------------------------------------------------------------------------

/// Incremental hasher for one [`ChecksumAlgorithm`].
///
/// The CRC variants roll: each update continues from the previous value
/// instead of starting over.
#[derive(Debug, Clone)]
pub enum ChecksumHasher {
    /// CRC-32 state.
    Crc32(crc32fast::Hasher),
    /// Running CRC-32C value.
    Crc32c(u32),
    /// SHA-1 state.
    Sha1(sha1::Sha1),
    /// SHA-256 state.
    Sha256(sha2::Sha256),
}

impl ChecksumHasher {
    /// Create a fresh hasher for `algorithm`.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            ChecksumAlgorithm::Crc32c => Self::Crc32c(0),
            ChecksumAlgorithm::Sha1 => Self::Sha1(<sha1::Sha1 as Digest>::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(<sha2::Sha256 as Digest>::new()),
        }
    }

    /// The algorithm this hasher computes.
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        match self {
            Self::Crc32(_) => ChecksumAlgorithm::Crc32,
            Self::Crc32c(_) => ChecksumAlgorithm::Crc32c,
            Self::Sha1(_) => ChecksumAlgorithm::Sha1,
            Self::Sha256(_) => ChecksumAlgorithm::Sha256,
        }
    }

    /// Feed more data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Crc32(h) => h.update(data),
            Self::Crc32c(value) => *value = crc32c::crc32c_append(*value, data),
            Self::Sha1(h) => Digest::update(h, data),
            Self::Sha256(h) => Digest::update(h, data),
        }
    }

    /// Consume the hasher and return the raw digest bytes.
    ///
    /// CRCs are returned big-endian, as they appear on the wire.
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            Self::Crc32c(value) => value.to_be_bytes().to_vec(),
            Self::Sha1(h) => Digest::finalize(h).to_vec(),
            Self::Sha256(h) => Digest::finalize(h).to_vec(),
        }
    }

    /// Consume the hasher and return the base64-encoded digest.
    #[must_use]
    pub fn finalize_base64(self) -> String {
        BASE64_STANDARD.encode(self.finalize())
    }
}

// ---------------------------------------------------------------------------
// Standalone checksum functions
// ---------------------------------------------------------------------------

/// Compute the hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// use objstore_s3::checksums::compute_md5;
///
/// assert_eq!(compute_md5(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    hex::encode(md5::Md5::digest(data))
}

/// Compute a base64-encoded checksum of a complete buffer.
///
/// # Examples
///
/// ```
/// use objstore_s3::checksums::{ChecksumAlgorithm, compute_checksum};
///
/// let b64 = compute_checksum(ChecksumAlgorithm::Sha256, b"hello");
/// assert_eq!(b64, "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=");
/// ```
#[must_use]
pub fn compute_checksum(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    let mut hasher = ChecksumHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_base64()
}

/// Compute the composite ETag of a multipart object.
///
/// The composite ETag is the MD5 of the concatenated binary MD5 digests of
/// each part, suffixed with the part count: `<hex>-<count>`. Entries may be
/// quoted or unquoted hex. The result is unquoted.
///
/// # Examples
///
/// ```
/// use objstore_s3::checksums::compute_multipart_etag;
///
/// let etag = compute_multipart_etag(&["5d41402abc4b2a76b9719d911017c592"]);
/// assert!(etag.ends_with("-1"));
/// ```
#[must_use]
pub fn compute_multipart_etag(part_md5_hexes: &[impl AsRef<str>]) -> String {
    let mut combined = Vec::with_capacity(part_md5_hexes.len() * 16);
    for hex_str in part_md5_hexes {
        let hex_str = hex_str.as_ref().trim_matches('"');
        if let Ok(bytes) = hex::decode(hex_str) {
            combined.extend_from_slice(&bytes);
        }
    }
    let final_md5 = hex::encode(md5::Md5::digest(&combined));
    format!("{final_md5}-{}", part_md5_hexes.len())
}

/// Compute the composite checksum of a multipart object.
///
/// The raw checksums of the parts are concatenated and hashed again; the
/// base64 result carries a `-<count>` suffix.
#[must_use]
pub fn compute_composite_checksum(
    algorithm: ChecksumAlgorithm,
    part_checksums_b64: &[impl AsRef<str>],
) -> String {
    let mut hasher = ChecksumHasher::new(algorithm);
    for b64 in part_checksums_b64 {
        if let Ok(bytes) = BASE64_STANDARD.decode(b64.as_ref()) {
            hasher.update(&bytes);
        }
    }
    format!("{}-{}", hasher.finalize_base64(), part_checksums_b64.len())
}

// ---------------------------------------------------------------------------
// StreamingHasher
// ---------------------------------------------------------------------------

/// Result produced by [`StreamingHasher::finish`].
#[derive(Debug, Clone)]
pub struct HasherResult {
    /// Hex-encoded MD5 digest.
    pub md5_hex: String,
    /// Base64 checksum, present when an algorithm was requested.
    pub checksum: Option<String>,
}

/// MD5 plus an optional integrity checksum over a stream of blocks.
///
/// # Examples
///
/// ```
/// use objstore_s3::checksums::{ChecksumAlgorithm, StreamingHasher};
///
/// let mut hasher = StreamingHasher::new(Some(ChecksumAlgorithm::Crc32));
/// hasher.update(b"hel");
/// hasher.update(b"lo");
/// let result = hasher.finish();
/// assert_eq!(result.md5_hex, "5d41402abc4b2a76b9719d911017c592");
/// assert!(result.checksum.is_some());
/// ```
#[derive(Debug)]
pub struct StreamingHasher {
    md5: md5::Md5,
    checksum: Option<ChecksumHasher>,
}

impl StreamingHasher {
    /// Create a hasher, adding `algorithm` on top of the MD5 when given.
    #[must_use]
    pub fn new(algorithm: Option<ChecksumAlgorithm>) -> Self {
        Self {
            md5: <md5::Md5 as Digest>::new(),
            checksum: algorithm.map(ChecksumHasher::new),
        }
    }

    /// Feed more data into every running digest.
    pub fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.md5, data);
        if let Some(h) = self.checksum.as_mut() {
            h.update(data);
        }
    }

    /// Finalize the hasher and return the results.
    #[must_use]
    pub fn finish(self) -> HasherResult {
        HasherResult {
            md5_hex: hex::encode(Digest::finalize(self.md5)),
            checksum: self.checksum.map(ChecksumHasher::finalize_base64),
        }
    }
}
