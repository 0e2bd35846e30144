//! Ingestion of request bodies into an [`ObjectValue`].
//!
//! Three sources are supported:
//!
//! * a plain byte stream,
//! * an `aws-chunked` stream whose trailers may carry the checksum,
//! * an already assembled multipart value with its composite ETag.
//!
//! The first two are hashed block by block while they are written: MD5 for
//! the ETag plus the requested integrity checksum. A failed ingestion leaves
//! the value empty.

use std::fmt;
use std::io::{BufRead, Read};

use anyhow::Context;
use tracing::{debug, warn};

use crate::S3_CHUNK_SIZE;
use crate::checksums::{ChecksumAlgorithm, StreamingHasher};
use crate::chunked::decode_chunked;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::value::ObjectValue;

/// Where an object's body comes from.
pub enum IngestSource<'a> {
    /// Raw body bytes.
    Stream(&'a mut dyn Read),
    /// `aws-chunked` framed body.
    Chunked {
        /// The framed stream.
        reader: &'a mut dyn BufRead,
        /// Value of `x-amz-decoded-content-length`.
        decoded_content_length: u64,
    },
    /// Value assembled from uploaded parts.
    Multipart {
        /// The concatenated parts.
        value: ObjectValue,
        /// Composite ETag, stored verbatim.
        etag: String,
    },
}

impl fmt::Debug for IngestSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream"),
            Self::Chunked {
                decoded_content_length,
                ..
            } => f
                .debug_struct("Chunked")
                .field("decoded_content_length", decoded_content_length)
                .finish_non_exhaustive(),
            Self::Multipart { etag, .. } => f
                .debug_struct("Multipart")
                .field("etag", etag)
                .finish_non_exhaustive(),
        }
    }
}

/// Derived fields of a successfully ingested body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Unquoted ETag.
    pub etag: String,
    /// Body size in bytes.
    pub size: u64,
    /// Base64 integrity checksum, when one was requested or declared.
    pub checksum_value: Option<String>,
}

/// Fill `value` from `source`.
///
/// `declared_checksum` is the checksum the client sent as a header; for a
/// chunked body a matching `x-amz-checksum-*` trailer takes precedence. On
/// success the cursor of `value` is at offset 0.
///
/// # Errors
///
/// * [`S3ServiceError::UnsupportedChecksum`] when a checksum is declared
///   without an algorithm.
/// * [`S3ServiceError::ChecksumMismatch`] when the declared checksum differs
///   from the computed one.
/// * Any decoding error from [`decode_chunked`].
pub fn ingest(
    value: &mut ObjectValue,
    algorithm: Option<ChecksumAlgorithm>,
    declared_checksum: Option<&str>,
    source: IngestSource<'_>,
) -> S3ServiceResult<IngestOutcome> {
    if declared_checksum.is_some() && algorithm.is_none() {
        return Err(S3ServiceError::UnsupportedChecksum {
            algorithm: String::new(),
        });
    }

    value.truncate_and_rewind()?;
    let result = match source {
        IngestSource::Stream(reader) => {
            ingest_hashed(value, algorithm, declared_checksum, |value, hasher| {
                copy_stream(reader, value, hasher)?;
                Ok(None)
            })
        }
        IngestSource::Chunked {
            reader,
            decoded_content_length,
        } => ingest_hashed(value, algorithm, declared_checksum, |value, hasher| {
            let trailers = decode_chunked(reader, decoded_content_length, |block| {
                value.write(block)?;
                hasher.update(block);
                Ok(())
            })?;
            Ok(algorithm
                .and_then(|alg| trailers.get(&alg.header_name()))
                .map(str::to_owned))
        }),
        IngestSource::Multipart { value: assembled, etag } => {
            *value = assembled;
            value.seek(0)?;
            return Ok(IngestOutcome {
                etag,
                size: value.size()?,
                checksum_value: declared_checksum.map(str::to_owned),
            });
        }
    };

    if result.is_err() {
        if let Err(e) = value.truncate_and_rewind() {
            warn!(error = %e, "failed to discard rejected object value");
        }
    }
    result
}

/// Run `fill` with a fresh hasher, then validate and finalize.
///
/// `fill` returns a checksum declared inside the body itself, which replaces
/// `declared_checksum`.
fn ingest_hashed<F>(
    value: &mut ObjectValue,
    algorithm: Option<ChecksumAlgorithm>,
    declared_checksum: Option<&str>,
    fill: F,
) -> S3ServiceResult<IngestOutcome>
where
    F: FnOnce(&mut ObjectValue, &mut StreamingHasher) -> S3ServiceResult<Option<String>>,
{
    let mut hasher = StreamingHasher::new(algorithm);
    let declared = fill(value, &mut hasher)?.or_else(|| declared_checksum.map(str::to_owned));

    let result = hasher.finish();
    if let (Some(expected), Some(algorithm)) = (declared.as_deref(), algorithm) {
        if result.checksum.as_deref() != Some(expected) {
            debug!(%algorithm, expected, "checksum mismatch");
            return Err(S3ServiceError::ChecksumMismatch { algorithm });
        }
    }

    let size = value.size()?;
    value.seek(0)?;
    Ok(IngestOutcome {
        etag: result.md5_hex,
        size,
        checksum_value: result.checksum,
    })
}

fn copy_stream(
    reader: &mut dyn Read,
    value: &mut ObjectValue,
    hasher: &mut StreamingHasher,
) -> S3ServiceResult<()> {
    let mut block = vec![0u8; S3_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut block)
            .context("failed to read object body")?;
        if n == 0 {
            return Ok(());
        }
        value.write(&block[..n])?;
        hasher.update(&block[..n]);
    }
}
