//! Scenario tests for the objstore engine.
//!
//! The tests drive `objstore-s3` through its public API only, the same way a
//! request layer would: one in-process [`S3ServiceState`], buckets created in
//! the default partition, and bodies fed in as byte streams.
//!
//! Run them with:
//! ```text
//! cargo test -p objstore-integration
//! ```

use std::sync::{Arc, Once};

use objstore_core::{AccountId, AwsRegion};
use objstore_s3::checksums::ChecksumAlgorithm;
use objstore_s3::read::BodyIterator;
use objstore_s3::state::{ObjectParams, S3Bucket, S3Object};
use objstore_s3::{IngestSource, S3Config, S3ServiceResult, S3ServiceState};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Create a service state with a small spill threshold and part size, so
/// tests exercise the on-disk path with small bodies.
#[must_use]
pub fn test_state() -> S3ServiceState {
    init_tracing();
    S3ServiceState::new(
        S3Config::builder()
            .max_memory_object_size(1024)
            .min_part_size(16)
            .build(),
    )
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a uniquely named bucket in the default partition.
#[must_use]
pub fn create_test_bucket(state: &S3ServiceState, prefix: &str) -> Arc<S3Bucket> {
    state
        .create_bucket(
            &test_bucket_name(prefix),
            &AccountId::default(),
            &AwsRegion::default(),
            false,
        )
        .unwrap_or_else(|e| panic!("failed to create bucket: {e}"))
}

/// Parameters for a plain object, optionally with a checksum algorithm.
#[must_use]
pub fn params(key: &str, checksum: Option<ChecksumAlgorithm>) -> ObjectParams {
    let mut params = ObjectParams::builder().key(key.to_owned()).build();
    params.checksum_algorithm = checksum;
    params
}

/// Store `body` under `key` from a plain stream.
pub fn put_bytes(bucket: &S3Bucket, key: &str, body: &[u8]) -> S3ServiceResult<Arc<S3Object>> {
    let mut reader = body;
    bucket.put_object(params(key, None), IngestSource::Stream(&mut reader))
}

/// Read the whole body of `object` through the block iterator.
pub fn read_body(object: &Arc<S3Object>) -> S3ServiceResult<Vec<u8>> {
    let mut out = Vec::new();
    for block in BodyIterator::new(Arc::clone(object)) {
        out.extend_from_slice(&block?);
    }
    Ok(out)
}

/// Encode `data` as an `aws-chunked` body using `chunk_size` chunks and the
/// given trailer lines.
#[must_use]
pub fn chunked_body(data: &[u8], chunk_size: usize, trailers: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for chunk in data.chunks(chunk_size) {
        body.extend_from_slice(format!("{:x};chunk-signature=00\r\n", chunk.len()).as_bytes());
        body.extend_from_slice(chunk);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"0\r\n");
    for (name, value) in trailers {
        body.extend_from_slice(format!("{name}:{value}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body
}

/// Deterministic test payload of `len` bytes.
#[must_use]
pub fn payload(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect()
}

mod test_cors;
mod test_ingest;
mod test_list;
mod test_multipart;
mod test_versioning;
