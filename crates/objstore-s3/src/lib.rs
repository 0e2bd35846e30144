//! Versioned in-process object storage engine with S3 semantics.
//!
//! The engine stores buckets of keys, each key holding an ordered chain of
//! versions and delete markers. Object bodies are ingested from a plain
//! stream, an `aws-chunked` stream with trailing checksum headers, or an
//! already assembled multipart value, and are read back as lazy 64 KiB block
//! iterators.
//!
//! # Architecture
//!
//! ```text
//!   S3ServiceState (partitions, global bucket names, CORS index)
//!        |
//!        v
//!   S3Bucket (versioning, CORS rules, multipart uploads)
//!        |
//!        v
//!   VersionedKeyStore (key -> [Object | DeleteMarker])
//!        |
//!        v
//!   S3Object (ingestion lock) -> ObjectValue (memory, spills to disk)
//! ```
//!
//! # Examples
//!
//! ```
//! use objstore_core::{AccountId, AwsRegion};
//! use objstore_s3::{IngestSource, S3ServiceState, state::ObjectParams};
//!
//! let state = S3ServiceState::default();
//! let bucket = state
//!     .create_bucket("photos", &AccountId::default(), &AwsRegion::default(), false)
//!     .unwrap();
//!
//! let mut body: &[u8] = b"hello";
//! let params = ObjectParams::builder().key("a.txt".to_owned()).build();
//! let object = bucket.put_object(params, IngestSource::Stream(&mut body)).unwrap();
//! assert_eq!(object.etag(), "5d41402abc4b2a76b9719d911017c592");
//! assert_eq!(object.size(), 5);
//! ```

pub mod checksums;
pub mod chunked;
pub mod config;
pub mod cors;
pub mod error;
pub mod ingest;
pub mod read;
pub mod state;
pub mod utils;
pub mod value;

pub use config::S3Config;
pub use error::{S3ServiceError, S3ServiceResult};
pub use ingest::IngestSource;
pub use state::S3ServiceState;

/// Block size used for every read and write against an object value.
pub const S3_CHUNK_SIZE: usize = 65_536;
