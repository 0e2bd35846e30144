//! S3 service state management.
//!
//! This module provides the in-memory state for the S3 engine:
//!
//! - [`S3ServiceState`] -- top-level service owning every partition's buckets
//! - [`S3Bucket`] -- per-bucket state (objects, versioning, CORS, uploads)
//! - [`VersionedKeyStore`] -- key to version chain storage
//! - [`S3Object`] / [`S3DeleteMarker`] / [`ObjectVersion`] -- chain entries
//! - [`MultipartUpload`] / [`UploadPart`] -- multipart upload tracking
//!
//! # Thread Safety
//!
//! All types are `Send + Sync`. Concurrent access is handled via:
//!
//! - `DashMap` for the bucket tables and multipart upload tables
//! - `parking_lot::RwLock` for per-bucket configuration fields and the
//!   version chains
//! - `parking_lot::Mutex` for each object's body during ingestion and reads

pub(crate) mod bucket;
pub(crate) mod keystore;
pub(crate) mod multipart;
pub(crate) mod object;
pub(crate) mod service;

pub use bucket::{DeleteOutcome, NULL_VERSION_ID, S3Bucket, VersioningStatus};
pub use keystore::{ListResult, VersionedKeyStore};
pub use multipart::{MAX_PART_NUMBER, MultipartUpload, UploadPart};
pub use object::{
    LockMode, ObjectEncryption, ObjectMetadata, ObjectParams, ObjectVersion, Owner,
    S3DeleteMarker, S3Object, StorageClass,
};
pub use service::{S3ServiceState, S3Store};
