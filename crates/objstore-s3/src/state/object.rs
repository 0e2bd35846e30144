//! Object types and metadata.
//!
//! An [`S3Object`] is one version of a key. Its identity and descriptive
//! fields are fixed once it is built; its body and the fields derived from the
//! body (size, ETag, checksum) sit behind a per-object mutex that ingestion
//! holds for its whole duration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use objstore_core::AccountId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::checksums::ChecksumAlgorithm;
use crate::config::DEFAULT_MAX_MEMORY_OBJECT_SIZE;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::ingest::{self, IngestSource};
use crate::utils::rfc1123;
use crate::value::ObjectValue;

/// Headers copied into object metadata besides `x-amz-meta-*`.
const METADATA_SETTABLE_HEADERS: [&str; 7] = [
    "content-md5",
    "content-language",
    "content-type",
    "content-encoding",
    "cache-control",
    "content-disposition",
    "x-robots-tag",
];

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

/// The owner of an S3 object or bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// The canonical user ID of the owner.
    pub id: String,
    /// The display name of the owner.
    pub display_name: String,
}

impl Owner {
    /// Canonical owner reported for resources of `account`.
    ///
    /// Every account maps to the same canonical user.
    #[must_use]
    pub fn for_account(_account: &AccountId) -> Self {
        Self::default()
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self {
            id: "75aa57f09aa0c8caeab4f8c24e99d10f8e7faeebf76c078efc7c6caea54ba06a".to_owned(),
            display_name: "webfile".to_owned(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.display_name, self.id)
    }
}

// ---------------------------------------------------------------------------
// StorageClass
// ---------------------------------------------------------------------------

/// Storage class of an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    /// `STANDARD`
    #[default]
    Standard,
    /// `STANDARD_IA`
    StandardIa,
    /// `GLACIER`
    Glacier,
    /// `GLACIER_IR`
    GlacierIr,
    /// `REDUCED_REDUNDANCY`
    ReducedRedundancy,
    /// `ONEZONE_IA`
    OnezoneIa,
    /// `INTELLIGENT_TIERING`
    IntelligentTiering,
    /// `DEEP_ARCHIVE`
    DeepArchive,
}

impl StorageClass {
    /// Return the string representation used in S3 headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::StandardIa => "STANDARD_IA",
            Self::Glacier => "GLACIER",
            Self::GlacierIr => "GLACIER_IR",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::DeepArchive => "DEEP_ARCHIVE",
        }
    }

    /// Whether objects in this class must be restored before they are read.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Glacier | Self::GlacierIr | Self::DeepArchive)
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = S3ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(Self::Standard),
            "STANDARD_IA" => Ok(Self::StandardIa),
            "GLACIER" => Ok(Self::Glacier),
            "GLACIER_IR" => Ok(Self::GlacierIr),
            "REDUCED_REDUNDANCY" => Ok(Self::ReducedRedundancy),
            "ONEZONE_IA" => Ok(Self::OnezoneIa),
            "INTELLIGENT_TIERING" => Ok(Self::IntelligentTiering),
            "DEEP_ARCHIVE" => Ok(Self::DeepArchive),
            _ => Err(S3ServiceError::InvalidArgument {
                message: format!("The storage class you specified is not valid: {s}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectMetadata
// ---------------------------------------------------------------------------

/// Ordered metadata entries with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    entries: Vec<(String, String)>,
}

impl ObjectMetadata {
    /// Collect metadata from request headers.
    ///
    /// `x-amz-meta-*` headers whose suffix only uses `[A-Za-z0-9-_.]` are kept
    /// with a lowercased name; the settable system headers (`content-type`,
    /// `cache-control`, ...) are kept under the name they were sent with.
    /// Everything else is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use objstore_s3::state::ObjectMetadata;
    ///
    /// let metadata = ObjectMetadata::from_headers([
    ///     ("X-Amz-Meta-Color", "blue"),
    ///     ("Content-Type", "text/plain"),
    ///     ("Authorization", "secret"),
    /// ]);
    /// assert_eq!(metadata.get("x-amz-meta-color"), Some("blue"));
    /// assert_eq!(metadata.get("content-type"), Some("text/plain"));
    /// assert_eq!(metadata.len(), 2);
    /// ```
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut metadata = Self::default();
        for (name, value) in headers {
            let name = name.as_ref();
            let lower = name.to_ascii_lowercase();
            if is_user_metadata(&lower) {
                metadata.insert(lower, value.as_ref());
            } else if METADATA_SETTABLE_HEADERS.contains(&lower.as_str()) {
                metadata.insert(name, value.as_ref());
            }
        }
        metadata
    }

    /// Set `key`, replacing an existing entry with the same key in any case.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up `key`, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_user_metadata(lower_name: &str) -> bool {
    lower_name.strip_prefix("x-amz-meta-").is_some_and(|suffix| {
        !suffix.is_empty()
            && suffix
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    })
}

// ---------------------------------------------------------------------------
// Encryption and object lock
// ---------------------------------------------------------------------------

/// Server-side encryption settings recorded on an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEncryption {
    /// `AES256`, `aws:kms` or `aws:kms:dsse`.
    pub algorithm: String,
    /// KMS key ARN for the KMS algorithms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Whether an S3 Bucket Key is enabled.
    #[serde(default)]
    pub bucket_key_enabled: bool,
}

/// Object lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockMode {
    /// Users with special permissions may shorten or remove retention.
    Governance,
    /// Nobody may shorten or remove retention.
    Compliance,
}

// ---------------------------------------------------------------------------
// ObjectParams
// ---------------------------------------------------------------------------

/// Descriptive fields of an object about to be created.
///
/// # Examples
///
/// ```
/// use objstore_s3::checksums::ChecksumAlgorithm;
/// use objstore_s3::state::{ObjectParams, StorageClass};
///
/// let params = ObjectParams::builder()
///     .key("photos/cat.jpg".to_owned())
///     .storage_class(StorageClass::StandardIa)
///     .checksum_algorithm(ChecksumAlgorithm::Crc32)
///     .build();
/// assert_eq!(params.key, "photos/cat.jpg");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ObjectParams {
    /// Object key.
    pub key: String,
    /// User and system metadata.
    #[builder(default)]
    pub metadata: ObjectMetadata,
    /// Storage class.
    #[builder(default)]
    pub storage_class: StorageClass,
    /// Value of the `Expires` header.
    #[builder(default, setter(strip_option))]
    pub expires: Option<DateTime<Utc>>,
    /// Expiration computed from lifecycle rules.
    #[builder(default, setter(strip_option))]
    pub expiration: Option<DateTime<Utc>>,
    /// Expiry of the object itself.
    #[builder(default, setter(strip_option))]
    pub expiry: Option<DateTime<Utc>>,
    /// Integrity checksum algorithm to compute.
    #[builder(default, setter(strip_option))]
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Checksum declared by the client, validated during ingestion.
    #[builder(default, setter(strip_option))]
    pub checksum_value: Option<String>,
    /// Server-side encryption settings.
    #[builder(default, setter(strip_option))]
    pub encryption: Option<ObjectEncryption>,
    /// Object lock mode.
    #[builder(default, setter(strip_option))]
    pub lock_mode: Option<LockMode>,
    /// Legal hold status.
    #[builder(default, setter(strip_option))]
    pub lock_legal_hold: Option<bool>,
    /// Retain-until date of the lock.
    #[builder(default, setter(strip_option))]
    pub lock_until: Option<DateTime<Utc>>,
    /// Owner of the new object.
    #[builder(default)]
    pub owner: Owner,
    /// Part number and ETag of each part a multipart object was built from.
    #[builder(default, setter(strip_option))]
    pub parts: Option<Vec<(u32, String)>>,
    /// Spill threshold of the object value.
    #[builder(default = DEFAULT_MAX_MEMORY_OBJECT_SIZE)]
    pub max_memory_size: usize,
}

// ---------------------------------------------------------------------------
// S3Object
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ObjectBody {
    value: ObjectValue,
    size: u64,
    etag: String,
    checksum_value: Option<String>,
}

/// A stored object version.
#[derive(Debug)]
pub struct S3Object {
    /// The object key.
    pub key: String,
    /// Version ID, assigned by the bucket before the object is stored.
    pub version_id: Option<String>,
    /// User and system metadata.
    pub metadata: ObjectMetadata,
    /// The time this version was written.
    pub last_modified: DateTime<Utc>,
    /// Value of the `Expires` header.
    pub expires: Option<DateTime<Utc>>,
    /// Expiration computed from lifecycle rules.
    pub expiration: Option<DateTime<Utc>>,
    /// Expiry of the object itself.
    pub expiry: Option<DateTime<Utc>>,
    /// Storage class.
    pub storage_class: StorageClass,
    /// Server-side encryption settings.
    pub encryption: Option<ObjectEncryption>,
    /// Integrity checksum algorithm.
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Object lock mode.
    pub lock_mode: Option<LockMode>,
    /// Legal hold status.
    pub lock_legal_hold: Option<bool>,
    /// Retain-until date of the lock.
    pub lock_until: Option<DateTime<Utc>>,
    /// Part manifest of a multipart object.
    pub parts: Option<Vec<(u32, String)>>,
    /// The owner of this object.
    pub owner: Owner,
    is_current: AtomicBool,
    body: Mutex<ObjectBody>,
}

impl S3Object {
    /// Build an object and ingest its body from `source`.
    ///
    /// # Errors
    ///
    /// Any ingestion error; see [`ingest::ingest`].
    pub fn new(params: ObjectParams, source: IngestSource<'_>) -> S3ServiceResult<Self> {
        let object = Self {
            key: params.key,
            version_id: None,
            metadata: params.metadata,
            last_modified: Utc::now(),
            expires: params.expires,
            expiration: params.expiration,
            expiry: params.expiry,
            storage_class: params.storage_class,
            encryption: params.encryption,
            checksum_algorithm: params.checksum_algorithm,
            lock_mode: params.lock_mode,
            lock_legal_hold: params.lock_legal_hold,
            lock_until: params.lock_until,
            parts: params.parts,
            owner: params.owner,
            is_current: AtomicBool::new(true),
            body: Mutex::new(ObjectBody {
                value: ObjectValue::new(params.max_memory_size),
                size: 0,
                etag: String::new(),
                checksum_value: None,
            }),
        };
        object.ingest(source, params.checksum_value.as_deref())?;
        Ok(object)
    }

    /// Replace the body with the content of `source`.
    ///
    /// Holds the object lock until ingestion finishes. Must not be used on an
    /// object that is already reachable through a key store.
    ///
    /// # Errors
    ///
    /// Any ingestion error; the body is left empty in that case.
    pub(crate) fn ingest(
        &self,
        source: IngestSource<'_>,
        declared_checksum: Option<&str>,
    ) -> S3ServiceResult<()> {
        let mut body = self.body.lock();
        let body = &mut *body;
        match ingest::ingest(
            &mut body.value,
            self.checksum_algorithm,
            declared_checksum,
            source,
        ) {
            Ok(outcome) => {
                body.size = outcome.size;
                body.etag = outcome.etag;
                body.checksum_value = outcome.checksum_value;
                Ok(())
            }
            Err(e) => {
                body.size = 0;
                body.etag.clear();
                body.checksum_value = None;
                Err(e)
            }
        }
    }

    /// Body size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.body.lock().size
    }

    /// Unquoted ETag.
    #[must_use]
    pub fn etag(&self) -> String {
        self.body.lock().etag.clone()
    }

    /// Base64 integrity checksum, when one was computed.
    #[must_use]
    pub fn checksum_value(&self) -> Option<String> {
        self.body.lock().checksum_value.clone()
    }

    /// Whether this version is the last entry of its chain.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.is_current.load(Ordering::Acquire)
    }

    pub(crate) fn set_current(&self, current: bool) {
        self.is_current.store(current, Ordering::Release);
    }

    /// Read up to `max` bytes starting at `offset`.
    pub(crate) fn read_at(&self, offset: u64, max: usize) -> S3ServiceResult<Bytes> {
        let mut body = self.body.lock();
        body.value.seek(offset)?;
        body.value.read(max)
    }

    /// Copy the whole body into `target`.
    pub(crate) fn copy_into(&self, target: &mut ObjectValue) -> S3ServiceResult<()> {
        let mut offset = 0;
        loop {
            let block = self.read_at(offset, crate::S3_CHUNK_SIZE)?;
            if block.is_empty() {
                return Ok(());
            }
            target.write(&block)?;
            offset += block.len() as u64;
        }
    }

    /// Response headers describing this object.
    ///
    /// Entries come in a fixed order: `Last-Modified`, `Content-Length`,
    /// `ETag` (quoted), `Expires` when set, then every metadata entry.
    #[must_use]
    pub fn metadata_headers(&self) -> Vec<(String, String)> {
        let (size, etag) = {
            let body = self.body.lock();
            (body.size, body.etag.clone())
        };

        let mut headers = Vec::with_capacity(self.metadata.len() + 4);
        headers.push(("Last-Modified".to_owned(), rfc1123(self.last_modified)));
        headers.push(("Content-Length".to_owned(), size.to_string()));
        headers.push(("ETag".to_owned(), format!("\"{etag}\"")));
        if let Some(expires) = self.expires {
            headers.push(("Expires".to_owned(), rfc1123(expires)));
        }
        headers.extend(
            self.metadata
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned())),
        );
        headers
    }
}

// ---------------------------------------------------------------------------
// S3DeleteMarker
// ---------------------------------------------------------------------------

/// A delete marker in a version chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3DeleteMarker {
    /// The object key.
    pub key: String,
    /// The version ID of this delete marker.
    pub version_id: String,
    /// The time this delete marker was created.
    pub last_modified: DateTime<Utc>,
    /// The owner of this delete marker.
    pub owner: Owner,
}

impl S3DeleteMarker {
    /// Create a delete marker stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, version_id: impl Into<String>, owner: Owner) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.into(),
            last_modified: Utc::now(),
            owner,
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectVersion
// ---------------------------------------------------------------------------

/// An entry of a version chain: either an object or a delete marker.
#[derive(Debug, Clone)]
pub enum ObjectVersion {
    /// A real object version.
    Object(Arc<S3Object>),
    /// A delete-marker version.
    DeleteMarker(S3DeleteMarker),
}

impl ObjectVersion {
    /// Returns the object key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Object(obj) => &obj.key,
            Self::DeleteMarker(dm) => &dm.key,
        }
    }

    /// Returns the version ID; `None` for objects written while versioning
    /// was never enabled.
    #[must_use]
    pub fn version_id(&self) -> Option<&str> {
        match self {
            Self::Object(obj) => obj.version_id.as_deref(),
            Self::DeleteMarker(dm) => Some(&dm.version_id),
        }
    }

    /// Returns the last-modified timestamp.
    #[must_use]
    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Self::Object(obj) => obj.last_modified,
            Self::DeleteMarker(dm) => dm.last_modified,
        }
    }

    /// Stored size; delete markers have none.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Object(obj) => Some(obj.size()),
            Self::DeleteMarker(_) => None,
        }
    }

    /// Returns `true` if this version is a delete marker.
    #[must_use]
    pub fn is_delete_marker(&self) -> bool {
        matches!(self, Self::DeleteMarker(_))
    }

    /// Returns the inner object, if this is an object version.
    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<S3Object>> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::DeleteMarker(_) => None,
        }
    }

    /// Returns the inner delete marker, if this is one.
    #[must_use]
    pub fn as_delete_marker(&self) -> Option<&S3DeleteMarker> {
        match self {
            Self::Object(_) => None,
            Self::DeleteMarker(dm) => Some(dm),
        }
    }
}

impl From<S3Object> for ObjectVersion {
    fn from(object: S3Object) -> Self {
        Self::Object(Arc::new(object))
    }
}

impl From<S3DeleteMarker> for ObjectVersion {
    fn from(marker: S3DeleteMarker) -> Self {
        Self::DeleteMarker(marker)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
