//! S3 bucket data structure.
//!
//! An [`S3Bucket`] holds all per-bucket state: the versioned key store, the
//! multipart upload table, the versioning status and the CORS rules. Object
//! operations on the bucket assign version IDs according to the versioning
//! status and turn key-store misses into protocol errors.
//!
//! Interior mutability is achieved through `parking_lot::RwLock` for
//! single-valued configuration fields and `DashMap` for the multipart upload
//! table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use objstore_core::{AccountId, AwsRegion};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keystore::{ListResult, VersionedKeyStore};
use super::multipart::{MultipartUpload, UploadPart};
use super::object::{ObjectParams, ObjectVersion, Owner, S3DeleteMarker, S3Object};
use crate::config::S3Config;
use crate::cors::CorsRule;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::ingest::IngestSource;
use crate::utils::{generate_upload_id, generate_version_id};

/// Version ID of objects written while versioning is suspended.
pub const NULL_VERSION_ID: &str = "null";

/// Bucket versioning status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning has never been enabled on this bucket.
    #[default]
    Unset,
    /// Versioning is currently enabled.
    Enabled,
    /// Versioning was previously enabled but is now suspended.
    Suspended,
}

/// Outcome of a delete-object call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Version ID of the removed version or of the inserted delete marker.
    pub version_id: Option<String>,
    /// Whether a delete marker was inserted or removed.
    pub delete_marker: bool,
}

/// An S3 bucket.
#[derive(Debug)]
pub struct S3Bucket {
    /// The bucket name (globally unique).
    pub name: String,
    /// The account that owns the bucket.
    pub account_id: AccountId,
    /// The region the bucket lives in.
    pub region: AwsRegion,
    /// When the bucket was created.
    pub creation_date: DateTime<Utc>,
    /// Whether object lock was enabled at creation time.
    pub object_lock_enabled: bool,
    /// The bucket owner.
    pub owner: Owner,
    versioning: RwLock<VersioningStatus>,
    objects: VersionedKeyStore,
    cors_rules: RwLock<Option<Vec<CorsRule>>>,
    multipart_uploads: DashMap<String, Arc<MultipartUpload>>,
    config: Arc<S3Config>,
}

impl S3Bucket {
    /// Create an empty bucket. Object lock implies enabled versioning.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        account_id: AccountId,
        region: AwsRegion,
        object_lock_enabled: bool,
        config: Arc<S3Config>,
    ) -> Self {
        let versioning = if object_lock_enabled {
            VersioningStatus::Enabled
        } else {
            VersioningStatus::Unset
        };
        Self {
            name: name.into(),
            owner: Owner::for_account(&account_id),
            account_id,
            region,
            creation_date: Utc::now(),
            object_lock_enabled,
            versioning: RwLock::new(versioning),
            objects: VersionedKeyStore::new(),
            cors_rules: RwLock::new(None),
            multipart_uploads: DashMap::new(),
            config,
        }
    }

    /// The version chains of this bucket.
    #[must_use]
    pub fn objects(&self) -> &VersionedKeyStore {
        &self.objects
    }

    /// Whether the bucket holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // -----------------------------------------------------------------------
    // Versioning
    // -----------------------------------------------------------------------

    /// Current versioning status.
    #[must_use]
    pub fn versioning(&self) -> VersioningStatus {
        *self.versioning.read()
    }

    /// Enable or suspend versioning.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::InvalidArgument`] when `status` is
    /// [`VersioningStatus::Unset`], or when suspending a bucket with object
    /// lock enabled.
    pub fn set_versioning(&self, status: VersioningStatus) -> S3ServiceResult<()> {
        match status {
            VersioningStatus::Unset => Err(S3ServiceError::InvalidArgument {
                message: "The versioning status must be Enabled or Suspended".to_owned(),
            }),
            VersioningStatus::Suspended if self.object_lock_enabled => {
                Err(S3ServiceError::InvalidArgument {
                    message: "An Object Lock configuration is present on this bucket, so the \
                              versioning state cannot be changed"
                        .to_owned(),
                })
            }
            status => {
                *self.versioning.write() = status;
                debug!(bucket = %self.name, ?status, "updated versioning");
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Ingest a new object and store it as the current version of its key.
    ///
    /// # Errors
    ///
    /// Any ingestion error; nothing is stored in that case.
    pub fn put_object(
        &self,
        mut params: ObjectParams,
        source: IngestSource<'_>,
    ) -> S3ServiceResult<Arc<S3Object>> {
        params.max_memory_size = self.config.max_memory_object_size;
        let object = S3Object::new(params, source)?;
        Ok(self.commit(object))
    }

    /// Assign a version ID to a fully ingested object and store it.
    fn commit(&self, mut object: S3Object) -> Arc<S3Object> {
        let versioning = self.versioning.read();
        object.version_id = match *versioning {
            VersioningStatus::Unset => None,
            VersioningStatus::Enabled => Some(generate_version_id()),
            VersioningStatus::Suspended => Some(NULL_VERSION_ID.to_owned()),
        };
        let object = Arc::new(object);
        let entry = ObjectVersion::Object(Arc::clone(&object));
        match *versioning {
            VersioningStatus::Unset => {
                self.objects.replace_current(entry);
            }
            VersioningStatus::Enabled => self.objects.put(entry),
            VersioningStatus::Suspended => {
                self.objects.put_null_version(entry);
            }
        }
        debug!(
            bucket = %self.name,
            key = %object.key,
            version_id = ?object.version_id,
            size = object.size(),
            "stored object"
        );
        object
    }

    /// Fetch the current version, or a specific version, of `key`.
    ///
    /// # Errors
    ///
    /// * [`S3ServiceError::NoSuchKey`] when the key is missing or its current
    ///   version is a delete marker.
    /// * [`S3ServiceError::NoSuchVersion`] when the requested version is
    ///   missing.
    /// * [`S3ServiceError::MethodNotAllowed`] when the requested version is a
    ///   delete marker.
    pub fn get_object(&self, key: &str, version_id: Option<&str>) -> S3ServiceResult<Arc<S3Object>> {
        match version_id {
            None => match self.objects.get_current(key) {
                Some(ObjectVersion::Object(object)) => Ok(object),
                _ => Err(S3ServiceError::NoSuchKey {
                    key: key.to_owned(),
                }),
            },
            Some(id) => match self.objects.get_version(key, id) {
                Some(ObjectVersion::Object(object)) => Ok(object),
                Some(ObjectVersion::DeleteMarker(_)) => Err(S3ServiceError::MethodNotAllowed),
                None => Err(S3ServiceError::NoSuchVersion {
                    key: key.to_owned(),
                    version_id: id.to_owned(),
                }),
            },
        }
    }

    /// Delete `key`, or one version of it.
    ///
    /// With a version ID the entry is removed permanently; a missing version
    /// is not an error. Without one the effect depends on the versioning
    /// status: the key is dropped when versioning was never enabled, and a
    /// delete marker becomes the current version otherwise.
    pub fn delete_object(&self, key: &str, version_id: Option<&str>) -> DeleteOutcome {
        if let Some(id) = version_id {
            let removed = self.objects.remove_version(key, id);
            debug!(bucket = %self.name, key, version_id = id, found = removed.is_some(), "deleted version");
            return DeleteOutcome {
                version_id: Some(id.to_owned()),
                delete_marker: removed.is_some_and(|v| v.is_delete_marker()),
            };
        }

        let versioning = self.versioning.read();
        let marker_id = match *versioning {
            VersioningStatus::Unset => {
                self.objects.remove_key(key);
                debug!(bucket = %self.name, key, "deleted key");
                return DeleteOutcome::default();
            }
            VersioningStatus::Enabled => {
                let id = generate_version_id();
                self.objects
                    .append_tombstone(S3DeleteMarker::new(key, id.clone(), self.owner.clone()));
                id
            }
            VersioningStatus::Suspended => {
                self.objects.put_null_version(ObjectVersion::DeleteMarker(S3DeleteMarker::new(
                    key,
                    NULL_VERSION_ID,
                    self.owner.clone(),
                )));
                NULL_VERSION_ID.to_owned()
            }
        };
        debug!(bucket = %self.name, key, version_id = %marker_id, "inserted delete marker");
        DeleteOutcome {
            version_id: Some(marker_id),
            delete_marker: true,
        }
    }

    /// List current objects; see [`VersionedKeyStore::list_objects`].
    #[must_use]
    pub fn list_objects(
        &self,
        prefix: &str,
        delimiter: &str,
        start_after: &str,
        max_keys: usize,
    ) -> ListResult {
        self.objects
            .list_objects(prefix, delimiter, start_after, max_keys)
    }

    // -----------------------------------------------------------------------
    // CORS
    // -----------------------------------------------------------------------

    /// CORS rules of this bucket, if configured.
    #[must_use]
    pub fn cors(&self) -> Option<Vec<CorsRule>> {
        self.cors_rules.read().clone()
    }

    pub(crate) fn set_cors(&self, rules: Vec<CorsRule>) {
        *self.cors_rules.write() = Some(rules);
    }

    pub(crate) fn delete_cors(&self) -> bool {
        self.cors_rules.write().take().is_some()
    }

    // -----------------------------------------------------------------------
    // Multipart uploads
    // -----------------------------------------------------------------------

    /// Start a multipart upload for the object described by `params`.
    pub fn create_multipart_upload(&self, params: ObjectParams) -> Arc<MultipartUpload> {
        let upload = Arc::new(MultipartUpload::new(generate_upload_id(), params));
        debug!(bucket = %self.name, key = %upload.key, upload_id = %upload.upload_id, "created multipart upload");
        self.multipart_uploads
            .insert(upload.upload_id.clone(), Arc::clone(&upload));
        upload
    }

    /// Look up an in-progress upload.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] when the upload does not exist.
    pub fn get_multipart_upload(&self, upload_id: &str) -> S3ServiceResult<Arc<MultipartUpload>> {
        self.multipart_uploads
            .get(upload_id)
            .map(|u| Arc::clone(u.value()))
            .ok_or_else(|| S3ServiceError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            })
    }

    /// In-progress uploads, ordered by key and initiation time.
    #[must_use]
    pub fn list_multipart_uploads(&self) -> Vec<Arc<MultipartUpload>> {
        let mut uploads: Vec<_> = self
            .multipart_uploads
            .iter()
            .map(|u| Arc::clone(u.value()))
            .collect();
        uploads.sort_by(|a, b| a.key.cmp(&b.key).then(a.initiated.cmp(&b.initiated)));
        uploads
    }

    /// Ingest one part of an upload.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`], or any error of
    /// [`MultipartUpload::upload_part`].
    pub fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        source: IngestSource<'_>,
        declared_checksum: Option<&str>,
    ) -> S3ServiceResult<UploadPart> {
        self.get_multipart_upload(upload_id)?.upload_part(
            part_number,
            source,
            declared_checksum,
            self.config.max_memory_object_size,
        )
    }

    /// Parts uploaded so far.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] when the upload does not exist.
    pub fn list_parts(&self, upload_id: &str) -> S3ServiceResult<Vec<UploadPart>> {
        Ok(self.get_multipart_upload(upload_id)?.list_parts())
    }

    /// Assemble the upload into an object and store it like
    /// [`put_object`](Self::put_object) would. The upload is gone afterwards.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`], or any error of
    /// [`MultipartUpload::complete`]; the upload is kept on a validation
    /// failure.
    pub fn complete_multipart_upload(
        &self,
        upload_id: &str,
        parts: &[(u32, String)],
    ) -> S3ServiceResult<Arc<S3Object>> {
        let upload = self.get_multipart_upload(upload_id)?;
        let object = upload.complete(
            parts,
            self.config.min_part_size,
            self.config.max_memory_object_size,
        )?;
        if self.multipart_uploads.remove(upload_id).is_none() {
            return Err(S3ServiceError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            });
        }
        Ok(self.commit(object))
    }

    /// Discard an upload and its parts.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] when the upload does not exist.
    pub fn abort_multipart_upload(&self, upload_id: &str) -> S3ServiceResult<()> {
        if self.multipart_uploads.remove(upload_id).is_none() {
            return Err(S3ServiceError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            });
        }
        debug!(bucket = %self.name, upload_id, "aborted multipart upload");
        Ok(())
    }
}
