//! Multipart upload state management.
//!
//! A [`MultipartUpload`] captures the object parameters given at initiation
//! time and accumulates [`UploadPart`] entries, each an independently
//! ingested object with its own value store. Completion validates the
//! requested part list, concatenates the chosen parts into a fresh value
//! store and builds the final object around it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::object::{ObjectParams, Owner, S3Object};
use crate::checksums::{ChecksumAlgorithm, compute_composite_checksum, compute_multipart_etag};
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::ingest::IngestSource;
use crate::utils::normalize_etag;
use crate::value::ObjectValue;

/// Highest part number a client may use.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// A single uploaded part.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// The part number (1-based).
    pub part_number: u32,
    /// When this part was uploaded.
    pub last_modified: DateTime<Utc>,
    object: Arc<S3Object>,
}

impl UploadPart {
    /// Unquoted MD5 hex of the part body.
    #[must_use]
    pub fn etag(&self) -> String {
        self.object.etag()
    }

    /// Size of the part in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.object.size()
    }

    /// Base64 checksum of the part, when the upload requested one.
    #[must_use]
    pub fn checksum_value(&self) -> Option<String> {
        self.object.checksum_value()
    }
}

/// An in-progress multipart upload.
#[derive(Debug)]
pub struct MultipartUpload {
    /// Unique identifier for this upload.
    pub upload_id: String,
    /// The object key that this upload will create.
    pub key: String,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
    /// The owner who initiated the upload.
    pub owner: Owner,
    template: ObjectParams,
    parts: RwLock<BTreeMap<u32, UploadPart>>,
}

impl MultipartUpload {
    /// Start an upload that will create an object described by `params`.
    #[must_use]
    pub fn new(upload_id: impl Into<String>, params: ObjectParams) -> Self {
        Self {
            upload_id: upload_id.into(),
            key: params.key.clone(),
            initiated: Utc::now(),
            owner: params.owner.clone(),
            template: params,
            parts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Checksum algorithm requested at initiation.
    #[must_use]
    pub fn checksum_algorithm(&self) -> Option<ChecksumAlgorithm> {
        self.template.checksum_algorithm
    }

    /// Ingest one part, replacing any earlier part with the same number.
    ///
    /// # Errors
    ///
    /// * [`S3ServiceError::InvalidArgument`] for a part number outside
    ///   `1..=10000` or a pre-assembled source.
    /// * Any ingestion error of the part body.
    pub fn upload_part(
        &self,
        part_number: u32,
        source: IngestSource<'_>,
        declared_checksum: Option<&str>,
        max_memory_size: usize,
    ) -> S3ServiceResult<UploadPart> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(S3ServiceError::InvalidArgument {
                message: format!(
                    "Part number must be an integer between 1 and {MAX_PART_NUMBER}, inclusive"
                ),
            });
        }
        if matches!(source, IngestSource::Multipart { .. }) {
            return Err(S3ServiceError::InvalidArgument {
                message: "A part body must be streamed".to_owned(),
            });
        }

        let mut params = ObjectParams::builder()
            .key(self.key.clone())
            .owner(self.owner.clone())
            .max_memory_size(max_memory_size)
            .build();
        params.checksum_algorithm = self.template.checksum_algorithm;
        params.checksum_value = declared_checksum.map(str::to_owned);

        let part = UploadPart {
            part_number,
            last_modified: Utc::now(),
            object: Arc::new(S3Object::new(params, source)?),
        };
        debug!(
            upload_id = %self.upload_id,
            key = %self.key,
            part_number,
            size = part.size(),
            "stored upload part"
        );
        self.parts.write().insert(part_number, part.clone());
        Ok(part)
    }

    /// Parts uploaded so far, ordered by part number.
    #[must_use]
    pub fn list_parts(&self) -> Vec<UploadPart> {
        self.parts.read().values().cloned().collect()
    }

    /// Number of parts uploaded so far.
    #[must_use]
    pub fn parts_count(&self) -> usize {
        self.parts.read().len()
    }

    /// Assemble the final object from the requested `(part number, ETag)`
    /// list.
    ///
    /// The returned object has no version ID yet and is not stored anywhere.
    ///
    /// # Errors
    ///
    /// * [`S3ServiceError::InvalidArgument`] for an empty list.
    /// * [`S3ServiceError::InvalidPartOrder`] unless part numbers ascend.
    /// * [`S3ServiceError::InvalidPart`] for a missing part or ETag mismatch.
    /// * [`S3ServiceError::EntityTooSmall`] when a non-final part is smaller
    ///   than `min_part_size`.
    pub fn complete(
        &self,
        requested: &[(u32, String)],
        min_part_size: u64,
        max_memory_size: usize,
    ) -> S3ServiceResult<S3Object> {
        if requested.is_empty() {
            return Err(S3ServiceError::InvalidArgument {
                message: "You must specify at least one part".to_owned(),
            });
        }
        if !requested.windows(2).all(|w| w[0].0 < w[1].0) {
            return Err(S3ServiceError::InvalidPartOrder);
        }

        let selected = {
            let parts = self.parts.read();
            requested
                .iter()
                .map(|(number, etag)| {
                    parts
                        .get(number)
                        .filter(|p| normalize_etag(&p.etag()) == normalize_etag(etag))
                        .cloned()
                        .ok_or(S3ServiceError::InvalidPart)
                })
                .collect::<S3ServiceResult<Vec<_>>>()?
        };

        if let Some((_, leading)) = selected.split_last() {
            if leading.iter().any(|p| p.size() < min_part_size) {
                return Err(S3ServiceError::EntityTooSmall);
            }
        }

        let mut value = ObjectValue::new(max_memory_size);
        for part in &selected {
            part.object.copy_into(&mut value)?;
        }

        let part_etags: Vec<String> = selected.iter().map(UploadPart::etag).collect();
        let etag = compute_multipart_etag(&part_etags);

        let mut params = self.template.clone();
        params.max_memory_size = max_memory_size;
        params.checksum_value = params.checksum_algorithm.and_then(|alg| {
            selected
                .iter()
                .map(UploadPart::checksum_value)
                .collect::<Option<Vec<_>>>()
                .map(|sums| compute_composite_checksum(alg, &sums))
        });
        params.parts = Some(
            selected
                .iter()
                .map(|p| p.part_number)
                .zip(part_etags)
                .collect(),
        );

        let object = S3Object::new(params, IngestSource::Multipart { value, etag })?;
        debug!(
            upload_id = %self.upload_id,
            key = %self.key,
            parts = selected.len(),
            size = object.size(),
            "assembled multipart object"
        );
        Ok(object)
    }
}
