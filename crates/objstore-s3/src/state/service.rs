//! Top-level S3 service state.
//!
//! [`S3ServiceState`] partitions buckets by account and region, enforces
//! global bucket-name uniqueness across every partition, and owns the CORS
//! index that preflight handling reads without knowing the bucket's account.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use objstore_core::{AccountId, AccountRegionStore, AwsRegion};
use tracing::info;

use super::bucket::S3Bucket;
use crate::config::S3Config;
use crate::cors::{BucketCorsIndex, CorsIndexSnapshot, CorsMatch, CorsRule};
use crate::error::{S3ServiceError, S3ServiceResult};

/// Buckets of one account and region.
#[derive(Debug, Default)]
pub struct S3Store {
    buckets: DashMap<String, Arc<S3Bucket>>,
}

impl S3Store {
    /// Look up a bucket by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<S3Bucket>> {
        self.buckets.get(name).map(|b| Arc::clone(b.value()))
    }

    /// All buckets of the partition, ordered by name.
    #[must_use]
    pub fn buckets(&self) -> Vec<Arc<S3Bucket>> {
        let mut buckets: Vec<_> = self.buckets.iter().map(|b| Arc::clone(b.value())).collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        buckets
    }

    /// Number of buckets in the partition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the partition has no buckets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Top-level S3 service state holding all buckets.
///
/// Bucket names are globally unique across accounts, enforced by
/// `global_bucket_owner`. Per-partition bucket data is stored in `stores`.
pub struct S3ServiceState {
    stores: AccountRegionStore<S3Store>,
    /// Bucket name to owning partition.
    global_bucket_owner: DashMap<String, (AccountId, AwsRegion)>,
    config: Arc<S3Config>,
    cors_index: BucketCorsIndex,
}

impl std::fmt::Debug for S3ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ServiceState")
            .field("bucket_count", &self.global_bucket_owner.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for S3ServiceState {
    fn default() -> Self {
        Self::new(S3Config::default())
    }
}

impl S3ServiceState {
    /// Create a new, empty service state.
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        Self {
            stores: AccountRegionStore::new(),
            global_bucket_owner: DashMap::new(),
            config: Arc::new(config),
            cors_index: BucketCorsIndex::new(),
        }
    }

    /// Engine configuration shared by every bucket.
    #[must_use]
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Create a new bucket in the given partition.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::BucketAlreadyOwnedByYou`] if the caller already
    ///   owns a bucket with the same name.
    /// - [`S3ServiceError::BucketAlreadyExists`] if the bucket name is taken
    ///   by a different account.
    pub fn create_bucket(
        &self,
        name: &str,
        account: &AccountId,
        region: &AwsRegion,
        object_lock_enabled: bool,
    ) -> S3ServiceResult<Arc<S3Bucket>> {
        let bucket = match self.global_bucket_owner.entry(name.to_owned()) {
            Entry::Occupied(existing) => {
                let bucket = name.to_owned();
                return Err(if existing.get().0 == *account {
                    S3ServiceError::BucketAlreadyOwnedByYou { bucket }
                } else {
                    S3ServiceError::BucketAlreadyExists { bucket }
                });
            }
            Entry::Vacant(slot) => {
                let bucket = Arc::new(S3Bucket::new(
                    name,
                    account.clone(),
                    region.clone(),
                    object_lock_enabled,
                    Arc::clone(&self.config),
                ));
                self.stores
                    .get_or_create(account, region)
                    .buckets
                    .insert(name.to_owned(), Arc::clone(&bucket));
                slot.insert((account.clone(), region.clone()));
                bucket
            }
        };
        self.cors_index.invalidate();

        info!(bucket = name, account = %account, region = %region, "created bucket");
        Ok(bucket)
    }

    /// Delete a bucket together with its objects and uploads.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the partition has no such bucket.
    pub fn delete_bucket(
        &self,
        name: &str,
        account: &AccountId,
        region: &AwsRegion,
    ) -> S3ServiceResult<()> {
        let removed = self
            .stores
            .get(account, region)
            .and_then(|store| store.buckets.remove(name));
        if removed.is_none() {
            return Err(S3ServiceError::NoSuchBucket {
                bucket: name.to_owned(),
            });
        }
        self.global_bucket_owner.remove(name);
        self.cors_index.invalidate();

        info!(bucket = name, account = %account, region = %region, "deleted bucket");
        Ok(())
    }

    /// Look up a bucket in the given partition.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the partition has no such bucket.
    pub fn get_bucket(
        &self,
        name: &str,
        account: &AccountId,
        region: &AwsRegion,
    ) -> S3ServiceResult<Arc<S3Bucket>> {
        self.stores
            .get(account, region)
            .and_then(|store| store.get(name))
            .ok_or_else(|| S3ServiceError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    /// Look up a bucket by name in whichever partition owns it.
    #[must_use]
    pub fn find_bucket(&self, name: &str) -> Option<Arc<S3Bucket>> {
        let (account, region) = self.global_bucket_owner.get(name)?.value().clone();
        self.stores.get(&account, &region)?.get(name)
    }

    /// Buckets of the given partition, ordered by name.
    #[must_use]
    pub fn list_buckets(&self, account: &AccountId, region: &AwsRegion) -> Vec<Arc<S3Bucket>> {
        self.stores
            .get(account, region)
            .map(|store| store.buckets())
            .unwrap_or_default()
    }

    /// Check whether a bucket name is taken in any partition.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.global_bucket_owner.contains_key(name)
    }

    // -----------------------------------------------------------------------
    // CORS
    // -----------------------------------------------------------------------

    /// Replace the CORS configuration of a bucket.
    ///
    /// # Errors
    ///
    /// * [`S3ServiceError::NoSuchBucket`] if the partition has no such bucket.
    /// * [`S3ServiceError::InvalidArgument`] for an empty rule list.
    pub fn put_bucket_cors(
        &self,
        name: &str,
        account: &AccountId,
        region: &AwsRegion,
        rules: Vec<CorsRule>,
    ) -> S3ServiceResult<()> {
        let bucket = self.get_bucket(name, account, region)?;
        if rules.is_empty() {
            return Err(S3ServiceError::InvalidArgument {
                message: "A CORS configuration must contain at least one rule".to_owned(),
            });
        }
        bucket.set_cors(rules);
        self.cors_index.invalidate();
        Ok(())
    }

    /// Remove the CORS configuration of a bucket. Removing an absent
    /// configuration succeeds.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the partition has no such bucket.
    pub fn delete_bucket_cors(
        &self,
        name: &str,
        account: &AccountId,
        region: &AwsRegion,
    ) -> S3ServiceResult<()> {
        if self.get_bucket(name, account, region)?.delete_cors() {
            self.cors_index.invalidate();
        }
        Ok(())
    }

    /// The CORS configuration of a bucket.
    ///
    /// # Errors
    ///
    /// * [`S3ServiceError::NoSuchBucket`] if the partition has no such bucket.
    /// * [`S3ServiceError::NoSuchCorsConfiguration`] if none is set.
    pub fn get_bucket_cors(
        &self,
        name: &str,
        account: &AccountId,
        region: &AwsRegion,
    ) -> S3ServiceResult<Vec<CorsRule>> {
        self.get_bucket(name, account, region)?
            .cors()
            .ok_or(S3ServiceError::NoSuchCorsConfiguration)
    }

    /// The current CORS index, rebuilt from every partition if it was
    /// invalidated.
    pub fn cors_index(&self) -> Arc<CorsIndexSnapshot> {
        self.cors_index.get_or_build(|| {
            let mut snapshot = CorsIndexSnapshot::default();
            for (_, _, store) in self.stores.partitions() {
                for bucket in store.buckets() {
                    if let Some(rules) = bucket.cors() {
                        snapshot.cors.insert(bucket.name.clone(), rules);
                    }
                    snapshot.buckets.insert(bucket.name.clone());
                }
            }
            snapshot
        })
    }

    /// Evaluate the CORS rules of `bucket` against a request.
    ///
    /// Returns `None` when the bucket does not exist, has no CORS
    /// configuration, or no rule allows the request.
    pub fn match_cors(
        &self,
        bucket: &str,
        origin: &str,
        method: &str,
        request_headers: &[String],
    ) -> Option<CorsMatch> {
        self.cors_index()
            .match_cors(bucket, origin, method, request_headers)
    }

    /// Reset all state, removing every bucket in every partition.
    pub fn reset(&self) {
        self.stores.reset();
        self.global_bucket_owner.clear();
        self.cors_index.invalidate();
        info!("reset s3 service state");
    }
}
