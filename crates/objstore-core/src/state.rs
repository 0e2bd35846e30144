//! Account/region partitioned state.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::types::{AccountId, AwsRegion};

/// Partition key of an [`AccountRegionStore`].
type Partition = (AccountId, AwsRegion);

/// Concurrent store that owns one state instance per (account, region).
///
/// Instances are handed out as `Arc<T>` so callers can keep using a partition
/// after releasing the map shard. The store is an explicit value owned by
/// whoever starts the process; there is no global instance.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use objstore_core::{AccountId, AccountRegionStore, AwsRegion};
///
/// #[derive(Debug, Default)]
/// struct Counter(AtomicU64);
///
/// let store = AccountRegionStore::<Counter>::new();
/// let partition = store.get_or_create(&AccountId::default(), &AwsRegion::default());
/// partition.0.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug)]
pub struct AccountRegionStore<T: Default + Send + Sync> {
    partitions: DashMap<Partition, Arc<T>>,
}

impl<T: Default + Send + Sync> AccountRegionStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: DashMap::new(),
        }
    }

    /// Return the partition for `account`/`region`, creating a default one
    /// on first access.
    #[must_use]
    pub fn get_or_create(&self, account: &AccountId, region: &AwsRegion) -> Arc<T> {
        self.partitions
            .entry((account.clone(), region.clone()))
            .or_insert_with(|| {
                trace!(%account, %region, "creating partition");
                Arc::new(T::default())
            })
            .clone()
    }

    /// Return the partition if it has been created.
    #[must_use]
    pub fn get(&self, account: &AccountId, region: &AwsRegion) -> Option<Arc<T>> {
        self.partitions
            .get(&(account.clone(), region.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Drop a partition, returning it if it existed.
    pub fn remove(&self, account: &AccountId, region: &AwsRegion) -> Option<Arc<T>> {
        self.partitions
            .remove(&(account.clone(), region.clone()))
            .map(|(_, state)| state)
    }

    /// Copy out every partition.
    ///
    /// The result is detached from the map, so partitions created or removed
    /// while the caller walks it do not affect the walk.
    #[must_use]
    pub fn partitions(&self) -> Vec<(AccountId, AwsRegion, Arc<T>)> {
        self.partitions
            .iter()
            .map(|entry| {
                let (account, region) = entry.key();
                (account.clone(), region.clone(), Arc::clone(entry.value()))
            })
            .collect()
    }

    /// Remove every partition.
    pub fn reset(&self) {
        self.partitions.clear();
    }

    /// Number of partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether no partition has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

impl<T: Default + Send + Sync> Default for AccountRegionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
