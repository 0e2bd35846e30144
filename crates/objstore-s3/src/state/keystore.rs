//! Version chains of a bucket.
//!
//! [`VersionedKeyStore`] maps each key to its chain of versions, oldest
//! first. The last entry of a chain is the current version. A key whose chain
//! would become empty is removed instead.
//!
//! Reads that enumerate the store copy what they need under a short read
//! lock and work on that snapshot, so writers are never blocked by a long
//! scan and a scan never observes a half-applied write.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::object::{ObjectVersion, S3DeleteMarker, S3Object};

/// Result of a list-objects operation.
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Current objects that matched, in key order.
    pub objects: Vec<Arc<S3Object>>,
    /// Common prefixes folded by the delimiter.
    pub common_prefixes: Vec<String>,
    /// Whether more results are available.
    pub is_truncated: bool,
    /// Key to pass as `start_after` to fetch the next page.
    pub next_marker: Option<String>,
}

/// Per-bucket mapping from key to version chain.
#[derive(Debug, Default)]
pub struct VersionedKeyStore {
    chains: RwLock<BTreeMap<String, Vec<ObjectVersion>>>,
}

impl VersionedKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` to its key's chain, making it the current version.
    pub fn put(&self, entry: ObjectVersion) {
        let mut chains = self.chains.write();
        let chain = chains.entry(entry.key().to_owned()).or_default();
        if let Some(previous) = chain.last().and_then(ObjectVersion::as_object) {
            previous.set_current(false);
        }
        mark_current(&entry);
        trace!(key = entry.key(), version_id = ?entry.version_id(), "appended version");
        chain.push(entry);
    }

    /// Overwrite the current version of the key in place, creating the chain
    /// if needed. Returns the replaced entry.
    pub fn replace_current(&self, entry: ObjectVersion) -> Option<ObjectVersion> {
        let mut chains = self.chains.write();
        let chain = chains.entry(entry.key().to_owned()).or_default();
        mark_current(&entry);
        trace!(key = entry.key(), version_id = ?entry.version_id(), "replaced current version");
        match chain.last_mut() {
            Some(last) => {
                let previous = std::mem::replace(last, entry);
                if let Some(obj) = previous.as_object() {
                    obj.set_current(false);
                }
                Some(previous)
            }
            None => {
                chain.push(entry);
                None
            }
        }
    }

    /// Store `entry` as the null version and make it current. Any earlier
    /// null version of the key, wherever it sits in the chain, is removed
    /// and returned.
    pub fn put_null_version(&self, entry: ObjectVersion) -> Option<ObjectVersion> {
        let mut chains = self.chains.write();
        let chain = chains.entry(entry.key().to_owned()).or_default();
        let previous = chain
            .iter()
            .position(|v| matches_version(v, "null"))
            .map(|pos| chain.remove(pos));
        if let Some(obj) = previous.as_ref().and_then(ObjectVersion::as_object) {
            obj.set_current(false);
        }
        if let Some(obj) = chain.last().and_then(ObjectVersion::as_object) {
            obj.set_current(false);
        }
        mark_current(&entry);
        trace!(key = entry.key(), replaced = previous.is_some(), "stored null version");
        chain.push(entry);
        previous
    }

    /// Append a delete marker as the new current version.
    pub fn append_tombstone(&self, marker: S3DeleteMarker) {
        self.put(ObjectVersion::DeleteMarker(marker));
    }

    /// The current version of `key`.
    #[must_use]
    pub fn get_current(&self, key: &str) -> Option<ObjectVersion> {
        self.chains.read().get(key).and_then(|c| c.last().cloned())
    }

    /// The version of `key` whose ID is `version_id`. Versions stored
    /// without an ID answer to `"null"`.
    #[must_use]
    pub fn get_version(&self, key: &str, version_id: &str) -> Option<ObjectVersion> {
        self.chains
            .read()
            .get(key)?
            .iter()
            .find(|v| matches_version(v, version_id))
            .cloned()
    }

    /// The current version, or a specific one when `version_id` is given.
    #[must_use]
    pub fn get(&self, key: &str, version_id: Option<&str>) -> Option<ObjectVersion> {
        match version_id {
            Some(id) => self.get_version(key, id),
            None => self.get_current(key),
        }
    }

    /// The whole chain of `key`, oldest first.
    #[must_use]
    pub fn get_all_versions(&self, key: &str) -> Option<Vec<ObjectVersion>> {
        self.chains.read().get(key).cloned()
    }

    /// Permanently remove one version. Removing the last entry of a chain
    /// drops the key.
    pub fn remove_version(&self, key: &str, version_id: &str) -> Option<ObjectVersion> {
        let mut chains = self.chains.write();
        let chain = chains.get_mut(key)?;
        let pos = chain
            .iter()
            .position(|v| matches_version(v, version_id))?;
        let removed = chain.remove(pos);
        if chain.is_empty() {
            chains.remove(key);
        } else if let Some(last) = chain.last() {
            mark_current(last);
        }
        trace!(key, version_id, "removed version");
        Some(removed)
    }

    /// Drop the key and its whole chain.
    pub fn remove_key(&self, key: &str) -> Option<Vec<ObjectVersion>> {
        let removed = self.chains.write().remove(key);
        if removed.is_some() {
            trace!(key, "removed key");
        }
        removed
    }

    /// Snapshot of all keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.chains.read().keys().cloned().collect()
    }

    /// Snapshot of the current version of every key, in key order.
    #[must_use]
    pub fn current_entries(&self) -> Vec<ObjectVersion> {
        self.chains
            .read()
            .values()
            .filter_map(|chain| chain.last().cloned())
            .collect()
    }

    /// Sum of the sizes of all current versions. Delete markers count zero.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.current_entries()
            .iter()
            .filter_map(ObjectVersion::size)
            .sum()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    /// Whether the store has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }

    /// List current objects, skipping keys whose current version is a delete
    /// marker.
    #[must_use]
    pub fn list_objects(
        &self,
        prefix: &str,
        delimiter: &str,
        start_after: &str,
        max_keys: usize,
    ) -> ListResult {
        let objects = self
            .current_entries()
            .into_iter()
            .filter_map(|v| v.as_object().cloned());
        list_from_sorted(objects, prefix, delimiter, start_after, max_keys)
    }
}

fn matches_version(entry: &ObjectVersion, version_id: &str) -> bool {
    entry.version_id().unwrap_or("null") == version_id
}

fn mark_current(entry: &ObjectVersion) {
    if let Some(obj) = entry.as_object() {
        obj.set_current(true);
    }
}

/// Apply prefix, delimiter and pagination to objects sorted by key.
fn list_from_sorted(
    objects: impl Iterator<Item = Arc<S3Object>>,
    prefix: &str,
    delimiter: &str,
    start_after: &str,
    max_keys: usize,
) -> ListResult {
    let mut result = ListResult::default();
    if max_keys == 0 {
        return result;
    }
    let mut seen_prefixes = HashSet::new();
    let mut count = 0usize;
    let mut last_key: Option<String> = None;

    for obj in objects {
        // Skip keys at or before start_after.
        if !start_after.is_empty() && obj.key.as_str() <= start_after {
            continue;
        }
        if !obj.key.starts_with(prefix) {
            continue;
        }

        let common_prefix = (!delimiter.is_empty())
            .then(|| {
                let after_prefix = &obj.key[prefix.len()..];
                after_prefix
                    .find(delimiter)
                    .map(|pos| format!("{prefix}{}{delimiter}", &after_prefix[..pos]))
            })
            .flatten();

        if let Some(cp) = &common_prefix {
            if seen_prefixes.contains(cp) {
                continue;
            }
        }

        if count >= max_keys {
            result.is_truncated = true;
            break;
        }
        count += 1;
        last_key = Some(obj.key.clone());

        match common_prefix {
            Some(cp) => {
                seen_prefixes.insert(cp.clone());
                result.common_prefixes.push(cp);
            }
            None => result.objects.push(obj),
        }
    }

    if result.is_truncated {
        result.next_marker = last_key;
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
