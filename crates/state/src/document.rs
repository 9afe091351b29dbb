//! The persisted state document and its pure operations.

use mvault_storage::{ExtendedInfo, IdentityKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Cache manifest: what the engine believes lives in the cache tier, keyed
/// by absolute cache path.
pub type Manifest = BTreeMap<PathBuf, ManifestEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: IdentityKey,
    #[serde(flatten)]
    pub extended: ExtendedInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDocument {
    /// Identity keys waiting to be pinned into the cache, in request order.
    pub add_cache_updates: Vec<IdentityKey>,
    /// Identity keys waiting to be evicted from the cache, in request order.
    pub remove_cache_updates: Vec<IdentityKey>,
    /// Number of library changes since the last successful pass.
    pub media_library_update_request: u64,
    pub manifest: Manifest,
}

/// What a successful, non-dry-run pass hands back to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    /// Pending adds that were acted on (admitted, already cached or unresolvable).
    pub processed_adds: Vec<IdentityKey>,
    /// Pending removes that were acted on.
    pub processed_removes: Vec<IdentityKey>,
    /// Counter value observed when the pass started.
    pub observed_requests: u64,
    pub manifest: Manifest,
}

impl StateDocument {
    /// Queues keys for cache admission, cancelling any pending removal of the
    /// same keys. Returns how many keys were newly queued.
    pub fn request_add(&mut self, keys: impl IntoIterator<Item = IdentityKey>) -> usize {
        queue(&mut self.add_cache_updates, &mut self.remove_cache_updates, keys)
    }

    /// Queues keys for cache eviction, cancelling any pending admission of
    /// the same keys. Returns how many keys were newly queued.
    pub fn request_remove(&mut self, keys: impl IntoIterator<Item = IdentityKey>) -> usize {
        queue(&mut self.remove_cache_updates, &mut self.add_cache_updates, keys)
    }

    /// Records that the library changed.
    pub fn bump(&mut self) -> u64 {
        self.media_library_update_request = self.media_library_update_request.saturating_add(1);
        self.media_library_update_request
    }

    pub fn needs_sync(&self) -> bool {
        self.media_library_update_request > 0
    }

    /// Folds a finished pass into the document.
    ///
    /// Only the requests the pass actually processed are cleared, and only the
    /// change count it observed is subtracted, so anything queued while the
    /// pass was running survives for the next one.
    pub fn commit(&mut self, commit: Commit) {
        let adds: HashSet<_> = commit.processed_adds.iter().collect();
        let removes: HashSet<_> = commit.processed_removes.iter().collect();
        self.add_cache_updates.retain(|key| !adds.contains(key));
        self.remove_cache_updates.retain(|key| !removes.contains(key));
        self.media_library_update_request = self
            .media_library_update_request
            .saturating_sub(commit.observed_requests);
        self.manifest = commit.manifest;
    }
}

fn queue(
    into: &mut Vec<IdentityKey>,
    cancel: &mut Vec<IdentityKey>,
    keys: impl IntoIterator<Item = IdentityKey>,
) -> usize {
    let mut queued = 0;
    for key in keys {
        cancel.retain(|k| *k != key);
        if !into.contains(&key) {
            into.push(key);
            queued += 1;
        }
    }
    queued
}
