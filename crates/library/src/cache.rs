//! Cache admission and eviction.
//!
//! The expected cache is built greedily under a byte budget: surviving
//! current members first (in catalog order), then explicit pins in request
//! order, then, optionally, the most recently added source files. Admission
//! stops at the first item that does not fit; pins left over stay pending for
//! a later pass instead of pushing anything else out. Cache files whose
//! source is gone never count against the budget.

use crate::models::{MediaItem, MediaItemGroup};
use crate::scan::group_folders;
use mvault_config::{CacheSettings, MediaMatrix};
use mvault_state::{Manifest, ManifestEntry};
use mvault_storage::{IdentityKey, Tier, fs};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::instrument;

/// Inputs to [`compute_expected_cache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheInputs<'a> {
    /// Current cache catalog, with extended info and source references.
    pub current: &'a MediaItemGroup,
    /// Source catalog, with extended info.
    pub source: &'a MediaItemGroup,
    pub pending_add: &'a [IdentityKey],
    pub pending_remove: &'a [IdentityKey],
    pub settings: CacheSettings,
    pub matrix: &'a [MediaMatrix],
    pub cache_root: &'a Path,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedCache {
    pub items: MediaItemGroup,
    /// Pending adds that did not fit and stay queued.
    pub deferred: Vec<IdentityKey>,
    /// Pending adds that were acted on and can be cleared.
    pub processed_adds: Vec<IdentityKey>,
    /// Pending removes that were acted on and can be cleared.
    pub processed_removes: Vec<IdentityKey>,
    #[serde(skip)]
    pub manifest: Manifest,
}

struct Budget {
    limit: u64,
    used: u64,
}
impl Budget {
    /// Reserves room for `item`, returning `false` (and reserving nothing) if
    /// it does not fit.
    fn admit(&mut self, item: &MediaItem) -> bool {
        let Some(size) = item.size() else {
            tracing::warn!(path = %item.path.display(), "Size unknown; not admitting to cache");
            return false;
        };
        match self.used.checked_add(size) {
            Some(total) if total <= self.limit => {
                self.used = total;
                true
            },
            _ => false,
        }
    }
}

#[instrument(level = "debug", skip_all, fields(budget = inputs.settings.budget, latest = inputs.settings.latest))]
pub fn compute_expected_cache(inputs: CacheInputs<'_>) -> ExpectedCache {
    let mut budget = Budget {
        limit: inputs.settings.budget,
        used: 0,
    };
    let mut expected: Vec<MediaItem> = Vec::new();
    let mut present: HashSet<IdentityKey> = HashSet::new();

    let removals: HashSet<&IdentityKey> = inputs.pending_remove.iter().collect();
    for item in inputs.current {
        // Left out of the budget; planning deletes it as an orphan.
        if item.source.is_none() {
            tracing::debug!(path = %item.path.display(), "Evicting; no source counterpart");
            continue;
        }
        if removals.contains(&item.key) {
            tracing::debug!(key = %item.key, "Evicting on request");
            continue;
        }
        if present.contains(&item.key) {
            tracing::debug!(path = %item.path.display(), "Evicting duplicate copy");
            continue;
        }
        if !budget.admit(item) {
            tracing::info!(key = %item.key, "Evicting; cache budget exceeded");
            continue;
        }
        present.insert(item.key.clone());
        expected.push(item.clone());
    }

    let sources = inputs.source.first_by_key();
    let mut result = ExpectedCache {
        processed_removes: inputs.pending_remove.to_vec(),
        ..ExpectedCache::default()
    };
    for (i, key) in inputs.pending_add.iter().enumerate() {
        if present.contains(key) {
            result.processed_adds.push(key.clone());
            continue;
        }
        let Some(source) = sources.get(key) else {
            tracing::warn!(%key, "Requested file is not in the source tier; dropping request");
            result.processed_adds.push(key.clone());
            continue;
        };
        let candidate = cache_copy(source, inputs.cache_root);
        if !budget.admit(&candidate) {
            tracing::info!(%key, deferred = inputs.pending_add.len() - i, "Cache budget reached; deferring requests");
            result.deferred = inputs.pending_add[i..].to_vec();
            break;
        }
        present.insert(key.clone());
        expected.push(candidate);
        result.processed_adds.push(key.clone());
    }

    if inputs.settings.latest && result.deferred.is_empty() {
        let mut seen = HashSet::new();
        let mut newest: Vec<&MediaItem> = inputs.source.iter().filter(|s| seen.insert(&s.key)).collect();
        // Stable, so equal timestamps keep catalog order.
        newest.sort_by(|a, b| b.extended.map(|e| e.created).cmp(&a.extended.map(|e| e.created)));
        for source in newest {
            if present.contains(&source.key) {
                continue;
            }
            let candidate = cache_copy(source, inputs.cache_root);
            if !budget.admit(&candidate) {
                break;
            }
            present.insert(source.key.clone());
            expected.push(candidate);
        }
    }

    for item in &expected {
        if let Some(extended) = item.extended {
            result.manifest.insert(
                item.path.clone(),
                ManifestEntry {
                    key: item.key.clone(),
                    extended,
                },
            );
        }
    }
    tracing::debug!(items = expected.len(), bytes = budget.used, "Computed expected cache");
    result.items = MediaItemGroup::new(group_folders(Tier::Cache, inputs.cache_root, inputs.matrix), expected);
    result
}

/// The cache tier counterpart of a source item.
fn cache_copy(source: &MediaItem, cache_root: &Path) -> MediaItem {
    let path = cache_root
        .join(format!("{}-{}", source.media_prefix(), source.quality))
        .join(source.title())
        .join(source.relative_title_filepath());
    MediaItem {
        tier: Tier::Cache,
        path,
        source: Some(source.as_source()),
        ..source.clone()
    }
}

/// Attaches to every cache item its counterpart in the source catalog.
pub fn link_sources(cache: &mut MediaItemGroup, source: &MediaItemGroup) {
    let sources = source.first_by_key();
    for item in &mut cache.items {
        if item.source.is_none() {
            item.source = sources.get(&item.key).map(|s| s.as_source());
        }
    }
}

/// Fills in extended info for cache items, trusting the manifest for files
/// it already knows about and `stat`ing the rest. Files that cannot be
/// `stat`ed are dropped from the catalog.
pub fn hydrate(cache: &mut MediaItemGroup, manifest: &Manifest) {
    let mut known = 0usize;
    cache.items.retain_mut(|item| {
        if item.extended.is_some() {
            return true;
        }
        if let Some(entry) = manifest.get(&item.path).filter(|entry| entry.key == item.key) {
            item.extended = Some(entry.extended);
            known += 1;
            return true;
        }
        match fs::stat(&item.path) {
            Ok(info) => {
                item.extended = Some(info);
                true
            },
            Err(e) => {
                tracing::warn!(path = %item.path.display(), error = %e, "Dropping unreadable cache file");
                false
            },
        }
    });
    tracing::trace!(known, total = cache.len(), "Hydrated cache catalog");
}
