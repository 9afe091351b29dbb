//! Requests that queue work for the next pass, and read-only listings.
//!
//! Nothing here touches the cache or merged tiers; requests only update the
//! state document, which the next [`sync`](Engine::sync) folds in.

use crate::engine::Engine;
use crate::error::{ErrorKind, Result};
use crate::models::MediaItemGroup;
use crate::scan::{MediaFilter, ScanEffort, scan};
use mvault_state::StateDocument;
use mvault_storage::{IdentityKey, Tier};

impl Engine {
    /// Pins every source file matching `filter` into the cache.
    ///
    /// Returns the matched identity keys in catalog order. On a dry run the
    /// state document is left alone.
    pub fn request_cache_add(&self, filter: &MediaFilter, dry_run: bool) -> Result<Vec<IdentityKey>> {
        let keys = self.matching_keys(Tier::Source, filter)?;
        if !dry_run && !keys.is_empty() {
            let queued = self
                .store
                .update(|document| {
                    let queued = document.request_add(keys.iter().cloned());
                    document.bump();
                    queued
                })
                .map_err(ErrorKind::state)?;
            tracing::info!(matched = keys.len(), queued, "Queued cache admissions");
        }
        Ok(keys)
    }

    /// Unpins every cached file matching `filter`.
    ///
    /// Returns the matched identity keys in catalog order. On a dry run the
    /// state document is left alone.
    pub fn request_cache_remove(&self, filter: &MediaFilter, dry_run: bool) -> Result<Vec<IdentityKey>> {
        let keys = self.matching_keys(Tier::Cache, filter)?;
        if !dry_run && !keys.is_empty() {
            let queued = self
                .store
                .update(|document| {
                    let queued = document.request_remove(keys.iter().cloned());
                    document.bump();
                    queued
                })
                .map_err(ErrorKind::state)?;
            tracing::info!(matched = keys.len(), queued, "Queued cache evictions");
        }
        Ok(keys)
    }

    /// Records that the source library changed, so the next unforced pass runs.
    pub fn library_changed(&self) -> Result<u64> {
        let count = self.store.update(StateDocument::bump).map_err(ErrorKind::state)?;
        tracing::debug!(count, "Library change recorded");
        Ok(count)
    }

    /// Catalogs what is currently on disk in `tier`.
    pub fn list(&self, tier: Tier, filter: &MediaFilter) -> Result<MediaItemGroup> {
        let root = self.config.tiers.root(tier).ok_or(ErrorKind::TierUnavailable(tier))?;
        Ok(scan(tier, root, &self.config.matrix, filter, ScanEffort::Extended))
    }

    /// The state document: pending requests, change counter and manifest.
    pub fn pending(&self) -> Result<StateDocument> {
        self.store.load().map_err(ErrorKind::state)
    }

    fn matching_keys(&self, tier: Tier, filter: &MediaFilter) -> Result<Vec<IdentityKey>> {
        let root = self.config.tiers.root(tier).ok_or(ErrorKind::TierUnavailable(tier))?;
        Ok(scan(tier, root, &self.config.matrix, filter, ScanEffort::Quick).keys())
    }
}
