//! The reconciliation pass.
//!
//! One call to [`Engine::sync`] catalogs the source and cache tiers, computes
//! the expected cache and merged view, plans the difference against what is
//! on disk, applies it, and (unless it was a dry run) commits the processed
//! requests to the state store and notifies the media server. No intermediate
//! state is persisted; a pass that fails anywhere leaves the state document
//! untouched and the next pass re-plans from whatever is on disk.

pub mod error;

use crate::cache::{CacheInputs, compute_expected_cache, hydrate, link_sources};
use crate::engine::Engine;
use crate::merge::resolve_merged_view;
use crate::models::MediaItemGroup;
use crate::notify::RefreshOutcome;
use crate::scan::{MediaFilter, ScanEffort, scan};
use crate::sync::error::{ErrorKind, Result};
use crate::transaction::{
    ApplyFailure, ApplyOptions, FileSequenceTransaction, FileTransactionSummary, PlanInputs, apply, plan, snapshot,
};
use mvault_state::Commit;
use mvault_storage::{IdentityKey, Tier};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// How much of a pass the [`SyncResult`] reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    None,
    /// The transaction summary.
    #[default]
    Summary,
    /// The summary plus the expected cache and merged view.
    Full,
    /// The summary plus the raw sequence log.
    Sequence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub detail: Detail,
    /// Run even when no library change has been recorded.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing changed since the last pass.
    Skipped,
    DryRun,
    Applied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<FileTransactionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_cache: Option<MediaItemGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_merged: Option<MediaItemGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Vec<FileSequenceTransaction>>,
    /// Pinned keys that did not fit the cache budget and stay queued.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<IdentityKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<RefreshOutcome>,
}
impl SyncResult {
    fn skipped() -> Self {
        Self {
            status: SyncStatus::Skipped,
            summary: None,
            expected_cache: None,
            expected_merged: None,
            sequence: None,
            deferred: Vec::new(),
            notification: None,
        }
    }
}

impl Engine {
    /// Runs one reconciliation pass.
    ///
    /// Without `force`, the pass is skipped unless a library change or cache
    /// request has been recorded since the last successful pass.
    #[instrument(level = "info", skip_all, fields(dry_run = options.dry_run, force = options.force))]
    pub fn sync(&self, options: SyncOptions) -> Result<SyncResult> {
        let state = self.store.load().map_err(ErrorKind::state)?;
        if !state.needs_sync() && !options.force {
            tracing::debug!("No library changes recorded; skipping");
            return Ok(SyncResult::skipped());
        }

        let tiers = &self.config.tiers;
        let matrix = &self.config.matrix;
        let settings = self.config.cache;
        let effort = match settings.budget > 0 || settings.latest {
            true => ScanEffort::Extended,
            false => ScanEffort::Quick,
        };
        let all = MediaFilter::all();
        let source = scan(Tier::Source, &tiers.source, matrix, &all, effort);
        let mut cache = scan(Tier::Cache, &tiers.cache, matrix, &all, ScanEffort::Quick);
        hydrate(&mut cache, &state.manifest);
        link_sources(&mut cache, &source);

        let expected = compute_expected_cache(CacheInputs {
            current: &cache,
            source: &source,
            pending_add: &state.add_cache_updates,
            pending_remove: &state.remove_cache_updates,
            settings,
            matrix,
            cache_root: &tiers.cache,
        });
        let merged = match &tiers.merged {
            Some(root) => resolve_merged_view(&source, &expected.items, matrix, root),
            None => MediaItemGroup::default(),
        };

        let mut roots = vec![tiers.cache.as_path()];
        roots.extend(tiers.merged.as_deref());
        let actual = snapshot(&roots);
        let transactions = plan(PlanInputs {
            expected_cache: &expected.items,
            expected_merged: &merged,
            sources: &source,
            actual: &actual,
        });
        let report = match apply(transactions, ApplyOptions::new(self.config.transactions, options.dry_run), &roots) {
            Ok(report) => report,
            Err(ApplyFailure { report, error }) => return Err(error.raise(ErrorKind::Apply(report))),
        };

        let mut notification = None;
        let status = match options.dry_run {
            true => SyncStatus::DryRun,
            false => {
                let commit = Commit {
                    processed_adds: expected.processed_adds.clone(),
                    processed_removes: expected.processed_removes.clone(),
                    observed_requests: state.media_library_update_request,
                    manifest: expected.manifest.clone(),
                };
                self.store.update(|document| document.commit(commit)).map_err(ErrorKind::state)?;
                notification = Some(self.server.refresh_library());
                SyncStatus::Applied
            },
        };
        tracing::info!(
            status = ?status,
            cached = expected.items.len(),
            merged = merged.len(),
            deferred = expected.deferred.len(),
            "Reconciliation pass finished"
        );

        let mut result = SyncResult {
            status,
            summary: None,
            expected_cache: None,
            expected_merged: None,
            sequence: None,
            deferred: expected.deferred,
            notification,
        };
        match options.detail {
            Detail::None => {},
            Detail::Summary => result.summary = Some(report.summary),
            Detail::Full => {
                result.summary = Some(report.summary);
                result.expected_cache = Some(expected.items);
                result.expected_merged = Some(merged);
            },
            Detail::Sequence => {
                result.summary = Some(report.summary);
                result.sequence = Some(report.sequence);
            },
        }
        Ok(result)
    }
}
