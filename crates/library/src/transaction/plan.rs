use crate::models::{MediaItem, MediaItemGroup, SourceRef};
use crate::transaction::{ExistingFileAction, FileTransaction, TransactionKind};
use mvault_storage::{SIDECAR_EXTENSION, Tier, fs};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Everything [`plan`] diffs.
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub expected_cache: &'a MediaItemGroup,
    pub expected_merged: &'a MediaItemGroup,
    /// Source catalog that cache and merged items refer back to.
    pub sources: &'a MediaItemGroup,
    /// Every file currently below the cache and merged roots.
    pub actual: &'a [PathBuf],
}

/// Lists every file below the given roots (missing roots are empty).
pub fn snapshot(roots: &[&Path]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        for file in fs::Walk::new(root) {
            match file {
                Ok(path) => files.push(path),
                Err(e) => tracing::warn!(root = %root.display(), error = %e, "Skipping unreadable entry"),
            }
        }
    }
    files
}

/// Plans the transactions that turn the actual cache and merged tiers into
/// the expected ones.
///
/// Cache items are copied from their source and merged items hard-linked,
/// both with [`ExistingFileAction::SkipIfSameSize`] so that an unchanged
/// library plans no physical work. Expected items whose source cannot be
/// resolved are deleted, as is every file on disk that no copy or link
/// targets. Sidecars are only deleted on their own when their media file is
/// gone; otherwise they follow the media file.
#[instrument(level = "debug", skip_all, fields(actual = inputs.actual.len()))]
pub fn plan(inputs: PlanInputs<'_>) -> Vec<FileTransaction> {
    let actual: HashSet<&Path> = inputs.actual.iter().map(PathBuf::as_path).collect();
    let mut transactions = Vec::new();
    let mut keep: HashSet<&Path> = HashSet::new();
    let mut deleted: HashSet<&Path> = HashSet::new();

    for item in inputs.expected_cache {
        match item.source.as_ref().and_then(|r| inputs.sources.find(r)) {
            Some(source) => {
                keep.insert(item.path.as_path());
                transactions.push(
                    FileTransaction::transfer(
                        TransactionKind::Copy,
                        &source.path,
                        &item.path,
                        ExistingFileAction::SkipIfSameSize,
                    )
                    .with_metadata(item.clone()),
                );
            },
            None => {
                tracing::debug!(path = %item.path.display(), "Cache item has no source; deleting");
                if deleted.insert(item.path.as_path()) {
                    transactions.push(FileTransaction::delete(&item.path));
                }
            },
        }
    }

    for item in inputs.expected_merged {
        match item.source.as_ref().and_then(|r| link_source(r, &inputs, &actual, &keep)) {
            Some(source) => {
                keep.insert(item.path.as_path());
                transactions.push(
                    FileTransaction::transfer(TransactionKind::Link, source, &item.path, ExistingFileAction::SkipIfSameSize)
                        .with_metadata(item.clone()),
                );
            },
            None => {
                tracing::debug!(path = %item.path.display(), "Merged item has no source; deleting");
                if deleted.insert(item.path.as_path()) {
                    transactions.push(FileTransaction::delete(&item.path));
                }
            },
        }
    }

    for path in inputs.actual {
        if keep.contains(path.as_path()) || deleted.contains(path.as_path()) {
            continue;
        }
        if let Some(media) = sidecar_owner(path)
            && (keep.contains(media.as_path()) || actual.contains(media.as_path()))
        {
            continue;
        }
        transactions.push(FileTransaction::delete(path));
    }
    tracing::debug!(transactions = transactions.len(), "Planned transactions");
    transactions
}

/// Where a merged item should be hard-linked from.
///
/// A cache copy is only usable once it is on disk and being kept; until then
/// the link falls back to the cache copy's own source. Links run before
/// copies, so a newly admitted cache copy takes two passes to settle: the
/// first copies it and links the merged file to the source tier, the second
/// re-links onto the cache copy. Only the pass after that plans no work.
fn link_source<'a>(
    reference: &SourceRef,
    inputs: &PlanInputs<'a>,
    actual: &HashSet<&Path>,
    keep: &HashSet<&Path>,
) -> Option<&'a Path> {
    match reference.tier {
        Tier::Source => inputs.sources.find(reference).map(|s| s.path.as_path()),
        Tier::Cache => {
            let cached: &MediaItem = inputs.expected_cache.find(reference)?;
            if actual.contains(cached.path.as_path()) && keep.contains(cached.path.as_path()) {
                return Some(&cached.path);
            }
            let source = cached.source.as_ref()?;
            inputs.sources.find(source).map(|s| s.path.as_path())
        },
        Tier::Merged => None,
    }
}

/// The media file a sidecar path belongs to, if `path` is a sidecar.
fn sidecar_owner(path: &Path) -> Option<PathBuf> {
    if path.extension()? != SIDECAR_EXTENSION {
        return None;
    }
    Some(path.with_extension(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{group, item};

    fn cache_item(key: &str, source: Option<&MediaItem>) -> MediaItem {
        let mut cached = item(Tier::Cache, "hd", key, 1);
        cached.source = source.map(MediaItem::as_source);
        cached
    }

    fn merged_item(key: &str, source: &MediaItem) -> MediaItem {
        let mut merged = item(Tier::Merged, "merged", key, 1);
        merged.source = Some(source.as_source());
        merged
    }

    fn summarize(transactions: &[FileTransaction]) -> Vec<(TransactionKind, String, Option<String>)> {
        transactions
            .iter()
            .map(|t| {
                (
                    t.kind,
                    t.source.display().to_string(),
                    t.destination.as_ref().map(|d| d.display().to_string()),
                )
            })
            .collect()
    }

    #[test]
    fn test_copies_links_and_orphans() {
        let source = item(Tier::Source, "hd", "tv/A/1.mkv", 1);
        let sources = group(vec![source.clone()]);
        let cache = group(vec![cache_item("tv/A/1.mkv", Some(&source))]);
        let merged = group(vec![merged_item("tv/A/1.mkv", &source)]);
        let actual = vec![
            PathBuf::from("/cache/tv-hd/A/1.mkv.meta"),
            PathBuf::from("/cache/tv-hd/Old/1.mkv"),
            PathBuf::from("/merged/tv-merged/Gone/1.mkv"),
            PathBuf::from("/merged/tv-merged/Gone/1.mkv.meta"),
            PathBuf::from("/merged/tv-merged/stray.meta"),
        ];
        let transactions = plan(PlanInputs {
            expected_cache: &cache,
            expected_merged: &merged,
            sources: &sources,
            actual: &actual,
        });
        assert_eq!(
            summarize(&transactions),
            vec![
                (
                    TransactionKind::Copy,
                    "/source/tv-hd/A/1.mkv".into(),
                    Some("/cache/tv-hd/A/1.mkv".into())
                ),
                (
                    TransactionKind::Link,
                    "/source/tv-hd/A/1.mkv".into(),
                    Some("/merged/tv-merged/A/1.mkv".into())
                ),
                (TransactionKind::Delete, "/cache/tv-hd/Old/1.mkv".into(), None),
                (TransactionKind::Delete, "/merged/tv-merged/Gone/1.mkv".into(), None),
                (TransactionKind::Delete, "/merged/tv-merged/stray.meta".into(), None),
            ]
        );
        assert!(transactions[..2].iter().all(|t| t.existing == ExistingFileAction::SkipIfSameSize));
        assert!(transactions[0].metadata.is_some());
    }

    #[test]
    fn test_unresolvable_source_deletes_target() {
        let cache = group(vec![cache_item("tv/A/1.mkv", None)]);
        let actual = vec![PathBuf::from("/cache/tv-hd/A/1.mkv")];
        let transactions = plan(PlanInputs {
            expected_cache: &cache,
            expected_merged: &MediaItemGroup::default(),
            sources: &MediaItemGroup::default(),
            actual: &actual,
        });
        assert_eq!(
            summarize(&transactions),
            vec![(TransactionKind::Delete, "/cache/tv-hd/A/1.mkv".into(), None)]
        );
    }

    #[test]
    fn test_link_prefers_cache_copy_on_disk() {
        let source = item(Tier::Source, "hd", "tv/A/1.mkv", 1);
        let cached = cache_item("tv/A/1.mkv", Some(&source));
        let sources = group(vec![source]);
        let cache = group(vec![cached.clone()]);
        let merged = group(vec![merged_item("tv/A/1.mkv", &cached)]);
        let link = |actual: &[PathBuf]| {
            plan(PlanInputs {
                expected_cache: &cache,
                expected_merged: &merged,
                sources: &sources,
                actual,
            })
            .into_iter()
            .find(|t| t.kind == TransactionKind::Link)
            .unwrap()
            .source
        };
        // Not copied yet: link from the source tier for now.
        assert_eq!(link(&[]), PathBuf::from("/source/tv-hd/A/1.mkv"));
        assert_eq!(link(&[cached.path.clone()]), PathBuf::from("/cache/tv-hd/A/1.mkv"));
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_skips_unreadable_folders() {
        use crate::test_support::touch;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let cache = temp.path().join("cache");
        let merged = temp.path().join("merged");
        let kept = touch(&cache, "tv-hd/A/1.mkv", 1);
        touch(&cache, "tv-hd/B/1.mkv", 1);
        let linked = touch(&merged, "tv-merged/A/1.mkv", 1);
        let locked = cache.join("tv-hd/B");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let enforced = std::fs::read_dir(&locked).is_err();

        let files = snapshot(&[&cache, &merged, &temp.path().join("missing")]);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if enforced {
            assert_eq!(files, vec![kept, linked]);
        }
    }

    #[test]
    fn test_sidecar_owner() {
        assert_eq!(sidecar_owner(Path::new("/c/a.mkv.meta")), Some(PathBuf::from("/c/a.mkv")));
        assert_eq!(sidecar_owner(Path::new("/c/a.mkv")), None);
    }
}
