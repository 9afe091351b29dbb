//! Quality-ranked merge resolver.
//!
//! For every media type with a merge target, the merged view holds one copy
//! of each title folder: the files of the best-ranked quality that exists for
//! it. Ranking is first-match-wins per folder, so if `uhd` holds even one file
//! of `ShowA/Season 01`, every `hd` file of that folder is left out.

use crate::models::{MediaItem, MediaItemGroup};
use crate::scan::group_folders;
use mvault_config::MediaMatrix;
use mvault_storage::{IdentityKey, Tier};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Builds the expected contents of the merged tier rooted at `merged_root`.
///
/// `cache` is the expected (not necessarily applied) cache; with `use_cache`
/// set, a cache copy with the same identity key becomes the link source in
/// place of the source-tier file.
#[instrument(level = "debug", skip_all, fields(merged_root = %merged_root.display()))]
pub fn resolve_merged_view(
    source: &MediaItemGroup,
    cache: &MediaItemGroup,
    matrix: &[MediaMatrix],
    merged_root: &Path,
) -> MediaItemGroup {
    let cached = cache.first_by_key();
    let mut items = Vec::new();
    for entry in matrix {
        let Some(merge) = entry.merge.as_ref().filter(|_| entry.exports()) else {
            continue;
        };
        let candidates: Vec<(&MediaItem, usize)> = source
            .iter()
            .filter(|item| item.media_type == entry.media_type && item.media_prefix() == entry.prefix)
            .filter_map(|item| entry.rank(&item.quality).map(|rank| (item, rank)))
            .collect();

        let mut best: HashMap<(&str, &Path), usize> = HashMap::new();
        for (item, rank) in &candidates {
            let group = (item.title(), item.key.relative_folder());
            best.entry(group).and_modify(|b| *b = (*b).min(*rank)).or_insert(*rank);
        }

        let folder = merged_root.join(merge.folder_name());
        for (item, rank) in candidates {
            if best[&(item.title(), item.key.relative_folder())] != rank {
                continue;
            }
            let key = match IdentityKey::new(&merge.prefix, item.title(), item.relative_title_filepath()) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(path = %item.path.display(), error = %e, "Skipping file that cannot be merged");
                    continue;
                },
            };
            let origin = match entry.use_cache {
                true => cached.get(&item.key).copied().unwrap_or(item),
                false => item,
            };
            items.push(MediaItem {
                tier: Tier::Merged,
                media_type: entry.media_type.clone(),
                quality: merge.quality.clone(),
                path: destination(&folder, &key),
                key,
                season: item.season,
                episode: item.episode,
                extended: origin.extended,
                source: Some(origin.as_source()),
            });
        }
    }
    tracing::debug!(items = items.len(), "Resolved merged view");
    MediaItemGroup::new(group_folders(Tier::Merged, merged_root, matrix), items)
}

fn destination(folder: &Path, key: &IdentityKey) -> PathBuf {
    folder.join(key.title()).join(key.relative())
}
