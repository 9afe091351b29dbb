//! Media catalog scanner.
//!
//! Walks the `{prefix}-{quality}` folders of one tier and turns every file
//! below a title folder into a [`MediaItem`]. Cataloging is best-effort: a
//! missing tier root or quality folder is simply empty, and files that
//! cannot be read are skipped with a warning.

mod filter;

pub use self::filter::MediaFilter;

use crate::models::{MediaGroupFolder, MediaItem, MediaItemGroup};
use mvault_config::MediaMatrix;
use mvault_storage::{IdentityKey, SIDECAR_EXTENSION, Tier, fs};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::instrument;

static EPISODE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)S(\d{2})E(\d{2})").unwrap());

/// How much work a scan should do per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEffort {
    /// Paths only; no `stat` calls.
    Quick,
    /// Also gather [`ExtendedInfo`](mvault_storage::ExtendedInfo) for every file.
    Extended,
}

/// The quality folders a tier is expected to contain, in scan order.
///
/// Source and cache tiers hold one folder per quality of every media type,
/// listed in rank order. The merged tier holds one folder per merge target.
/// Folders shared by several matrix entries are listed once.
pub fn group_folders(tier: Tier, root: &Path, matrix: &[MediaMatrix]) -> Vec<MediaGroupFolder> {
    let mut seen = HashSet::new();
    let mut folders = Vec::new();
    for entry in matrix {
        let pairs: Vec<(&str, &str)> = match tier {
            Tier::Merged => entry.merge.iter().map(|m| (m.prefix.as_str(), m.quality.as_str())).collect(),
            Tier::Source | Tier::Cache => entry.quality_order.iter().map(|q| (entry.prefix.as_str(), q.as_str())).collect(),
        };
        for (prefix, quality) in pairs {
            if !seen.insert((prefix.to_string(), quality.to_string())) {
                continue;
            }
            folders.push(MediaGroupFolder {
                tier,
                media_type: entry.media_type.clone(),
                prefix: prefix.to_string(),
                quality: quality.to_string(),
                path: root.join(format!("{prefix}-{quality}")),
                cache_export: entry.exports(),
            });
        }
    }
    folders
}

/// Catalogs every file of `tier` below `root` that matches `filter`.
#[instrument(level = "debug", skip(root, matrix, filter), fields(root = %root.display()))]
pub fn scan(tier: Tier, root: &Path, matrix: &[MediaMatrix], filter: &MediaFilter, effort: ScanEffort) -> MediaItemGroup {
    let folders = group_folders(tier, root, matrix);
    let mut items = Vec::new();
    for folder in &folders {
        if !filter.matches_folder(folder) {
            continue;
        }
        let episodic = matrix.iter().any(|m| m.media_type == folder.media_type && m.is_episodic());
        scan_folder(folder, episodic, filter, effort, &mut items);
    }
    tracing::debug!(%tier, folders = folders.len(), items = items.len(), "Scanned tier");
    MediaItemGroup::new(folders, items)
}

fn scan_folder(
    folder: &MediaGroupFolder,
    episodic: bool,
    filter: &MediaFilter,
    effort: ScanEffort,
    items: &mut Vec<MediaItem>,
) {
    let titles = match fs::subdirectories(&folder.path) {
        Ok(titles) => titles,
        Err(e) => {
            tracing::warn!(path = %folder.path.display(), error = %e, "Skipping unreadable quality folder");
            return;
        },
    };
    for title_path in titles {
        let Some(title) = title_path.file_name().and_then(|t| t.to_str()) else {
            tracing::warn!(path = %title_path.display(), "Skipping title folder with a non UTF-8 name");
            continue;
        };
        if filter.key.as_ref().is_some_and(|k| k.title() != title) {
            continue;
        }
        for file in fs::Walk::new(&title_path) {
            let path = match file {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry");
                    continue;
                },
            };
            if path.extension().is_some_and(|e| e == SIDECAR_EXTENSION) {
                continue;
            }
            if let Some(item) = catalog_file(folder, title, &title_path, &path, episodic, effort)
                && filter.matches(&item)
            {
                items.push(item);
            }
        }
    }
}

fn catalog_file(
    folder: &MediaGroupFolder,
    title: &str,
    title_path: &Path,
    path: &Path,
    episodic: bool,
    effort: ScanEffort,
) -> Option<MediaItem> {
    let relative = path.strip_prefix(title_path).ok()?;
    let key = match IdentityKey::new(&folder.prefix, title, relative) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping file that cannot be identified");
            return None;
        },
    };
    let extended = match effort {
        ScanEffort::Quick => None,
        ScanEffort::Extended => match fs::stat(path) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping file that cannot be read");
                return None;
            },
        },
    };
    let (season, episode) = match episodic {
        true => parse_episode(path),
        false => (None, None),
    };
    Some(MediaItem {
        tier: folder.tier,
        media_type: folder.media_type.clone(),
        quality: folder.quality.clone(),
        key,
        path: path.to_path_buf(),
        season,
        episode,
        extended,
        source: None,
    })
}

/// Season and episode numbers from an `S01E02`-style file name.
fn parse_episode(path: &Path) -> (Option<u32>, Option<u32>) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return (None, None);
    };
    match EPISODE_REGEX.captures(name) {
        Some(captures) => (
            captures.get(1).and_then(|s| s.as_str().parse().ok()),
            captures.get(2).and_then(|e| e.as_str().parse().ok()),
        ),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{matrix, touch};
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case("The.Show.S01E02.mkv", Some(1), Some(2))]
    #[case("the.show.s10e21.1080p.mkv", Some(10), Some(21))]
    #[case("Show - S1E2.mkv", None, None)]
    #[case("Film (2020).mkv", None, None)]
    fn test_parse_episode(#[case] name: &str, #[case] season: Option<u32>, #[case] episode: Option<u32>) {
        assert_eq!(parse_episode(Path::new(name)), (season, episode));
    }

    #[test]
    fn test_group_folders() {
        let matrix = matrix();
        let source = group_folders(Tier::Source, Path::new("/s"), &matrix);
        let names: Vec<_> = source.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/s/tv-uhd"),
                PathBuf::from("/s/tv-hd"),
                PathBuf::from("/s/movie-hd"),
            ]
        );
        assert!(source[0].cache_export);
        assert!(!source[2].cache_export);
        let merged = group_folders(Tier::Merged, Path::new("/m"), &matrix);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].path, PathBuf::from("/m/tv-merged"));
        assert_eq!(merged[0].quality, "merged");
    }

    #[test]
    fn test_scan_catalogs_titles() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        touch(root, "tv-uhd/ShowA/Season 01/ShowA.S01E01.mkv", 4);
        touch(root, "tv-uhd/ShowA/Season 01/ShowA.S01E01.mkv.meta", 1);
        touch(root, "tv-hd/ShowA/Season 01/ShowA.S01E01.mkv", 2);
        touch(root, "tv-hd/loose-file.mkv", 1);
        touch(root, "movie-hd/Film (2020)/Film.mkv", 3);
        touch(root, "unrelated-folder/Other/file.mkv", 1);

        let catalog = scan(Tier::Source, root, &matrix(), &MediaFilter::all(), ScanEffort::Quick);
        let keys: Vec<_> = catalog.iter().map(|i| (i.quality.as_str(), i.key.to_string())).collect();
        assert_eq!(
            keys,
            vec![
                ("uhd", "tv/ShowA/Season 01/ShowA.S01E01.mkv".to_string()),
                ("hd", "tv/ShowA/Season 01/ShowA.S01E01.mkv".to_string()),
                ("hd", "movie/Film (2020)/Film.mkv".to_string()),
            ]
        );
        let first = &catalog.items[0];
        assert_eq!((first.season, first.episode), (Some(1), Some(1)));
        assert_eq!(first.extended, None);
        assert_eq!(first.path, root.join("tv-uhd/ShowA/Season 01/ShowA.S01E01.mkv"));
        assert_eq!(first.relative_title_filepath(), Path::new("Season 01/ShowA.S01E01.mkv"));
        assert_eq!(catalog.items[2].season, None);
    }

    #[test]
    fn test_scan_extended_and_filtered() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        touch(root, "tv-uhd/ShowA/ep1.mkv", 4);
        touch(root, "tv-hd/ShowB/ep1.mkv", 2);
        let filter = MediaFilter {
            quality: Some("hd".into()),
            ..MediaFilter::all()
        };
        let catalog = scan(Tier::Source, root, &matrix(), &filter, ScanEffort::Extended);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.items[0].title(), "ShowB");
        assert_eq!(catalog.items[0].size(), Some(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_unreadable_folders() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        touch(root, "tv-hd/ShowA/ep1.mkv", 1);
        touch(root, "tv-hd/ShowB/ep1.mkv", 1);
        touch(root, "tv-hd/ShowC/ep1.mkv", 1);
        touch(root, "movie-hd/Film/film.mkv", 1);
        let locked = [root.join("tv-hd/ShowB"), root.join("movie-hd")];
        for dir in &locked {
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o000)).unwrap();
        }
        // Permission bits do not bind a privileged user.
        let enforced = std::fs::read_dir(&locked[0]).is_err();

        let catalog = scan(Tier::Source, root, &matrix(), &MediaFilter::all(), ScanEffort::Extended);
        for dir in &locked {
            std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        if !enforced {
            return;
        }
        let titles: Vec<_> = catalog.iter().map(MediaItem::title).collect();
        assert_eq!(titles, vec!["ShowA", "ShowC"]);
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = scan(
            Tier::Cache,
            &temp.path().join("missing"),
            &matrix(),
            &MediaFilter::all(),
            ScanEffort::Extended,
        );
        assert!(catalog.is_empty());
        assert_eq!(catalog.folders.len(), 3);
    }
}
