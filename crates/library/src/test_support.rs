//! On-disk fixtures for tests that run against real tier directories.

use mvault_config::{
    CacheSettings, Config, DEFAULT_MERGE_QUALITY, MediaMatrix, MergeTarget, TierPaths, TransactionSettings,
};
use std::fs;
use std::path::{Path, PathBuf};

/// `tv` ranked `uhd` over `hd` and merged into `tv-merged`; `movie` only in
/// `hd` and never merged.
pub(crate) fn matrix() -> Vec<MediaMatrix> {
    vec![
        MediaMatrix {
            media_type: "tv".into(),
            prefix: "tv".into(),
            quality_order: vec!["uhd".into(), "hd".into()],
            merge: Some(MergeTarget {
                prefix: "tv".into(),
                quality: DEFAULT_MERGE_QUALITY.into(),
            }),
            use_cache: false,
        },
        MediaMatrix {
            media_type: "movie".into(),
            prefix: "movie".into(),
            quality_order: vec!["hd".into()],
            merge: None,
            use_cache: false,
        },
    ]
}

/// Writes a file of `size` bytes at `root/relative`, creating parents.
pub(crate) fn touch(root: &Path, relative: &str, size: usize) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, vec![b'x'; size]).unwrap();
    path
}

/// Tiers below `root` (`source`, `cache`, `merged`, `state`) with the
/// [`matrix`] and a cache budget of `budget` bytes.
pub(crate) fn config(root: &Path, budget: u64) -> Config {
    Config {
        tiers: TierPaths {
            source: root.join("source"),
            cache: root.join("cache"),
            merged: Some(root.join("merged")),
            state: root.join("state"),
        },
        matrix: matrix(),
        cache: CacheSettings { budget, latest: false },
        transactions: TransactionSettings::default(),
        media_server: None,
    }
}
