//! Catalog models shared by every stage of a reconciliation pass.

use mvault_storage::{ExtendedInfo, IdentityKey, Tier};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Lookup reference to a [`MediaItem`] in another catalog.
///
/// Within one tier, the quality folder plus the identity key is unique, so
/// this resolves to at most one item. It is resolved at use time (see
/// [`MediaItemGroup::find`]); it never owns or points at the item directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceRef {
    pub tier: Tier,
    pub quality: String,
    pub key: IdentityKey,
}

/// One physical file inside a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub tier: Tier,
    pub media_type: String,
    pub quality: String,
    pub key: IdentityKey,
    /// Absolute path of the file.
    pub path: PathBuf,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Only present when requested during the scan (or filled from the manifest).
    pub extended: Option<ExtendedInfo>,
    /// The item this one is derived from, and should be linked or copied from.
    pub source: Option<SourceRef>,
}
impl MediaItem {
    pub fn media_prefix(&self) -> &str {
        self.key.media_prefix()
    }

    pub fn title(&self) -> &str {
        self.key.title()
    }

    pub fn relative_title_filepath(&self) -> &Path {
        self.key.relative()
    }

    /// Reference other catalogs can use to name this item as their source.
    pub fn as_source(&self) -> SourceRef {
        SourceRef {
            tier: self.tier,
            quality: self.quality.clone(),
            key: self.key.clone(),
        }
    }

    /// Size in bytes, if extended info has been gathered.
    pub fn size(&self) -> Option<u64> {
        self.extended.map(|e| e.size)
    }
}

/// One `{prefix}-{quality}` directory of a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaGroupFolder {
    pub tier: Tier,
    pub media_type: String,
    pub prefix: String,
    pub quality: String,
    pub path: PathBuf,
    /// Whether this media type participates in the merged view.
    pub cache_export: bool,
}

/// An ordered catalog of media items, plus the folders they were found in.
///
/// Order is significant: scans list quality folders in rank order, so the
/// first item seen for an identity key is the best-ranked copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaItemGroup {
    pub folders: Vec<MediaGroupFolder>,
    pub items: Vec<MediaItem>,
}
impl MediaItemGroup {
    pub fn new(folders: Vec<MediaGroupFolder>, items: Vec<MediaItem>) -> Self {
        Self { folders, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MediaItem> {
        self.items.iter()
    }

    /// Resolves a [`SourceRef`] against this catalog.
    pub fn find(&self, reference: &SourceRef) -> Option<&MediaItem> {
        self.items
            .iter()
            .find(|item| item.tier == reference.tier && item.quality == reference.quality && item.key == reference.key)
    }

    /// First (best-ranked) item for every identity key.
    pub fn first_by_key(&self) -> HashMap<&IdentityKey, &MediaItem> {
        let mut index = HashMap::with_capacity(self.items.len());
        for item in &self.items {
            index.entry(&item.key).or_insert(item);
        }
        index
    }

    /// Distinct identity keys, in catalog order.
    pub fn keys(&self) -> Vec<IdentityKey> {
        let mut seen = std::collections::HashSet::new();
        self.items.iter().filter(|item| seen.insert(&item.key)).map(|item| item.key.clone()).collect()
    }

    /// Sum of the known sizes of every item.
    pub fn total_size(&self) -> u64 {
        self.items.iter().filter_map(MediaItem::size).sum()
    }
}
impl<'a> IntoIterator for &'a MediaItemGroup {
    type Item = &'a MediaItem;
    type IntoIter = std::slice::Iter<'a, MediaItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
