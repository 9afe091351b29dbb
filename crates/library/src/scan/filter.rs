use crate::models::{MediaGroupFolder, MediaItem};
use mvault_storage::{IdentityKey, Tier};
use serde::{Deserialize, Serialize};

/// Predicate over catalog items.
///
/// Every criterion is optional; an unset criterion matches everything, so
/// [`MediaFilter::all()`] matches every item in every tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaFilter {
    pub tier: Option<Tier>,
    pub media_type: Option<String>,
    pub media_prefix: Option<String>,
    pub quality: Option<String>,
    /// Case-insensitive substring of the title folder name.
    pub title: Option<String>,
    pub key: Option<IdentityKey>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn key(key: IdentityKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Whether anything in `folder` could match; lets the scanner skip
    /// walking folders that are certain to be filtered out.
    pub fn matches_folder(&self, folder: &MediaGroupFolder) -> bool {
        self.tier.is_none_or(|t| t == folder.tier)
            && self.media_type.as_ref().is_none_or(|t| *t == folder.media_type)
            && self.media_prefix.as_ref().is_none_or(|p| *p == folder.prefix)
            && self.quality.as_ref().is_none_or(|q| *q == folder.quality)
            && self.key.as_ref().is_none_or(|k| k.media_prefix() == folder.prefix)
    }

    pub fn matches(&self, item: &MediaItem) -> bool {
        self.tier.is_none_or(|t| t == item.tier)
            && self.media_type.as_ref().is_none_or(|t| *t == item.media_type)
            && self.media_prefix.as_ref().is_none_or(|p| p == item.media_prefix())
            && self.quality.as_ref().is_none_or(|q| *q == item.quality)
            && self.title.as_ref().is_none_or(|t| item.title().to_lowercase().contains(&t.to_lowercase()))
            && self.key.as_ref().is_none_or(|k| *k == item.key)
            && self.season.is_none_or(|s| item.season == Some(s))
            && self.episode.is_none_or(|e| item.episode == Some(e))
    }
}
