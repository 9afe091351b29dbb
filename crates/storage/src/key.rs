use crate::error::{Error, ErrorKind, Result};
use crate::path::{is_single_component, validate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Identifies the "same" logical file across tiers and qualities.
///
/// Two files are the same asset when they share a media prefix, a title
/// folder and a path below that title folder; which quality folder (or tier)
/// they were found in does not matter.
///
/// The text form is `{prefix}/{title}/{relative path}`. Prefix and title are
/// single directory names, so the first two separators are unambiguous.
///
/// ```
/// use mvault_storage::IdentityKey;
/// let key: IdentityKey = "tv/ShowA/Season 01/ep1.mkv".parse().unwrap();
/// assert_eq!(key.title(), "ShowA");
/// assert_eq!(key.relative().to_str(), Some("Season 01/ep1.mkv"));
/// assert_eq!(key.to_string(), "tv/ShowA/Season 01/ep1.mkv");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityKey {
    media_prefix: String,
    title: String,
    relative: PathBuf,
}
impl IdentityKey {
    pub fn new(media_prefix: impl Into<String>, title: impl Into<String>, relative: impl AsRef<Path>) -> Result<Self> {
        let media_prefix = media_prefix.into();
        let title = title.into();
        if !is_single_component(&media_prefix) {
            exn::bail!(ErrorKind::InvalidPath(PathBuf::from(media_prefix)));
        }
        if !is_single_component(&title) {
            exn::bail!(ErrorKind::InvalidPath(PathBuf::from(title)));
        }
        let relative = validate(relative)?;
        Ok(Self { media_prefix, title, relative })
    }

    pub fn media_prefix(&self) -> &str {
        &self.media_prefix
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Path of the file relative to its title folder.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Folder of the file relative to its title folder (empty when the file
    /// sits directly inside the title folder).
    pub fn relative_folder(&self) -> &Path {
        self.relative.parent().unwrap_or_else(|| Path::new(""))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always use forward slashes so the persisted form is portable.
        let relative: Vec<_> = self.relative.iter().map(|c| c.to_string_lossy()).collect();
        write!(f, "{}/{}/{}", self.media_prefix, self.title, relative.join("/"))
    }
}

impl FromStr for IdentityKey {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(title), Some(relative)) => Self::new(prefix, title, relative),
            _ => exn::bail!(ErrorKind::InvalidPath(PathBuf::from(s))),
        }
    }
}

impl TryFrom<String> for IdentityKey {
    type Error = Error;
    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IdentityKey> for String {
    fn from(key: IdentityKey) -> Self {
        key.to_string()
    }
}
