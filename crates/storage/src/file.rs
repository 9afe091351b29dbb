//! File metadata gathered lazily from the filesystem.

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Extension appended to a media file's path to form its JSON sidecar.
pub const SIDECAR_EXTENSION: &str = "meta";

/// Size and timestamps of a single file.
///
/// Only populated when a caller asks for it; on large libraries the extra
/// `stat` per file is the most expensive part of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedInfo {
    /// File size in bytes
    pub size: u64,
    /// Creation time, falling back to the modification time on filesystems
    /// that do not record one.
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    /// Last modified timestamp
    #[serde(with = "time::serde::rfc3339")]
    pub modified: OffsetDateTime,
}
impl ExtendedInfo {
    pub(crate) fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        let modified: OffsetDateTime = metadata.modified()?.into();
        let created = metadata.created().map(OffsetDateTime::from).unwrap_or(modified);
        Ok(Self { size: metadata.len(), created, modified })
    }
}

/// Path of the JSON sidecar that accompanies `path`.
///
/// ```
/// use std::path::Path;
/// use mvault_storage::sidecar_path;
/// assert_eq!(sidecar_path("/c/tv-hd/Show/ep1.mkv"), Path::new("/c/tv-hd/Show/ep1.mkv.meta"));
/// ```
pub fn sidecar_path(path: impl AsRef<Path>) -> PathBuf {
    let mut os = path.as_ref().as_os_str().to_owned();
    os.push(".");
    os.push(SIDECAR_EXTENSION);
    PathBuf::from(os)
}
