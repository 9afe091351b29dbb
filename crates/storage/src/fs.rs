//! Blocking filesystem primitives.
//!
//! Every function works on absolute paths and converts [`std::io::Error`]s
//! into [`ErrorKind`]s that carry the offending path. Nothing here retries;
//! the first failure is returned to the caller.

use crate::error::{ErrorKind, Result};
use crate::file::ExtendedInfo;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Size and timestamps of the file at `path` (following symlinks).
pub fn stat(path: &Path) -> Result<ExtendedInfo> {
    let metadata = fs::metadata(path).map_err(|e| ErrorKind::from_io(e, path))?;
    Ok(ExtendedInfo::from_metadata(&metadata).map_err(|e| ErrorKind::from_io(e, path))?)
}

/// Size of the file at `path`, or `None` when nothing exists there.
pub fn size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
    }
}

pub fn exists(path: &Path) -> Result<bool> {
    Ok(fs::exists(path).map_err(|e| ErrorKind::from_io(e, path))?)
}

/// Returns `true` when both paths point at the same inode (i.e. one is a hard
/// link of the other). Always `false` on platforms without inode numbers.
pub fn is_same_file(a: &Path, b: &Path) -> Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let (Some(a), Some(b)) = (metadata_if_exists(a)?, metadata_if_exists(b)?) else {
            return Ok(false);
        };
        Ok(a.dev() == b.dev() && a.ino() == b.ino())
    }
    #[cfg(not(unix))]
    {
        _ = (a, b);
        Ok(false)
    }
}

#[cfg(unix)]
fn metadata_if_exists(path: &Path) -> Result<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
    }
}

/// Immediate subdirectories of `dir`, sorted by name.
///
/// A missing directory is an empty listing, not an error.
pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => exn::bail!(ErrorKind::from_io(e, dir)),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ErrorKind::from_io(e, dir))?;
        let file_type = entry.file_type().map_err(|e| ErrorKind::from_io(e, entry.path()))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Recursive, depth-first listing of every regular file below a directory.
///
/// Entries are visited in name order so repeated walks over an unchanged tree
/// produce identical sequences. Symlinks are skipped. Errors are yielded per
/// entry so that one unreadable file does not end the walk; a missing start
/// directory yields nothing.
pub struct Walk {
    stack: Vec<PathBuf>,
    pending: VecDeque<Result<PathBuf>>,
}
impl Walk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            stack: vec![root.into()],
            pending: VecDeque::new(),
        }
    }

    fn read(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                self.pending.push_back(Err(ErrorKind::from_io(e, dir).into()));
                return;
            },
        };
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.pending.push_back(Err(ErrorKind::from_io(e, dir).into()));
                    continue;
                },
            };
            match entry.file_type() {
                Ok(t) if t.is_dir() => dirs.push(entry.path()),
                Ok(t) if t.is_file() => files.push(entry.path()),
                Ok(_) => {},
                Err(e) => self.pending.push_back(Err(ErrorKind::from_io(e, entry.path()).into())),
            }
        }
        files.sort();
        dirs.sort();
        self.pending.extend(files.into_iter().map(Ok));
        // Reversed so that popping from the stack visits directories in name order.
        self.stack.extend(dirs.into_iter().rev());
    }
}
impl Iterator for Walk {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(next) = self.pending.pop_front() {
                return Some(next);
            }
            let dir = self.stack.pop()?;
            self.read(&dir);
        }
    }
}

/// Creates `dir` and any missing ancestors, returning the directories that
/// were actually created (outermost first).
pub fn create_dir_all(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        if exists(path)? {
            break;
        }
        missing.push(path.to_path_buf());
        current = path.parent();
    }
    missing.reverse();
    for path in &missing {
        match fs::create_dir(path) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {},
            Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
        }
    }
    Ok(missing)
}

/// Creates `to` as a hard link of `from`.
pub fn hard_link(from: &Path, to: &Path) -> Result<()> {
    Ok(fs::hard_link(from, to).map_err(|e| link_error(e, from, to))?)
}

fn link_error(e: io::Error, from: &Path, to: &Path) -> ErrorKind {
    // A missing source is the interesting path; anything else is about the destination.
    match e.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound(from.to_path_buf()),
        _ => ErrorKind::from_io(e, to),
    }
}

/// Copies the contents (and permissions) of `from` into `to`, returning the
/// number of bytes copied.
pub fn copy(from: &Path, to: &Path) -> Result<u64> {
    Ok(fs::copy(from, to).map_err(|e| link_error(e, from, to))?)
}

/// Moves `from` to `to`, falling back to copy-then-delete when the two paths
/// live on different filesystems.
pub fn rename(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "Rename crosses filesystems; copying instead");
            copy(from, to)?;
            remove_file(from)?;
            Ok(())
        },
        Err(e) => exn::bail!(link_error(e, from, to)),
    }
}

/// Removes a file, returning `false` if there was nothing to remove.
pub fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => exn::bail!(ErrorKind::from_io(e, path)),
    }
}

pub fn write(path: &Path, data: &[u8]) -> Result<()> {
    Ok(fs::write(path, data).map_err(|e| ErrorKind::from_io(e, path))?)
}

/// Removes every directory below `root` that is (or becomes) empty, deepest
/// first. `root` itself is never removed. Returns the removed directories in
/// removal order.
pub fn prune_empty_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if exists(root)? {
        prune(root, root, &mut removed)?;
    }
    Ok(removed)
}

fn prune(dir: &Path, root: &Path, removed: &mut Vec<PathBuf>) -> Result<bool> {
    let mut remaining = 0usize;
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| ErrorKind::from_io(e, dir))?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| ErrorKind::from_io(e, dir))?;
    entries.sort_by_key(|entry| entry.path());
    for entry in entries {
        let is_dir = entry.file_type().map_err(|e| ErrorKind::from_io(e, entry.path()))?.is_dir();
        if !(is_dir && prune(&entry.path(), root, removed)?) {
            remaining += 1;
        }
    }
    if remaining > 0 || dir == root {
        return Ok(false);
    }
    fs::remove_dir(dir).map_err(|e| ErrorKind::from_io(e, dir))?;
    removed.push(dir.to_path_buf());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str, data: &[u8]) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_walk_is_sorted_and_recursive() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "b/2.mkv", b"2");
        touch(temp.path(), "a/1.mkv", b"1");
        touch(temp.path(), "a/nested/3.mkv", b"3");
        touch(temp.path(), "top.mkv", b"0");
        let files: Vec<_> = Walk::new(temp.path())
            .map(|f| f.unwrap().strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("top.mkv"),
                PathBuf::from("a/1.mkv"),
                PathBuf::from("a/nested/3.mkv"),
                PathBuf::from("b/2.mkv"),
            ]
        );
    }

    #[test]
    fn test_walk_missing_root_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(Walk::new(temp.path().join("nope")).count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let temp = tempfile::tempdir().unwrap();
        let target = touch(temp.path(), "real.mkv", b"data");
        std::os::unix::fs::symlink(&target, temp.path().join("link.mkv")).unwrap();
        assert_eq!(Walk::new(temp.path()).count(), 1);
    }

    #[test]
    fn test_subdirectories() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "ShowB/ep.mkv", b"");
        touch(temp.path(), "ShowA/ep.mkv", b"");
        touch(temp.path(), "loose.mkv", b"");
        let dirs = subdirectories(temp.path()).unwrap();
        assert_eq!(dirs, vec![temp.path().join("ShowA"), temp.path().join("ShowB")]);
        assert!(subdirectories(&temp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_create_dir_all_reports_created() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        let created = create_dir_all(&temp.path().join("a/b/c")).unwrap();
        assert_eq!(created, vec![temp.path().join("a/b"), temp.path().join("a/b/c")]);
        assert!(create_dir_all(&temp.path().join("a/b/c")).unwrap().is_empty());
    }

    #[test]
    fn test_hard_link_shares_inode() {
        let temp = tempfile::tempdir().unwrap();
        let source = touch(temp.path(), "src.mkv", b"data");
        let link = temp.path().join("link.mkv");
        hard_link(&source, &link).unwrap();
        assert_eq!(fs::read(&link).unwrap(), b"data");
        #[cfg(unix)]
        assert!(is_same_file(&source, &link).unwrap());
    }

    #[test]
    fn test_copy_is_a_different_file() {
        let temp = tempfile::tempdir().unwrap();
        let source = touch(temp.path(), "src.mkv", b"data");
        let dest = temp.path().join("copy.mkv");
        assert_eq!(copy(&source, &dest).unwrap(), 4);
        assert!(!is_same_file(&source, &dest).unwrap());
        assert_eq!(size(&dest).unwrap(), Some(4));
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("missing.mkv");
        let err = copy(&missing, &temp.path().join("dest.mkv")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if *p == missing));
        let err = hard_link(&missing, &temp.path().join("dest.mkv")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_rename() {
        let temp = tempfile::tempdir().unwrap();
        let source = touch(temp.path(), "old.mkv", b"data");
        let dest = temp.path().join("new.mkv");
        rename(&source, &dest).unwrap();
        assert!(!exists(&source).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn test_remove_file_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = touch(temp.path(), "file.mkv", b"");
        assert!(remove_file(&path).unwrap());
        assert!(!remove_file(&path).unwrap());
    }

    #[test]
    fn test_stat() {
        let temp = tempfile::tempdir().unwrap();
        let path = touch(temp.path(), "file.mkv", b"12345");
        let info = stat(&path).unwrap();
        assert_eq!(info.size, 5);
        assert!(matches!(&*stat(&temp.path().join("nope")).unwrap_err(), ErrorKind::NotFound(_)));
        assert_eq!(size(&temp.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn test_prune_empty_dirs_bottom_up() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("tv-hd/ShowA/Season 01")).unwrap();
        touch(temp.path(), "tv-hd/ShowB/ep.mkv", b"");
        fs::create_dir_all(temp.path().join("movie-hd")).unwrap();
        let removed = prune_empty_dirs(temp.path()).unwrap();
        assert_eq!(
            removed,
            vec![
                temp.path().join("movie-hd"),
                temp.path().join("tv-hd/ShowA/Season 01"),
                temp.path().join("tv-hd/ShowA"),
            ]
        );
        assert!(exists(&temp.path().join("tv-hd/ShowB/ep.mkv")).unwrap());
        assert!(exists(temp.path()).unwrap());
    }

    #[test]
    fn test_prune_keeps_empty_root() {
        let temp = tempfile::tempdir().unwrap();
        assert!(prune_empty_dirs(temp.path()).unwrap().is_empty());
        assert!(prune_empty_dirs(&temp.path().join("missing")).unwrap().is_empty());
        assert!(exists(temp.path()).unwrap());
    }
}
