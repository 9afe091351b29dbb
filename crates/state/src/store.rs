//! Lock-protected access to the state document on disk.

use crate::document::StateDocument;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// File name of the state document inside the state directory.
pub const STATE_FILE: &str = "state.json";

/// Handle to one state document.
///
/// Readers take a shared lock and writers an exclusive lock on the document
/// itself for the whole read-modify-write, so concurrent processes (an API
/// request pinning a title while a scheduled pass commits) never lose each
/// other's updates. The handle holds no open file between calls.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Opens the store in `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).or_raise(|| ErrorKind::Io(dir.to_path_buf()))?;
        Ok(Self {
            path: dir.join(STATE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current document. A missing document reads as empty.
    #[instrument(level = "trace", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<StateDocument> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateDocument::default()),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(self.path.clone())),
        };
        file.lock_shared().or_raise(|| ErrorKind::Io(self.path.clone()))?;
        self.read(&mut file)
    }

    /// Applies `change` to the document under an exclusive lock and persists
    /// the result, returning whatever `change` returned.
    #[instrument(level = "trace", skip_all, fields(path = %self.path.display()))]
    pub fn update<T>(&self, change: impl FnOnce(&mut StateDocument) -> T) -> Result<T> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .or_raise(|| ErrorKind::Io(self.path.clone()))?;
        file.lock().or_raise(|| ErrorKind::Io(self.path.clone()))?;
        let mut document = self.read(&mut file)?;
        let output = change(&mut document);
        let json = serde_json::to_vec_pretty(&document).or_raise(|| ErrorKind::Corrupt(self.path.clone()))?;
        self.write(&mut file, &json).or_raise(|| ErrorKind::Io(self.path.clone()))?;
        tracing::trace!(bytes = json.len(), "State document written");
        Ok(output)
    }

    fn read(&self, file: &mut File) -> Result<StateDocument> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .or_raise(|| ErrorKind::Io(self.path.clone()))?;
        if contents.trim().is_empty() {
            return Ok(StateDocument::default());
        }
        serde_json::from_str(&contents).or_raise(|| ErrorKind::Corrupt(self.path.clone()))
    }

    fn write(&self, file: &mut File, json: &[u8]) -> io::Result<()> {
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json)?;
        file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvault_storage::IdentityKey;
    use std::thread;

    #[test]
    fn test_missing_document_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = StateStore::open(temp.path().join("state")).unwrap();
        assert_eq!(store.load().unwrap(), StateDocument::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_update_persists() {
        let temp = tempfile::tempdir().unwrap();
        let store = StateStore::open(temp.path()).unwrap();
        let key: IdentityKey = "tv/ShowA/ep1.mkv".parse().unwrap();
        let queued = store.update(|doc| doc.request_add([key.clone()])).unwrap();
        assert_eq!(queued, 1);
        let reopened = StateStore::open(temp.path()).unwrap();
        assert_eq!(reopened.load().unwrap().add_cache_updates, vec![key]);
    }

    #[test]
    fn test_shrinking_document_is_truncated() {
        let temp = tempfile::tempdir().unwrap();
        let store = StateStore::open(temp.path()).unwrap();
        let keys: Vec<IdentityKey> = (0..20).map(|i| format!("tv/Show/{i}.mkv").parse().unwrap()).collect();
        store.update(|doc| doc.request_add(keys.clone())).unwrap();
        store.update(|doc| doc.add_cache_updates.clear()).unwrap();
        assert!(store.load().unwrap().add_cache_updates.is_empty());
    }

    #[test]
    fn test_corrupt_document() {
        let temp = tempfile::tempdir().unwrap();
        let store = StateStore::open(temp.path()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let temp = tempfile::tempdir().unwrap();
        let store = StateStore::open(temp.path()).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.update(|doc| doc.bump()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.load().unwrap().media_library_update_request, 100);
    }
}
