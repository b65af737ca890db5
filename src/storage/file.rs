use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, Level};

use super::{check_quota, KeyValueStorage};
use crate::error::StorageError;
use crate::store::lock;

/// Storage persisted as a single JSON object on disk.
///
/// Entries are loaded once on [`FileStorage::open`] and kept in memory. Every
/// write rewrites the whole document through a sibling temporary file followed
/// by a rename, so readers never observe a half-written document. Clones share
/// the same entries and file.
///
/// Two `FileStorage` values opened separately on the same path do not see each
/// other's writes; the last one to write wins.
#[derive(Clone)]
pub struct FileStorage {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    quota: Option<usize>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the document at `path`. A missing file is an empty storage; the file
    /// is created on the first write.
    #[tracing::instrument(level = Level::DEBUG)]
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self, StorageError> {
        Self::open_with_quota(path, None)
    }

    /// Like [`FileStorage::open`], refusing writes beyond `quota` bytes when set.
    #[tracing::instrument(level = Level::DEBUG)]
    pub fn open_with_quota(
        path: impl AsRef<Path> + std::fmt::Debug,
        quota: Option<usize>,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| StorageError::Format {
                path: path.clone(),
                source,
            })?,
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        info!("Opened file storage. path: {}, entries: {}", path.display(), entries.len());

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                quota,
                entries: Mutex::new(entries),
            }),
        })
    }

    /// Location of the document on disk.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let path = &self.inner.path;
        let io_error = |source| StorageError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(|source| StorageError::Format {
            path: path.clone(),
            source,
        })?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, content).map_err(io_error)?;
        fs::rename(&staging, path).map_err(io_error)?;

        debug!("Flushed file storage. path: {}, entries: {}", path.display(), entries.len());
        Ok(())
    }

    /// Apply `change` to the entries and flush; on flush failure the entries are
    /// restored to their previous state.
    fn modify<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<(), StorageError>,
    {
        let mut entries = lock::lock(&self.inner.entries);
        let previous = entries.clone();
        change(&mut *entries)?;
        if let Err(error) = self.flush(&*entries) {
            *entries = previous;
            return Err(error);
        }
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock::lock(&self.inner.entries).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let quota = self.inner.quota;
        self.modify(|entries| {
            check_quota(quota, entries, key, value)?;
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if !lock::lock(&self.inner.entries).contains_key(key) {
            return Ok(());
        }
        self.modify(|entries| {
            entries.remove(key);
            Ok(())
        })
    }
}
