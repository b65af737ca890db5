use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use super::{check_quota, KeyValueStorage};
use crate::error::StorageError;
use crate::store::lock;

/// In-process storage. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Empty storage without a quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses writes once entries would exceed `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(quota),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        lock::read(&self.entries).len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock::read(&self.entries).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = lock::write(&self.entries);
        check_quota(self.quota, &entries, key, value)?;
        trace!(key, bytes = value.len(), "memory storage write");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        lock::write(&self.entries).remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("todos").unwrap(), None);

        storage.set_item("todos", "[]").unwrap();
        assert_eq!(storage.get_item("todos").unwrap().as_deref(), Some("[]"));

        storage.remove_item("todos").unwrap();
        storage.remove_item("todos").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        other.set_item("theme", "\"dark\"").unwrap();

        assert_eq!(storage.get_item("theme").unwrap().as_deref(), Some("\"dark\""));
    }

    #[test]
    fn quota_rejects_oversized_write_and_keeps_previous_value() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("k", "short").unwrap();

        let error = storage.set_item("k", "much too long").unwrap_err();

        assert!(matches!(
            error,
            StorageError::QuotaExceeded { needed: 14, quota: 10, .. }
        ));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("short"));
    }
}
