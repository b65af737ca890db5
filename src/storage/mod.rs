//! Synchronous string key/value storage backends.
//!
//! [`KeyValueStorage`] mirrors the shape of a browser's local storage: string
//! keys, string values, synchronous calls. Two backends are provided:
//! - [`MemoryStorage`] - an in-process map; clones share it
//! - [`FileStorage`] - a JSON document on disk that survives restarts
//!
//! Both can be limited by a byte quota, counted as the sum of key and value
//! lengths over all entries.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::collections::BTreeMap;

use crate::error::StorageError;

/// A synchronous string-to-string store shared by every handle that uses it.
pub trait KeyValueStorage: Send + Sync {
    /// Value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Bytes the entries would occupy after storing `value` under `key`.
fn usage_with(entries: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let current: usize = entries
        .iter()
        .filter(|(existing, _)| existing.as_str() != key)
        .map(|(existing, stored)| existing.len() + stored.len())
        .sum();
    current + key.len() + value.len()
}

fn check_quota(
    quota: Option<usize>,
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let needed = usage_with(entries, key, value);
    if needed > quota {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            needed,
            quota,
        });
    }
    Ok(())
}
