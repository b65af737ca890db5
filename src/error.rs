//! Error types for storage, decoding, persistence and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`KeyValueStorage`](crate::storage::KeyValueStorage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage is unavailable. reason: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded. key: '{key}', needed: {needed} bytes, quota: {quota} bytes")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    #[error("Storage IO error. path: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage file is not a valid document. path: {path}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reasons a persisted entry could not be turned back into a value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON. cause: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Format version mismatch. expected: {expected}, found: {found:?}")]
    VersionMismatch { expected: u32, found: Option<u32> },

    #[error("Value rejected by validator")]
    Rejected,
}

/// Errors surfaced by [`PersistentStore`](crate::persist::PersistentStore).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Storage key must not be empty")]
    EmptyKey,

    #[error("Unable to serialize value. key: '{key}'")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage operation failed. key: '{key}'")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Persisted entry is corrupt. key: '{key}'")]
    Corrupt {
        key: String,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config. path: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config. cause: {0}")]
    Parse(#[from] toml::de::Error),
}
