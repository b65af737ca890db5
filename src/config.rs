//! Configuration for storage backends, persistence and the notification.
//!
//! Everything has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [storage]
//! backend = "file"
//! path = "pantry.json"
//! quota_bytes = 5242880
//!
//! [persist]
//! on_load_error = "use-initial"
//! format_version = 1
//! max_notify_passes = 64
//!
//! [notification]
//! greeting = "Welcome to the to-do list app!"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::notification::DEFAULT_GREETING;
use crate::store::DEFAULT_MAX_NOTIFY_PASSES;

/// Document used by the file backend when no path is configured.
pub const DEFAULT_STORAGE_PATH: &str = "pantry.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub persist: PersistOptions,
    pub notification: NotificationConfig,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Only used by the file backend, defaults to [`DEFAULT_STORAGE_PATH`].
    pub path: Option<PathBuf>,
    pub quota_bytes: Option<usize>,
}

impl StorageConfig {
    /// Path used by the file backend.
    pub fn file_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH))
    }
}

/// What to do when the persisted entry cannot be read or decoded at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadErrorPolicy {
    /// Log a warning and start from the initial value, which then overwrites the entry.
    #[default]
    UseInitial,
    /// Fail construction and leave the entry untouched.
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistOptions {
    pub on_load_error: LoadErrorPolicy,
    /// When set, entries are wrapped as `{"version": N, "value": ...}` and only
    /// entries with the same version are accepted.
    pub format_version: Option<u32>,
    pub max_notify_passes: usize,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            on_load_error: LoadErrorPolicy::default(),
            format_version: None,
            max_notify_passes: DEFAULT_MAX_NOTIFY_PASSES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub greeting: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}
