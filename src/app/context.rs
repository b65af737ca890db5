use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::{AppConfig, PersistOptions, StorageBackend};
use crate::error::{PersistError, StorageError};
use crate::notification::Notification;
use crate::persist::{PersistentStore, PersistentStoreBuilder};
use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};

/// Composition root for the application's shared state.
///
/// Owns the notification and the storage every persistent store is bound to.
/// Build one at startup and pass it (or clones of it) to whatever needs the
/// shared state; clones share everything.
///
/// # Examples
///
/// ```
/// use pantry::app::AppContext;
/// use pantry::notification::DEFAULT_GREETING;
///
/// let context = AppContext::in_memory();
/// assert_eq!(context.notification().get(), DEFAULT_GREETING);
///
/// let filter = context.persistent_store("filter", "all".to_string())?;
/// filter.set("done".to_string())?;
/// # Ok::<(), pantry::error::PersistError>(())
/// ```
#[derive(Clone)]
pub struct AppContext {
    notification: Notification,
    storage: Arc<dyn KeyValueStorage>,
    options: PersistOptions,
}

impl AppContext {
    /// Context over `storage` with the default greeting and options.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            notification: Notification::new(),
            storage,
            options: PersistOptions::default(),
        }
    }

    /// Context over a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Build the storage backend and notification described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        let storage: Arc<dyn KeyValueStorage> = match config.storage.backend {
            StorageBackend::Memory => match config.storage.quota_bytes {
                Some(quota) => Arc::new(MemoryStorage::with_quota(quota)),
                None => Arc::new(MemoryStorage::new()),
            },
            StorageBackend::File => Arc::new(FileStorage::open_with_quota(
                config.storage.file_path(),
                config.storage.quota_bytes,
            )?),
        };
        info!(
            "Created application context. backend: {:?}, quota: {:?}",
            config.storage.backend, config.storage.quota_bytes
        );

        Ok(Self {
            notification: Notification::with_message(config.notification.greeting.clone()),
            storage,
            options: config.persist.clone(),
        })
    }

    /// Options applied to every store this context creates.
    pub fn with_options(mut self, options: PersistOptions) -> Self {
        self.options = options;
        self
    }

    /// The shared notification message.
    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    /// The storage every store of this context is bound to.
    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    /// Options applied to created stores.
    pub fn options(&self) -> &PersistOptions {
        &self.options
    }

    /// Bind a persistent store to `key` in this context's storage.
    pub fn persistent_store<T>(
        &self,
        key: impl Into<String>,
        initial: T,
    ) -> Result<PersistentStore<T>, PersistError>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.persistent_store_builder(key, initial).build()
    }

    /// Like [`persistent_store`](Self::persistent_store), for further configuration
    /// such as a validator.
    pub fn persistent_store_builder<T>(
        &self,
        key: impl Into<String>,
        initial: T,
    ) -> PersistentStoreBuilder<T>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        PersistentStore::builder(Arc::clone(&self.storage), key, initial)
            .options(self.options.clone())
    }
}
