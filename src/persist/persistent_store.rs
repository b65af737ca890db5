use std::fmt;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn, Level};

use super::codec::Codec;
use crate::config::{LoadErrorPolicy, PersistOptions};
use crate::error::{DecodeError, PersistError};
use crate::storage::KeyValueStorage;
use crate::store::{lock, Store, Subscription};

type Validator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A [`Store`] bound to one storage key.
///
/// On construction the handle hydrates from the entry under its key (if any),
/// then writes the current value back and keeps writing every later value. The
/// entry is therefore always the JSON of the most recently observed value.
///
/// Write failures do not roll back the in-memory value; they are returned from
/// the call that caused them (`set`, `update`, `reset` or construction).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pantry::{KeyValueStorage, MemoryStorage, PersistentStore};
///
/// let storage = MemoryStorage::new();
/// let todos = PersistentStore::new(Arc::new(storage.clone()), "todos", Vec::<String>::new())?;
///
/// todos.update(|todos| todos.push("buy milk".to_string()))?;
/// assert_eq!(storage.get_item("todos")?.as_deref(), Some(r#"["buy milk"]"#));
///
/// todos.reset()?;
/// assert_eq!(storage.get_item("todos")?.as_deref(), Some("[]"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct PersistentStore<T> {
    key: Arc<str>,
    initial: Arc<T>,
    store: Store<T>,
    write_error: Arc<Mutex<Option<PersistError>>>,
    _writer: Arc<Subscription>,
}

impl<T> PersistentStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Bind a new store to `key` using default [`PersistOptions`].
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        key: impl Into<String>,
        initial: T,
    ) -> Result<Self, PersistError> {
        Self::builder(storage, key, initial).build()
    }

    /// Start configuring a store bound to `key`, see [`PersistentStoreBuilder`].
    pub fn builder(
        storage: Arc<dyn KeyValueStorage>,
        key: impl Into<String>,
        initial: T,
    ) -> PersistentStoreBuilder<T> {
        PersistentStoreBuilder {
            storage,
            key: key.into(),
            initial,
            options: PersistOptions::default(),
            validator: None,
        }
    }

    /// The storage key this store writes to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value passed at construction, which [`reset`](Self::reset) restores.
    pub fn initial(&self) -> &T {
        &self.initial
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.store.get()
    }

    /// Read the current value without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.store.read(f)
    }

    /// Replace the value and persist it.
    pub fn set(&self, value: T) -> Result<(), PersistError> {
        self.clear_write_error();
        self.store.set(value);
        self.take_write_error()
    }

    /// Modify the value in place and persist it.
    pub fn update<F>(&self, f: F) -> Result<(), PersistError>
    where
        F: FnOnce(&mut T),
    {
        self.clear_write_error();
        self.store.update(f);
        self.take_write_error()
    }

    /// Restore the construction-time initial value and persist it, overwriting
    /// whatever is stored.
    pub fn reset(&self) -> Result<(), PersistError> {
        debug!(key = %self.key, "Resetting persistent store");
        self.set(T::clone(&self.initial))
    }

    /// Observe the value. The observer sees the current value right away.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.store.subscribe(observer)
    }

    fn clear_write_error(&self) {
        lock::lock(&self.write_error).take();
    }

    fn take_write_error(&self) -> Result<(), PersistError> {
        match lock::lock(&self.write_error).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<T> Clone for PersistentStore<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            initial: Arc::clone(&self.initial),
            store: self.store.clone(),
            write_error: Arc::clone(&self.write_error),
            _writer: Arc::clone(&self._writer),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentStore")
            .field("key", &self.key)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// Configures and builds a [`PersistentStore`].
pub struct PersistentStoreBuilder<T> {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    initial: T,
    options: PersistOptions,
    validator: Option<Validator<T>>,
}

impl<T> PersistentStoreBuilder<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Replace all options at once.
    pub fn options(mut self, options: PersistOptions) -> Self {
        self.options = options;
        self
    }

    /// What to do when the stored entry cannot be read or decoded.
    pub fn on_load_error(mut self, policy: LoadErrorPolicy) -> Self {
        self.options.on_load_error = policy;
        self
    }

    /// Wrap entries in a versioned envelope and accept only that version.
    pub fn format_version(mut self, version: u32) -> Self {
        self.options.format_version = Some(version);
        self
    }

    /// Reject hydrated values for which `validator` returns `false`.
    ///
    /// A rejected entry is handled like any other unreadable entry, according to
    /// the [`LoadErrorPolicy`].
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Hydrate from storage, register the write-back observer and write the
    /// current value once.
    #[tracing::instrument(level = Level::DEBUG, skip(self), fields(key = %self.key))]
    pub fn build(self) -> Result<PersistentStore<T>, PersistError> {
        if self.key.is_empty() {
            return Err(PersistError::EmptyKey);
        }

        let codec = Codec::new(self.options.format_version);
        codec
            .encode(&self.initial)
            .map_err(|source| PersistError::Serialize {
                key: self.key.clone(),
                source,
            })?;

        let current = match self.hydrate(&codec)? {
            Some(value) => value,
            None => self.initial.clone(),
        };

        let key: Arc<str> = Arc::from(self.key);
        let store = Store::with_max_notify_passes(current, self.options.max_notify_passes);
        let write_error = Arc::new(Mutex::new(None));

        let writer = {
            let storage = self.storage;
            let key = Arc::clone(&key);
            let write_error = Arc::clone(&write_error);
            store.subscribe(move |value: &T| {
                if let Err(error) = write_back(storage.as_ref(), &codec, &key, value) {
                    warn!(key = %key, error = ?error, "Unable to persist store value");
                    *lock::lock(&write_error) = Some(error);
                }
            })
        };

        let handle = PersistentStore {
            key,
            initial: Arc::new(self.initial),
            store,
            write_error,
            _writer: Arc::new(writer),
        };
        handle.take_write_error()?;

        Ok(handle)
    }

    /// The persisted value under the key, if there is a usable one.
    fn hydrate(&self, codec: &Codec) -> Result<Option<T>, PersistError> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            // An empty entry counts as absent.
            Ok(_) => {
                debug!(key = %self.key, "No persisted entry, using initial value");
                return Ok(None);
            }
            Err(source) => {
                return self.recover(PersistError::Storage {
                    key: self.key.clone(),
                    source,
                })
            }
        };

        let decoded = codec.decode::<T>(&raw).and_then(|value| match &self.validator {
            Some(validator) if !validator(&value) => Err(DecodeError::Rejected),
            _ => Ok(value),
        });

        match decoded {
            Ok(value) => {
                debug!(key = %self.key, "Hydrated from persisted entry");
                Ok(Some(value))
            }
            Err(source) => self.recover(PersistError::Corrupt {
                key: self.key.clone(),
                source,
            }),
        }
    }

    fn recover(&self, error: PersistError) -> Result<Option<T>, PersistError> {
        match self.options.on_load_error {
            LoadErrorPolicy::UseInitial => {
                warn!(
                    key = %self.key,
                    error = ?error,
                    "Unable to load persisted entry, using initial value"
                );
                Ok(None)
            }
            LoadErrorPolicy::Fail => Err(error),
        }
    }
}

fn write_back<T: Serialize>(
    storage: &dyn KeyValueStorage,
    codec: &Codec,
    key: &str,
    value: &T,
) -> Result<(), PersistError> {
    let raw = codec.encode(value).map_err(|source| PersistError::Serialize {
        key: key.to_string(),
        source,
    })?;
    storage.set_item(key, &raw).map_err(|source| PersistError::Storage {
        key: key.to_string(),
        source,
    })?;
    debug!(key, bytes = raw.len(), "Persisted store value");
    Ok(())
}

/// Bind a new [`PersistentStore`] to `key` in `storage` with default options.
pub fn create_persistent_store<T>(
    storage: Arc<dyn KeyValueStorage>,
    key: impl Into<String>,
    initial: T,
) -> Result<PersistentStore<T>, PersistError>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    PersistentStore::new(storage, key, initial)
}
