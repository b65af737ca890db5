//! # Pantry
//!
//! Reactive stores with write-through key/value persistence.
//!
//! ## Stores
//!
//! - `Store<T>` - Thread-safe observable value; subscribers are notified
//!   synchronously, in registration order, whenever the value is replaced
//! - `Notification` - The application-wide message, a `Store<String>` starting
//!   from a fixed greeting
//!
//! ## Persistence
//!
//! - `KeyValueStorage` - Synchronous string key/value storage, with in-memory
//!   and file-backed implementations
//! - `PersistentStore<T>` - A store bound to a storage key: hydrates from the
//!   stored JSON, writes every new value back, and can `reset` to its initial value
//! - `AppContext` - Composition root that owns the notification and the storage

pub mod app;
pub mod config;
pub mod error;
pub mod notification;
pub mod persist;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use app::AppContext;
pub use config::{AppConfig, LoadErrorPolicy, PersistOptions};
pub use error::{DecodeError, PersistError, StorageError};
pub use notification::Notification;
pub use persist::{create_persistent_store, PersistentStore};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{Store, Subscription};
