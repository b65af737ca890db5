//! Stores that write through to a [`KeyValueStorage`](crate::storage::KeyValueStorage).
//!
//! A [`PersistentStore`] hydrates from the entry under its key, then persists
//! every value it takes as JSON. Handles bound to the same key in the same
//! storage are not coordinated; the last write wins.

mod codec;
mod persistent_store;

pub use persistent_store::{create_persistent_store, PersistentStore, PersistentStoreBuilder};
