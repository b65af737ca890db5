//! Observable state containers.
//!
//! A [`Store`] holds a value and synchronously notifies subscribers whenever the
//! value is replaced. It is the primitive every other part of the crate builds on.

pub(crate) mod lock;
mod store;

pub use store::{Store, Subscription, DEFAULT_MAX_NOTIFY_PASSES};
