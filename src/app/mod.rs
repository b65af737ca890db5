//! Application composition root.
//!
//! Shared state is never global: an [`AppContext`] is constructed once, from a
//! storage backend or an [`AppConfig`](crate::config::AppConfig), and passed to
//! the parts of the application that need it.

mod context;

pub use context::AppContext;
