use crate::store::{Store, Subscription};

/// Message shown before anything else has been announced.
pub const DEFAULT_GREETING: &str = "Welcome to the to-do list app!";

/// A shared, observable notification message.
///
/// There is no global instance: the application's composition root (see
/// [`AppContext`](crate::app::AppContext)) creates one and hands out clones.
/// Clones share the same message and subscribers.
#[derive(Clone)]
pub struct Notification {
    message: Store<String>,
}

impl Notification {
    /// Create a notification holding [`DEFAULT_GREETING`].
    pub fn new() -> Self {
        Self::with_message(DEFAULT_GREETING)
    }

    /// Create a notification holding `message`.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Store::new(message.into()),
        }
    }

    /// Current message.
    pub fn get(&self) -> String {
        self.message.get()
    }

    /// Replace the message, notifying every subscriber.
    pub fn set(&self, message: impl Into<String>) {
        self.message.set(message.into());
    }

    /// Modify the message in place, notifying every subscriber.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut String),
    {
        self.message.update(f);
    }

    /// Observe the message. The observer sees the current message right away.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.message.subscribe(move |message: &String| observer(message))
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}
