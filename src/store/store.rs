use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};

use tracing::{error, trace};

use super::lock;

/// Default bound on consecutive notification passes, see [`Store::with_max_notify_passes`].
pub const DEFAULT_MAX_NOTIFY_PASSES: usize = 64;

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Subscriber<T>)>,
}

impl<T> Subscribers<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, subscriber: Subscriber<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, subscriber));
        id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }
}

#[derive(Default)]
struct Dispatch {
    /// Thread currently notifying subscribers, if any.
    owner: Option<ThreadId>,
    /// The value changed since the current pass took its snapshot.
    pending: bool,
    /// At least one of those changes came from the notifying thread itself.
    nested: bool,
}

impl Dispatch {
    fn finish(&mut self) {
        self.owner = None;
        self.pending = false;
        self.nested = false;
    }
}

/// Releases the dispatch if an observer panics mid-pass.
///
/// On normal exit the dispatch is released by the loop itself, under the same
/// lock that observed no pending update.
struct DispatchGuard<'a> {
    dispatch: &'a Mutex<Dispatch>,
    released: bool,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            lock::lock(self.dispatch).finish();
        }
    }
}

/// A thread-safe observable value.
///
/// Every replacement of the value synchronously notifies all subscribers, in
/// registration order, with the new value. Clones share the same value and
/// subscriber list.
///
/// Updates issued while the store is already notifying (by a subscriber
/// reacting to a change, or by another thread) are queued: the running
/// dispatch finishes the current pass, then notifies everyone again with the
/// latest value. Re-runs caused by the notifying thread's own updates are
/// bounded by `max_notify_passes`; beyond that the remaining queued
/// notifications are dropped and an error is logged. Updates from other
/// threads are always delivered.
///
/// # Examples
///
/// ```
/// use pantry::Store;
///
/// let store = Store::new(1);
/// let _subscription = store.subscribe(|value| println!("value: {value}"));
/// store.update(|value| *value += 1);
/// assert_eq!(store.get(), 2);
/// ```
pub struct Store<T> {
    state: Arc<RwLock<T>>,
    subscribers: Arc<RwLock<Subscribers<T>>>,
    dispatch: Arc<Mutex<Dispatch>>,
    max_notify_passes: usize,
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    /// Create a new store with the given initial state.
    pub fn new(initial: T) -> Self {
        Self::with_max_notify_passes(initial, DEFAULT_MAX_NOTIFY_PASSES)
    }

    /// Create a new store with a custom bound on back-to-back notification passes.
    ///
    /// A bound of zero is treated as one: the first pass always runs.
    pub fn with_max_notify_passes(initial: T, max_notify_passes: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            subscribers: Arc::new(RwLock::new(Subscribers::new())),
            dispatch: Arc::new(Mutex::new(Dispatch::default())),
            max_notify_passes: max_notify_passes.max(1),
        }
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> T {
        lock::read(&self.state).clone()
    }

    /// Update the state in place using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        {
            let mut state = lock::write(&self.state);
            f(&mut *state);
        }
        self.notify();
    }

    /// Replace the state.
    pub fn set(&self, new_state: T) {
        *lock::write(&self.state) = new_state;
        self.notify();
    }

    /// Subscribe to state changes.
    ///
    /// The observer is called immediately with the current state and then after
    /// every change. Dropping the returned [`Subscription`] unsubscribes it.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let observer: Subscriber<T> = Arc::new(observer);
        let id = lock::write(&self.subscribers).insert(Arc::clone(&observer));

        let current = self.get();
        observer(&current);

        let subscribers = Arc::downgrade(&self.subscribers);
        Subscription::new(move || {
            if let Some(subscribers) = subscribers.upgrade() {
                lock::write(&subscribers).remove(id);
            }
        })
    }

    /// Read state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let state = lock::read(&self.state);
        f(&*state)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock::read(&self.subscribers).entries.len()
    }

    /// Notify all subscribers of a state change.
    fn notify(&self) {
        let current = thread::current().id();
        {
            let mut dispatch = lock::lock(&self.dispatch);
            if let Some(owner) = dispatch.owner {
                dispatch.pending = true;
                dispatch.nested |= owner == current;
                trace!("queued store update");
                return;
            }
            dispatch.owner = Some(current);
        }
        let mut guard = DispatchGuard {
            dispatch: &self.dispatch,
            released: false,
        };

        let mut passes = 1;
        loop {
            // Snapshot both so observers may subscribe, unsubscribe or set freely.
            let state = self.get();
            let subscribers: Vec<Subscriber<T>> = lock::read(&self.subscribers)
                .entries
                .iter()
                .map(|(_, subscriber)| Arc::clone(subscriber))
                .collect();
            for subscriber in subscribers {
                subscriber(&state);
            }

            // Deciding to stop and releasing the dispatch happen under one lock,
            // otherwise an update queued in between would never be delivered.
            let mut dispatch = lock::lock(&self.dispatch);
            if !dispatch.pending {
                dispatch.finish();
                guard.released = true;
                return;
            }
            if dispatch.nested {
                if passes >= self.max_notify_passes {
                    dispatch.finish();
                    guard.released = true;
                    drop(dispatch);
                    error!(
                        passes,
                        "Store notification did not settle, dropping queued updates"
                    );
                    return;
                }
                passes += 1;
            }
            dispatch.pending = false;
            dispatch.nested = false;
        }
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            subscribers: Arc::clone(&self.subscribers),
            dispatch: Arc::clone(&self.dispatch),
            max_notify_passes: self.max_notify_passes,
        }
    }
}

/// RAII guard for a store subscription.
///
/// Dropping the guard removes the observer. Call [`Subscription::detach`] to keep
/// the observer registered for as long as the store lives.
#[must_use = "dropping a Subscription unsubscribes the observer immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Remove the observer now.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keep the observer registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
