//! Ordered listener lists with RAII unsubscription

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Lock ignoring poisoning; a panicking listener must not wedge the store.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ListenerSet<T: 'static> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Listeners notified in registration order
pub(crate) struct Listeners<T: 'static> {
    set: Arc<Mutex<ListenerSet<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            set: Arc::new(Mutex::new(ListenerSet {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut set = lock(&self.set);
            let id = set.next_id;
            set.next_id += 1;
            set.entries.push((id, Arc::new(listener)));
            id
        };

        let weak = Arc::downgrade(&self.set);
        Subscription::new(move || {
            if let Some(set) = weak.upgrade() {
                lock(&set).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Call every listener registered when the round starts.
    ///
    /// The lock is released before the first call, so listeners may
    /// subscribe, unsubscribe or trigger nested notifications.
    pub(crate) fn notify(&self, value: &T) {
        let current: Vec<Callback<T>> = lock(&self.set)
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in current {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.set).entries.len()
    }
}

/// Handle returned by `subscribe`; dropping it removes the listener
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener registered for the lifetime of its source
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
