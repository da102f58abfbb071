//! A single independently-owned partition of application state

use std::sync::{Arc, Mutex, Weak};

use super::listeners::{lock, Listeners, Subscription};
use super::state::ChangeReason;

/// State held by a [`Slice`]
///
/// `apply` performs the shallow merge of a patch; `classify` tags the change
/// so the render layer can tell navigation from data updates.
pub trait SliceState: Clone + Default + Send + Sync + 'static {
    type Patch;

    fn apply(&mut self, patch: Self::Patch);

    fn classify(patch: &Self::Patch) -> ChangeReason;
}

/// Hook through which slices report to the owning store
pub(crate) trait SliceObserver: Send + Sync {
    /// Called after the snapshot is replaced, before any listener runs
    fn record(&self, slice: &'static str, reason: ChangeReason);

    /// Called after the slice's own listeners ran
    fn changed(&self);
}

struct SliceInner<S> {
    value: Arc<S>,
    version: u64,
}

/// Versioned state partition with get/set/subscribe
///
/// `set` builds the next snapshot from a copy, swaps it in, then calls every
/// listener synchronously in registration order before returning. Readers
/// only ever see complete snapshots.
pub struct Slice<S: SliceState> {
    name: &'static str,
    inner: Mutex<SliceInner<S>>,
    listeners: Listeners<S>,
    observer: Option<Weak<dyn SliceObserver>>,
}

impl<S: SliceState> Slice<S> {
    /// Standalone slice holding `S::default()`
    pub fn new(name: &'static str) -> Self {
        Self::build(name, S::default(), None)
    }

    /// Standalone slice with an explicit initial value
    pub fn with_value(name: &'static str, value: S) -> Self {
        Self::build(name, value, None)
    }

    pub(crate) fn observed(name: &'static str, value: S, observer: Weak<dyn SliceObserver>) -> Self {
        Self::build(name, value, Some(observer))
    }

    fn build(name: &'static str, value: S, observer: Option<Weak<dyn SliceObserver>>) -> Self {
        Self {
            name,
            inner: Mutex::new(SliceInner {
                value: Arc::new(value),
                version: 0,
            }),
            listeners: Listeners::new(),
            observer,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<S> {
        Arc::clone(&lock(&self.inner).value)
    }

    /// Number of completed `set` calls
    pub fn version(&self) -> u64 {
        lock(&self.inner).version
    }

    /// Merge `patch` into a copy of the snapshot, replace it, notify
    pub fn set(&self, patch: S::Patch) {
        self.update(|_| patch);
    }

    /// Like [`set`](Self::set), with the patch computed from the current
    /// snapshot under the slice lock
    pub fn update(&self, make_patch: impl FnOnce(&S) -> S::Patch) {
        let (snapshot, reason) = {
            let mut inner = lock(&self.inner);
            let patch = make_patch(&inner.value);
            let reason = S::classify(&patch);
            let mut next = (*inner.value).clone();
            next.apply(patch);
            inner.value = Arc::new(next);
            inner.version += 1;
            (Arc::clone(&inner.value), reason)
        };

        let observer = self.observer.as_ref().and_then(Weak::upgrade);
        if let Some(observer) = &observer {
            observer.record(self.name, reason);
        }
        self.listeners.notify(&snapshot);
        if let Some(observer) = &observer {
            observer.changed();
        }
    }

    /// Register a listener called with the new snapshot after every `set`
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}
