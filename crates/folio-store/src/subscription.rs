//! Scoped listener registration

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// Guard for a live registration
///
/// Dropping the guard unregisters. [`Subscription::unsubscribe`] does the same
/// explicitly; either way the cancel hook runs exactly once.
#[must_use = "dropping a Subscription immediately unregisters it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create guard running `cancel` on teardown
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Guard with nothing to tear down
    #[inline]
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Unregister now
    #[inline]
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct ListenerInner<T: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Arc<T>)>,
}

/// Registry of listeners handing out [`Subscription`] guards
///
/// Guards hold only a weak reference, so a guard outliving the set is
/// harmless.
pub struct ListenerSet<T: ?Sized> {
    inner: Arc<Mutex<ListenerInner<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ListenerSet<T> {
    /// Create empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener
    pub fn add(&self, listener: Arc<T>) -> Subscription {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak: Weak<Mutex<ListenerInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Current listeners, cloned out so callers can invoke them unlocked
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.inner
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Check if no listener is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.inner.lock().listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Callback = dyn Fn() + Send + Sync;

    #[test]
    fn drop_unregisters() {
        let set: ListenerSet<Callback> = ListenerSet::new();
        let sub = set.add(Arc::new(|| {}));
        assert_eq!(set.len(), 1);
        drop(sub);
        assert!(set.is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_its_listener() {
        let set: ListenerSet<Callback> = ListenerSet::new();
        let a = set.add(Arc::new(|| {}));
        let _b = set.add(Arc::new(|| {}));
        a.unsubscribe();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn guard_outliving_set_is_harmless() {
        let set: ListenerSet<Callback> = ListenerSet::new();
        let sub = set.add(Arc::new(|| {}));
        drop(set);
        drop(sub);
    }

    #[test]
    fn cancel_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshot_invokes_without_lock() {
        let set: ListenerSet<Callback> = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let inner_set = set.clone();
        let _sub = set.add(Arc::new(move || {
            // Re-entrant access must not deadlock
            let _ = inner_set.len();
            h.fetch_add(1, Ordering::SeqCst);
        }));
        for listener in set.snapshot() {
            listener();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
