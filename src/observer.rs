//! Callback registration for feeds and sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of callbacks, notified in registration order.
pub(crate) struct Observers<T> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, Callback<T>)>>,
}

impl<T: 'static> Observers<T> {
    pub(crate) fn new() -> Self {
        Self { next_id: AtomicU64::new(0), entries: RwLock::new(Vec::new()) }
    }

    pub(crate) fn add(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().unwrap_or_else(PoisonError::into_inner).push((id, Arc::new(callback)));
        id
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Call every registered callback.
    ///
    /// The list is copied first so callbacks may subscribe or unsubscribe
    /// without deadlocking.
    pub(crate) fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription
    where
        T: Send + Sync,
    {
        let id = self.add(callback);
        let observers: Weak<Self> = Arc::downgrade(self);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(observers) = observers.upgrade() {
                    observers.remove(id);
                }
            })),
        }
    }
}

/// Handle to a registered callback.
///
/// Dropping the handle unsubscribes. Use [`Subscription::detach`] to keep the
/// callback for as long as its source lives.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback. Calling this more than once is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the callback registered and forget the handle.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.is_active()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn callbacks_run_in_registration_order() {
        let observers = Arc::new(Observers::<u32>::new());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        let _a = observers.subscribe(move |v| first.lock().unwrap().push(("a", *v)));
        let second = Arc::clone(&seen);
        let _b = observers.subscribe(move |v| second.lock().unwrap().push(("b", *v)));

        observers.notify(&7);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let observers = Arc::new(Observers::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut sub = observers.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        observers.notify(&1);
        sub.unsubscribe();
        sub.unsubscribe();
        observers.notify(&2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(observers.len(), 0);
        assert!(!sub.is_active());
    }

    #[test]
    fn dropping_the_handle_unsubscribes_but_detach_keeps_it() {
        let observers = Arc::new(Observers::<u32>::new());
        drop(observers.subscribe(|_| {}));
        assert_eq!(observers.len(), 0);

        observers.subscribe(|_| {}).detach();
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn callbacks_may_unsubscribe_during_notify() {
        let observers = Arc::new(Observers::<u32>::new());
        let slot: Arc<std::sync::Mutex<Option<Subscription>>> = Arc::default();
        let inner = Arc::clone(&slot);
        let sub = observers.subscribe(move |_| {
            if let Some(mut sub) = inner.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        observers.notify(&1);
        assert_eq!(observers.len(), 0);
    }
}
