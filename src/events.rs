//! Typed event emitters.
//!
//! Each event is its own [`EventEmitter<T>`] with an explicit
//! subscribe/unsubscribe/dispatch capability set, so components expose exactly
//! the events they fire instead of a stringly-keyed bus. Listeners run
//! synchronously on the dispatching task, in subscription order.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a registered listener, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct EmitterInner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// A single named event: subscribe, unsubscribe, dispatch.
///
/// Cloning is cheap and all clones share the same listener set, so a
/// component can hand out the emitter while keeping dispatch rights.
pub struct EventEmitter<T> {
    inner: Arc<EmitterInner<T>>,
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventEmitter<T> {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener; returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        ListenerId(id)
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.listeners.lock().retain(|(lid, _)| *lid != id.0);
    }

    /// Invoke every listener with the event payload.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe,
    /// unsubscribe or dispatch on this same emitter without deadlocking.
    pub fn dispatch(&self, event: &T) {
        let listeners: Vec<Listener<T>> = {
            let guard = self.inner.listeners.lock();
            guard.iter().map(|(_, listener)| Arc::clone(listener)).collect()
        };
        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_dispatch_reaches_all_listeners_in_order() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let log = Arc::clone(&log);
            emitter.subscribe(move |value| log.lock().push((tag, *value)));
        }

        emitter.dispatch(&7);
        assert_eq!(log.lock().clone(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_removes_listener() {
        let emitter: EventEmitter<()> = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let id = emitter.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emitter.dispatch(&());
        emitter.unsubscribe(id);
        emitter.dispatch(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_subscribe_on_the_same_emitter() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_emitter = emitter.clone();
        let inner_count = Arc::clone(&count);
        emitter.subscribe(move |_| {
            let count = Arc::clone(&inner_count);
            inner_emitter.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        });

        emitter.dispatch(&1);
        assert_eq!(emitter.listener_count(), 2);
        assert_eq!(
            count.load(Ordering::SeqCst),
            0,
            "a listener added mid-dispatch only sees later events"
        );

        emitter.dispatch(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
