//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running, the signal registers
//!    that effect as a subscriber and the effect remembers the signal.
//!
//! 2. When a write changes the value, every subscriber is handed to the
//!    scheduler. Nothing re-runs synchronously.
//!
//! 3. Effects drop their subscriptions before every re-run, so a signal only
//!    notifies computations that read it during their most recent run.
//!
//! A write "changes" the value unless the new value is equal under the
//! type's `PartialEq`. For [`Value`](crate::Value) that is SameValue: `NaN`
//! is unchanged by `NaN`, and compound values compare by reference.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::context::ReactiveContext;
use super::scheduler::Scheduler;
use super::subscriber::{Computation, SignalId, Source, SubscriberId};

struct SignalInner<T> {
    id: SignalId,
    value: RwLock<T>,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Computation>>>,
    scheduler: Scheduler,
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync,
{
    fn signal_id(&self) -> SignalId {
        self.id
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.lock().shift_remove(&subscriber);
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Scheduler::new();
/// let count = Signal::new(&scheduler, 0);
///
/// let value = count.get();
/// count.set(5); // subscribers re-run on the next flush
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal bound to `scheduler`.
    pub fn new(scheduler: &Scheduler, value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::new(),
                value: RwLock::new(value),
                subscribers: Mutex::new(IndexMap::new()),
                scheduler: scheduler.clone(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Get the current value, subscribing the running effect if there is one.
    pub fn get(&self) -> T {
        if ReactiveContext::is_active() {
            let source: Arc<dyn Source> = self.inner.clone();
            if let Some((subscriber_id, computation)) = ReactiveContext::track(source) {
                trace!(signal = ?self.inner.id, ?subscriber_id, "tracked read");
                self.inner.subscribers.lock().insert(subscriber_id, computation);
            }
        }

        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value.
    ///
    /// Returns `false` (and notifies nobody) when the value is unchanged.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }

        self.notify_subscribers();
        true
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value)
    }

    fn notify_subscribers(&self) {
        let subscribers: Vec<_> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(id, weak)| (*id, weak.clone()))
            .collect();

        trace!(signal = ?self.inner.id, count = subscribers.len(), "signal changed");
        for (id, weak) in subscribers {
            self.inner.scheduler.enqueue(id, weak);
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Whether two handles point at the same cell.
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn signal_get_and_set() {
        let scheduler = Scheduler::new();
        let signal = Signal::new(&scheduler, 0);
        assert_eq!(signal.get(), 0);

        assert!(signal.set(42));
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let scheduler = Scheduler::new();
        let signal = Signal::new(&scheduler, 10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn unchanged_write_is_not_a_change() {
        let scheduler = Scheduler::new();
        let signal = Signal::new(&scheduler, Value::Number(f64::NAN));
        assert!(!signal.set(Value::Number(f64::NAN)));

        let list = Value::array([Value::from(1)]);
        let cell = Signal::new(&scheduler, list.clone());
        assert!(!cell.set(list));
        // a structurally equal but distinct array is a change
        assert!(cell.set(Value::array([Value::from(1)])));
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let scheduler = Scheduler::new();
        let signal = Signal::new(&scheduler, 1);
        signal.get();
        assert_eq!(signal.subscriber_count(), 0);
        assert!(!scheduler.is_queued());
    }

    #[test]
    fn signal_clone_shares_state() {
        let scheduler = Scheduler::new();
        let signal1 = Signal::new(&scheduler, 0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert!(signal1.ptr_eq(&signal2));
        assert_eq!(signal1.id(), signal2.id());
    }
}
