//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes an entry; the entry
//! collects every source read during the run and is popped by the guard
//! returned from [`ReactiveContext::enter`]. Nested entries let an effect
//! create another effect from inside its callback.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::subscriber::{Computation, SignalId, Source, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// Sources read during one run. Most bindings read one or two fields.
pub(crate) type Sources = SmallVec<[Arc<dyn Source>; 4]>;

struct ContextEntry {
    subscriber_id: SubscriberId,
    computation: Weak<dyn Computation>,
    sources: Sources,
}

/// Guard that pops the context when dropped.
///
/// Popping on drop keeps the stack consistent even if the computation
/// panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    pub fn enter(subscriber_id: SubscriberId, computation: Weak<dyn Computation>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                computation,
                sources: SmallVec::new(),
            });
        });

        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a read of `source` by the running computation.
    ///
    /// Returns the computation to subscribe, or `None` when nothing is
    /// tracking or the source was already recorded in this run.
    pub(crate) fn track(source: Arc<dyn Source>) -> Option<(SubscriberId, Weak<dyn Computation>)> {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let id: SignalId = source.signal_id();
            if entry.sources.iter().any(|s| s.signal_id() == id) {
                return None;
            }
            entry.sources.push(source);
            Some((entry.subscriber_id, entry.computation.clone()))
        })
    }

    /// Run `f` with tracking suspended.
    pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
        let saved = CONTEXT_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut()));
        let result = f();
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let nested = std::mem::replace(&mut *stack, saved);
            debug_assert!(nested.is_empty(), "untracked scope leaked a context entry");
        });
        result
    }

    /// Pop the context and hand back the sources read during the run.
    pub(crate) fn finish(mut self) -> Sources {
        self.finished = true;
        Self::pop(self.subscriber_id)
    }

    fn pop(expected: SubscriberId) -> Sources {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().pop() {
            Some(entry) => {
                debug_assert_eq!(
                    entry.subscriber_id, expected,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    expected, entry.subscriber_id
                );
                entry.sources
            }
            None => SmallVec::new(),
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            Self::pop(self.subscriber_id);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
