//! Events and cancellation.
//!
//! Every listener is registered against an [`AbortSignal`]. Aborting the
//! owning [`AbortController`] removes all of them in one call, which is how a
//! component instance drops every listener its directives added.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::node::NodeId;
use crate::value::Value;

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Event listener callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// A dispatched event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event type, e.g. `click`.
    pub kind: String,
    /// The node the event was dispatched at.
    pub target: NodeId,
    /// The node whose listener is running.
    pub current_target: NodeId,
    /// Payload of custom events.
    pub detail: Value,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            current_target: target,
            detail: Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    /// The event as seen by expressions (`$event`).
    pub fn to_value(&self) -> Value {
        Value::object([
            ("type", Value::from(self.kind.as_str())),
            ("target", Value::Node(self.target)),
            ("currentTarget", Value::Node(self.current_target)),
            ("detail", self.detail.clone()),
        ])
    }
}

type AbortCallback = Box<dyn FnOnce() + Send>;

struct AbortInner {
    aborted: AtomicBool,
    callbacks: Mutex<Vec<AbortCallback>>,
}

/// Read side of an [`AbortController`].
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Run `f` when the signal aborts.
    ///
    /// Returns `false` without registering when the signal already aborted.
    pub(crate) fn on_abort<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock();
        if self.is_aborted() {
            return false;
        }
        callbacks.push(Box::new(f));
        true
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Cancellation handle owned by a component instance.
#[derive(Debug, Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            signal: AbortSignal {
                inner: Arc::new(AbortInner {
                    aborted: AtomicBool::new(false),
                    callbacks: Mutex::new(Vec::new()),
                }),
            },
        }
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    /// Abort, running every registered callback once. Later calls do
    /// nothing.
    pub fn abort(&self) {
        let callbacks = {
            let mut guard = self.signal.inner.callbacks.lock();
            if self.signal.inner.aborted.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *guard)
        };
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
