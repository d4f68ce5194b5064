//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its callback immediately and
//!    synchronously to establish its initial dependencies.
//!
//! 2. When any dependency changes, the scheduler queues the effect; it re-runs
//!    on the next flush, once, however many writes happened.
//!
//! 3. Before re-running, the effect invokes the cleanup returned by its last
//!    run and unsubscribes from every signal it read. The new run's reads
//!    become the complete dependency set.
//!
//! # Lifetime
//!
//! Signals only hold weak references to effects. The [`Effect`] handle owns
//! the computation: dropping every handle stops it. Component contexts keep
//! the handles of the effects their directives create.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context::{ReactiveContext, Sources};
use super::scheduler::Scheduler;
use super::subscriber::{Computation, SubscriberId};
use crate::error::ReactiveError;

/// A function that reverses the side effects of an effect run or a
/// directive. Invoked at most once.
pub struct Cleanup(Box<dyn FnOnce() + Send>);

impl Cleanup {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values an effect callback may return.
pub trait EffectOutput {
    fn into_outcome(self) -> Result<Option<Cleanup>, ReactiveError>;
}

impl EffectOutput for () {
    fn into_outcome(self) -> Result<Option<Cleanup>, ReactiveError> {
        Ok(None)
    }
}

impl EffectOutput for Cleanup {
    fn into_outcome(self) -> Result<Option<Cleanup>, ReactiveError> {
        Ok(Some(self))
    }
}

impl EffectOutput for Option<Cleanup> {
    fn into_outcome(self) -> Result<Option<Cleanup>, ReactiveError> {
        Ok(self)
    }
}

impl<T, E> EffectOutput for Result<T, E>
where
    T: EffectOutput,
    E: Into<ReactiveError>,
{
    fn into_outcome(self) -> Result<Option<Cleanup>, ReactiveError> {
        self.map_err(Into::into)?.into_outcome()
    }
}

type Callback = Box<dyn FnMut() -> Result<Option<Cleanup>, ReactiveError> + Send>;

struct EffectInner {
    id: SubscriberId,
    callback: Mutex<Callback>,
    cleanup: Mutex<Option<Cleanup>>,
    sources: Mutex<Sources>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
    scheduler: Scheduler,
    this: Weak<EffectInner>,
}

impl EffectInner {
    fn run(&self) -> Result<(), ReactiveError> {
        if self.disposed.load(Ordering::Acquire) {
            return Ok(());
        }

        let previous = self.cleanup.lock().take();
        if let Some(cleanup) = previous {
            cleanup.run();
        }
        self.clear_sources();

        let this: Weak<dyn Computation> = self.this.clone();
        let ctx = ReactiveContext::enter(self.id, this);
        let outcome = {
            let mut callback = self.callback.lock();
            (callback.as_mut())()
        };
        let sources = ctx.finish();
        self.run_count.fetch_add(1, Ordering::Relaxed);
        trace!(effect = ?self.id, dependencies = sources.len(), "effect ran");

        if self.disposed.load(Ordering::Acquire) {
            // disposed from inside its own callback
            for source in &sources {
                source.unsubscribe(self.id);
            }
            if let Ok(Some(cleanup)) = outcome {
                cleanup.run();
            }
            return Ok(());
        }

        *self.sources.lock() = sources;
        *self.cleanup.lock() = outcome?;
        Ok(())
    }

    fn clear_sources(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources {
            source.unsubscribe(self.id);
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.clear_sources();
        let pending = self.cleanup.lock().take();
        if let Some(cleanup) = pending {
            cleanup.run();
        }
        trace!(effect = ?self.id, "effect disposed");
    }
}

impl Computation for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn recompute(&self) -> Result<(), ReactiveError> {
        self.run()
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(&scheduler, 0);
///
/// let effect = Effect::new(&scheduler, {
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);
/// scheduler.flush(); // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it once.
    ///
    /// A failing first run is logged; the effect stays subscribed to whatever
    /// it read and retries when one of those signals changes.
    pub fn new<F, R>(scheduler: &Scheduler, callback: F) -> Self
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let (effect, outcome) = Self::try_new(scheduler, callback);
        if let Err(err) = outcome {
            tracing::error!(effect = ?effect.inner.id, error = %err, "effect failed on first run");
        }
        effect
    }

    /// Create an effect, run it once and return the outcome of that run.
    pub fn try_new<F, R>(scheduler: &Scheduler, mut callback: F) -> (Self, Result<(), ReactiveError>)
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let inner = Arc::new_cyclic(|this| EffectInner {
            id: SubscriberId::new(),
            callback: Mutex::new(Box::new(move || callback().into_outcome())),
            cleanup: Mutex::new(None),
            sources: Mutex::new(SmallVec::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            scheduler: scheduler.clone(),
            this: this.clone(),
        });

        let outcome = inner.run();
        (Self { inner }, outcome)
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Queue the effect for the next flush, as if a dependency had changed.
    pub fn schedule(&self) {
        let this: Arc<dyn Computation> = self.inner.clone();
        self.inner.scheduler.enqueue(self.inner.id, Arc::downgrade(&this));
    }

    /// Run the effect now, outside the scheduler.
    pub fn execute(&self) -> Result<(), ReactiveError> {
        self.inner.run()
    }

    /// Unsubscribe from every signal and invoke the pending cleanup.
    ///
    /// Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Get the number of signals read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
