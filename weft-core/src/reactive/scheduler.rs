//! Update Scheduler
//!
//! The scheduler is the central coordinator between signal writes and
//! effect re-runs. It is an explicit object handed to every signal and
//! effect at construction, so independent applications (and tests) never
//! share hidden state.
//!
//! # How It Works
//!
//! 1. A signal write enqueues each of its subscribers. The pending set is
//!    keyed by subscriber ID and keeps insertion order, so a computation
//!    dirtied many times in one span is recorded once.
//!
//! 2. The first enqueue of a batch queues a single "microtask": the `queued`
//!    flag flips and the driver is woken. Later enqueues reuse it.
//!
//! 3. A flush takes the pending set and recomputes every entry exactly
//!    once. Anything enqueued while flushing lands in the next batch.
//!
//! Nothing ever recomputes synchronously inside the write that dirtied it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use super::subscriber::{Computation, SubscriberId};
use crate::error::ReactiveError;

/// Outcome of one flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Computations that re-ran (successfully or not).
    pub recomputed: usize,
    /// Errors raised by failed runs, in run order.
    pub errors: Vec<(SubscriberId, ReactiveError)>,
}

impl FlushReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

struct SchedulerInner {
    pending: Mutex<IndexMap<SubscriberId, Weak<dyn Computation>>>,
    queued: AtomicBool,
    disposed: AtomicBool,
    wake: Notify,
    epoch: watch::Sender<u64>,
    flushes: AtomicU64,
}

/// Batching scheduler for effect re-runs.
///
/// Cloning is cheap; clones share the same pending set.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a new idle scheduler.
    pub fn new() -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            inner: Arc::new(SchedulerInner {
                pending: Mutex::new(IndexMap::new()),
                queued: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                wake: Notify::new(),
                epoch,
                flushes: AtomicU64::new(0),
            }),
        }
    }

    /// Mark a computation dirty.
    ///
    /// Queues the batch microtask if this is the first dirty mark since the
    /// last flush.
    pub fn enqueue(&self, id: SubscriberId, computation: Weak<dyn Computation>) {
        if self.is_disposed() {
            trace!(?id, "scheduler disposed, dropping enqueue");
            return;
        }

        self.inner.pending.lock().entry(id).or_insert(computation);

        if !self.inner.queued.swap(true, Ordering::AcqRel) {
            trace!("queueing flush");
            self.inner.wake.notify_one();
        }
    }

    /// Whether a flush is queued.
    pub fn is_queued(&self) -> bool {
        self.inner.queued.load(Ordering::Acquire)
    }

    /// Number of computations waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Run the queued microtask, if there is one.
    ///
    /// This is the manual event-loop checkpoint: call it where a host would
    /// yield to its microtask queue.
    pub fn tick(&self) -> Option<FlushReport> {
        if self.is_queued() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Recompute every pending computation once.
    ///
    /// A failing computation is logged and recorded in the report; the rest
    /// of the batch still runs.
    pub fn flush(&self) -> FlushReport {
        let pending = {
            let mut guard = self.inner.pending.lock();
            self.inner.queued.store(false, Ordering::Release);
            std::mem::take(&mut *guard)
        };

        let mut report = FlushReport::default();

        for (id, weak) in pending {
            let Some(computation) = weak.upgrade() else {
                trace!(?id, "computation dropped before flush");
                continue;
            };

            report.recomputed += 1;
            if let Err(err) = computation.recompute() {
                error!(?id, error = %err, "effect failed during flush");
                report.errors.push((id, err));
            }
        }

        let count = self.inner.flushes.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.epoch.send_replace(count);
        debug!(recomputed = report.recomputed, failed = report.errors.len(), "flushed");

        report
    }

    /// Number of completed flushes.
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.load(Ordering::Relaxed)
    }

    /// Watch flush completions. The value is the flush count.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.epoch.subscribe()
    }

    /// Spawn the driver that flushes whenever a microtask is queued.
    ///
    /// Must be called from within a tokio runtime. The task ends after
    /// [`dispose`](Self::dispose).
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            debug!("scheduler driver started");
            loop {
                scheduler.inner.wake.notified().await;
                if scheduler.is_disposed() {
                    break;
                }
                // Let the writer finish its synchronous span first.
                tokio::task::yield_now().await;
                scheduler.tick();
            }
            debug!("scheduler driver stopped");
        })
    }

    /// Stop scheduling. Pending work is dropped and later enqueues are
    /// ignored.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.pending.lock().clear();
        self.inner.queued.store(false, Ordering::Release);
        self.inner.wake.notify_one();
        debug!("scheduler disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.is_queued())
            .field("pending", &self.pending_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct MockComputation {
        id: SubscriberId,
        runs: AtomicUsize,
        fail: bool,
    }

    impl MockComputation {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                runs: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl Computation for MockComputation {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn recompute(&self) -> Result<(), ReactiveError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ReactiveError::EffectFailed("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn weak(c: &Arc<MockComputation>) -> Weak<dyn Computation> {
        let as_dyn: Arc<dyn Computation> = c.clone();
        Arc::downgrade(&as_dyn)
    }

    #[test]
    fn repeated_enqueue_runs_once() {
        let scheduler = Scheduler::new();
        let comp = MockComputation::new(false);

        for _ in 0..5 {
            scheduler.enqueue(comp.id, weak(&comp));
        }

        assert!(scheduler.is_queued());
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(comp.runs.load(Ordering::SeqCst), 0);

        let report = scheduler.flush();
        assert_eq!(report.recomputed, 1);
        assert_eq!(comp.runs.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_queued());
    }

    #[test]
    fn tick_without_pending_work_is_a_no_op() {
        let scheduler = Scheduler::new();
        assert!(scheduler.tick().is_none());
        assert_eq!(scheduler.flush_count(), 0);
    }

    #[test]
    fn failure_does_not_stop_siblings() {
        let scheduler = Scheduler::new();
        let bad = MockComputation::new(true);
        let good = MockComputation::new(false);

        scheduler.enqueue(bad.id, weak(&bad));
        scheduler.enqueue(good.id, weak(&good));

        let report = scheduler.flush();
        assert_eq!(report.recomputed, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, bad.id);
        assert_eq!(good.runs.load(Ordering::SeqCst), 1);

        // not wedged: the next batch runs normally
        scheduler.enqueue(good.id, weak(&good));
        assert!(scheduler.tick().is_some());
        assert_eq!(good.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_computations_are_skipped() {
        let scheduler = Scheduler::new();
        let comp = MockComputation::new(false);
        scheduler.enqueue(comp.id, weak(&comp));
        drop(comp);

        assert_eq!(scheduler.flush().recomputed, 0);
    }

    #[test]
    fn disposed_scheduler_ignores_work() {
        let scheduler = Scheduler::new();
        let comp = MockComputation::new(false);
        scheduler.dispose();
        scheduler.enqueue(comp.id, weak(&comp));

        assert!(!scheduler.is_queued());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn driver_flushes_queued_work() {
        let scheduler = Scheduler::new();
        let driver = scheduler.start();
        let mut flushed = scheduler.subscribe();

        let comp = MockComputation::new(false);
        scheduler.enqueue(comp.id, weak(&comp));
        scheduler.enqueue(comp.id, weak(&comp));

        flushed.changed().await.unwrap();
        assert_eq!(comp.runs.load(Ordering::SeqCst), 1);

        scheduler.dispose();
        driver.await.unwrap();
    }
}
