//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values. Today
//! that is only [`Effect`](super::Effect), but the scheduler and signals talk
//! to subscribers through the [`Computation`] trait so neither needs to know
//! the concrete type.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ReactiveError;

/// Unique identifier for a subscriber.
///
/// Each computation gets a unique ID when created. The ID keys the
/// scheduler's pending set, which is what collapses repeated dirty marks
/// into a single recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be scheduled for re-execution.
pub trait Computation: Send + Sync {
    /// The subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation. Called by the scheduler during a flush.
    fn recompute(&self) -> Result<(), ReactiveError>;
}

/// A reactive source a computation read during its last run.
///
/// Computations keep their sources so they can unsubscribe before the next
/// run; that is what keeps dependency sets minimal.
pub trait Source: Send + Sync {
    fn signal_id(&self) -> SignalId;

    /// Stop notifying the given subscriber.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn signal_ids_are_unique() {
        assert_ne!(SignalId::new(), SignalId::new());
    }
}
